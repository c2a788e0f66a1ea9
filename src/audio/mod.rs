pub mod backend;
pub mod clip;
pub mod convert;
pub mod file;
pub mod output;

#[cfg(feature = "cpal")]
pub mod mic;
#[cfg(feature = "cpal")]
pub mod speaker;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, Pacing};
pub use clip::{ClipMetadata, ClipWriter};
pub use file::{AudioFile, FileBackend};
pub use output::{AudioOutput, OutputKind, VirtualOutput};
