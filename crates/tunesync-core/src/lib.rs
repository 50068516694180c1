pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod orchestrator;
pub mod player;
pub mod presence;
pub mod process;
pub mod signature;

// Scripted players and sinks (always available for unit and integration tests)
#[doc(hidden)]
pub mod testing;

pub use config::{Config, SinkKind};
pub use error::{Error, ErrorKind, Result};
pub use format::StatusFormatter;
pub use model::TrackSnapshot;
pub use orchestrator::{Phase, PollingOrchestrator, SourceStatus};
pub use player::{PlayerDiscovery, PlayerKind, PlayerSource, SystemDiscovery, TrackSource};
pub use presence::{FileSink, LogSink, PresenceSink, Publisher};
pub use signature::SignatureScanner;
