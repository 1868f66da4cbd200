//! Service layer
//!
//! Services contain the engine's building blocks: task execution, log
//! buffering, artifact storage and aggregation, release publication and
//! secret lookup.
//!
//! Execution, log buffering and publication are trait-based so the pipeline
//! can be driven with fakes in tests.

mod aggregator;
mod execution;
mod log_buffer;
mod publisher;
mod secrets;
mod storage;

// Re-export traits
pub use execution::ExecutionService;
pub use log_buffer::LogBufferService;
pub use publisher::ReleasePublisher;

// Re-export implementations
pub use aggregator::{AggregateError, AggregateScope, ArtifactAggregator};
pub use execution::ProcessExecutionService;
pub use log_buffer::InMemoryLogBuffer;
pub use publisher::{
    MANIFEST_FILE, ManifestEntry, ManifestPublisher, PublishError, Release, ReleaseManifest,
};
pub use secrets::{SecretError, SecretStore};
pub use storage::{ArtifactMetadata, ArtifactStore, METADATA_FILE, StorageError, StoreRequest};
