#![forbid(unsafe_code)]

pub mod cache;
pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod kind;
pub mod machine;
pub mod probe;
pub mod render;
pub mod source;
pub mod stats;

pub use cache::{MemorySuccessCache, SuccessCache};
pub use canonical::{canonicalize, with_param, RESERVED_PARAMS};
pub use config::{
    retry_delay, EndpointConfig, EngineConfig, MAX_AUTO_RETRY_LIMIT, MAX_RETRY_BACKOFF,
};
pub use engine::{MediaEngine, MountOptions};
pub use error::{ErrorKind, TransitionError};
pub use kind::{classify, AssetKind};
pub use machine::{AssetSession, LoadState, LoadStateMachine, LoadStatus, ScopedTimer, Step};
pub use probe::{classify_probe, AssetProbe, ErrorClassifier, HttpProbe, ProbeError, ProbeResponse};
pub use render::{AssetRenderer, FailureReason, HttpRenderer, RenderOutcome};
pub use source::{resolve, BlobKind, MediaSource, ProductId, ProductMedia, ResolvedMedia, SourceError};
pub use stats::{EngineStats, StatsSnapshot};
