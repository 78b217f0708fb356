//! Error types for the cache engine.

/// Rejected at [`crate::builder::CacheBuilder::build`] time. Never surfaced
/// once a cache handle exists.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maximum_size must be positive, got {0}")]
    NonPositiveMaximumSize(i64),

    #[error("maximum_weight must be positive, got {0}")]
    NonPositiveMaximumWeight(i64),

    #[error("maximum_weight was set without a weigher function")]
    WeightWithoutWeigher,

    #[error("maximum_size and maximum_weight are mutually exclusive")]
    SizeAndWeightBothSet,

    #[error("weak_values and soft_values are mutually exclusive reference modes")]
    WeakAndSoftValuesBothSet,

    #[error("a synchronous loader and an asynchronous loader were both configured")]
    SyncAndAsyncLoaderBothSet,

    #[error("unknown eviction policy {0:?}")]
    UnknownPolicy(String),

    #[error("{setting} requires the {required_policy:?} eviction policy, but {configured_policy:?} was selected")]
    IncompatiblePolicySetting {
        setting: &'static str,
        required_policy: &'static str,
        configured_policy: &'static str,
    },

    #[error("IDLE_TIME policy requires max_idle_time to be set")]
    IdleTimeWithoutMaxIdle,
}
