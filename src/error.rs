/// Errors surfaced by initialization and durable-state mutation.
///
/// `E` is the storage backend's own error type. Runtime consensus paths
/// never propagate these to the embedder; a failed durable write demotes
/// the server instead (see the core's error handler). Initialization
/// returns them directly.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("storage backend: {0}")]
    Storage(#[source] E),

    #[error("corrupt stored value under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing stored value under key {0}")]
    Missing(String),

    #[error("encoding stored value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("configured cluster size {configured} conflicts with stored size {stored}")]
    ClusterSizeMismatch { stored: u8, configured: u8 },

    #[error("cluster size {0} is out of range 1..=5")]
    ClusterSizeInvalid(u8),

    #[error("cluster size is neither configured nor stored")]
    ClusterSizeUnknown,
}
