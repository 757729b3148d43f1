use thiserror::Error;

/// Terminal failures of a fill invocation.
///
/// Font acquisition and per-field compositing problems are recovered
/// locally and never surface here; everything below aborts the invocation.
#[derive(Error, Debug)]
pub enum FormFillError {
    /// Credential missing or not in the upstream token shape. Raised before
    /// any network I/O is attempted.
    #[error("invalid credential: {0}")]
    Authentication(String),

    /// The detection call was attempted and failed. `status` is `None` for
    /// transport-level failures (timeout, connection reset) where no HTTP
    /// status exists.
    #[error("detection upstream failed (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// The source bytes could not be rendered to a preview image.
    #[error("failed to rasterize source document: {0}")]
    Rasterization(String),

    /// The source document could not be parsed or re-serialized at
    /// compositing time.
    #[error("document could not be processed: {0}")]
    MalformedDocument(String),

    /// The detector returned zero usable fields and the fallback field set
    /// is disabled.
    #[error("detector returned no usable fields")]
    NoFieldsDetected,
}
