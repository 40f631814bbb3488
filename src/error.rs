use thiserror::Error;

/// Failures the visualization pipeline can surface.
///
/// Source-acquisition errors are caught and logged at the component that
/// owns the source; nothing in this taxonomy is ever allowed to propagate
/// into the per-tick scheduling loop.
#[derive(Debug, Error)]
pub enum VizError {
    /// Microphone access was refused or no capture device could be opened.
    #[error("microphone input unavailable: {0}")]
    PermissionDenied(String),

    /// The supplied audio data could not be decoded.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// A scene mutation was attempted before the scene existed. Callers
    /// treat this as a no-op, never a crash.
    #[error("scene is not available")]
    SceneUnavailable,

    /// Audio backend (device/stream) failure outside the permission path.
    #[error("audio backend error: {0}")]
    Backend(String),
}
