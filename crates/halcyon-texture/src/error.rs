//! Error types for texture lifecycle operations.

use std::fmt;

use crate::device::DeviceError;
use crate::handle::TextureId;
use crate::source::SourceKind;

/// Errors that can occur while creating, resizing, rebuilding or disposing textures.
#[derive(Debug, Clone)]
pub enum TextureError {
    /// The device refused to resize the hardware handle.
    DeviceResize {
        /// The texture being resized.
        texture: TextureId,
        /// What the device reported.
        source: DeviceError,
    },

    /// The device failed to create or recreate a hardware handle.
    DeviceCreation {
        /// The texture the handle was meant for.
        texture: TextureId,
        /// The source kind that drove the recreation.
        kind: SourceKind,
        /// What the device reported.
        source: DeviceError,
    },

    /// The texture's reference count already reached zero.
    UseAfterDispose {
        /// The disposed texture.
        texture: TextureId,
    },

    /// The handle does not resolve to a live texture.
    InvalidHandle {
        /// Description of why the handle is invalid.
        reason: String,
    },

    /// The backing payload doesn't match what the source kind needs to rebuild.
    MissingPayload {
        /// The texture being rebuilt.
        texture: TextureId,
        /// Its source kind.
        kind: SourceKind,
    },
}

impl TextureError {
    /// The texture this error concerns, when there is one.
    pub fn texture(&self) -> Option<TextureId> {
        match self {
            TextureError::DeviceResize { texture, .. }
            | TextureError::DeviceCreation { texture, .. }
            | TextureError::UseAfterDispose { texture }
            | TextureError::MissingPayload { texture, .. } => Some(*texture),
            TextureError::InvalidHandle { .. } => None,
        }
    }

    /// Returns `true` for the disposal guard error.
    pub fn is_use_after_dispose(&self) -> bool {
        matches!(self, TextureError::UseAfterDispose { .. })
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::DeviceResize { texture, source } => {
                write!(f, "Device rejected resize of {}: {}", texture, source)
            }
            TextureError::DeviceCreation {
                texture,
                kind,
                source,
            } => {
                write!(
                    f,
                    "Device failed to create {:?} handle for {}: {}",
                    kind, texture, source
                )
            }
            TextureError::UseAfterDispose { texture } => {
                write!(f, "Texture {} used after its last reference was disposed", texture)
            }
            TextureError::InvalidHandle { reason } => {
                write!(f, "Invalid texture handle: {}", reason)
            }
            TextureError::MissingPayload { texture, kind } => {
                write!(f, "Texture {} has no payload usable for a {:?} rebuild", texture, kind)
            }
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::DeviceResize { source, .. }
            | TextureError::DeviceCreation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for texture operations.
pub type TextureResult<T> = Result<T, TextureError>;
