//! Where a texture's content comes from, and the data kept to regenerate it.

use std::sync::Arc;

/// Classifies how a texture's content originates, and so how it is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceKind {
    #[default]
    Unknown,
    /// Loaded from a URL or file path.
    Url,
    /// Transient, nothing to regenerate.
    Temp,
    /// Built from a raw pixel buffer.
    Raw,
    /// Filled from the current render surface.
    Dynamic,
    RenderTarget,
    MultiRenderTarget,
    /// Cube map loaded from a URL or a list of face files.
    Cube,
    /// Cube map built from one raw buffer per face.
    CubeRaw,
    /// Prefiltered environment cube loaded from a URL.
    CubePrefiltered,
    /// Volume built from a raw buffer.
    Raw3D,
    /// 2D array built from a raw buffer.
    Raw2DArray,
    DepthStencil,
    /// RGBD-encoded raw cube, rebuilt by environment tooling rather than here.
    CubeRawRgbd,
    Depth,
}

impl SourceKind {
    /// Kinds whose recreation resolves through a device completion.
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            SourceKind::Url | SourceKind::Cube | SourceKind::CubePrefiltered
        )
    }

    /// Kinds the built-in rebuild path regenerates.
    pub fn is_rebuildable(&self) -> bool {
        matches!(
            self,
            SourceKind::Url
                | SourceKind::Raw
                | SourceKind::Raw3D
                | SourceKind::Raw2DArray
                | SourceKind::Dynamic
                | SourceKind::Cube
                | SourceKind::CubeRaw
                | SourceKind::CubePrefiltered
        )
    }

    /// The payload shape this kind carries.
    pub fn expected_payload(&self) -> PayloadShape {
        match self {
            SourceKind::Raw | SourceKind::Raw3D | SourceKind::Raw2DArray => PayloadShape::Buffer,
            SourceKind::CubeRaw => PayloadShape::Faces,
            SourceKind::CubeRawRgbd => PayloadShape::FaceMips,
            // Url textures may carry an in-memory buffer, but don't need one.
            _ => PayloadShape::None,
        }
    }
}

/// The payload variants without their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    None,
    Buffer,
    Faces,
    FaceMips,
}

/// Source data retained so the texture can be regenerated after a context loss.
#[derive(Debug, Clone, Default)]
pub enum BackingPayload {
    #[default]
    None,
    /// A single buffer-like blob.
    Buffer(Arc<[u8]>),
    /// One buffer per cube face.
    Faces(Vec<Arc<[u8]>>),
    /// One buffer per mip level, per cube face.
    FaceMips(Vec<Vec<Arc<[u8]>>>),
}

impl BackingPayload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            BackingPayload::None => PayloadShape::None,
            BackingPayload::Buffer(_) => PayloadShape::Buffer,
            BackingPayload::Faces(_) => PayloadShape::Faces,
            BackingPayload::FaceMips(_) => PayloadShape::FaceMips,
        }
    }

    pub fn buffer(&self) -> Option<&Arc<[u8]>> {
        match self {
            BackingPayload::Buffer(data) => Some(data),
            _ => None,
        }
    }

    pub fn faces(&self) -> Option<&[Arc<[u8]>]> {
        match self {
            BackingPayload::Faces(faces) => Some(faces),
            _ => None,
        }
    }

    /// Total bytes retained.
    pub fn byte_len(&self) -> usize {
        match self {
            BackingPayload::None => 0,
            BackingPayload::Buffer(data) => data.len(),
            BackingPayload::Faces(faces) => faces.iter().map(|f| f.len()).sum(),
            BackingPayload::FaceMips(faces) => faces.iter().flatten().map(|m| m.len()).sum(),
        }
    }
}
