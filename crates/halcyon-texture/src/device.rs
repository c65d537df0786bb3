//! The device interface consumed by the texture lifecycle.
//!
//! Everything that actually touches the GPU (allocation, uploads, image decoding,
//! reading the render surface) sits behind [`TextureDevice`]. The lifecycle code
//! only sees opaque [`HardwareHandle`]s and the format codes the device defines.

use std::fmt;
use std::future::Future;
use std::num::NonZeroU64;
use std::pin::Pin;
use std::sync::Arc;

use crate::source::SourceKind;
use crate::spherical::SphericalPolynomial;

/// A device-side texture object. Opaque to the lifecycle code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareHandle(NonZeroU64);

impl HardwareHandle {
    /// Wrap a device id. Returns `None` for zero.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(&self) -> u64 {
        self.0.get()
    }
}

/// Identifies a render surface the device can copy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Device-defined pixel format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const RGBA: PixelFormat = PixelFormat(5);
}

/// Device-defined component type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentType(pub u32);

impl ComponentType {
    pub const UNSIGNED_BYTE: ComponentType = ComponentType(0);
    pub const FLOAT: ComponentType = ComponentType(1);
}

/// Device-defined sampling mode code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingMode(pub u32);

impl SamplingMode {
    pub const NEAREST: SamplingMode = SamplingMode(1);
    pub const BILINEAR: SamplingMode = SamplingMode(2);
    pub const TRILINEAR: SamplingMode = SamplingMode(3);
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::TRILINEAR
    }
}

/// Errors reported by a device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device refused the request.
    Rejected {
        /// The operation that was refused.
        operation: &'static str,
        /// Why the device refused.
        reason: String,
    },

    /// The device does not implement this operation.
    Unsupported {
        /// The missing operation.
        operation: &'static str,
    },

    /// The rendering context was lost while the request was in flight.
    ContextLost,

    /// The completion was dropped before it fired.
    Cancelled,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Rejected { operation, reason } => {
                write!(f, "{} rejected: {}", operation, reason)
            }
            DeviceError::Unsupported { operation } => {
                write!(f, "{} is not supported by this device", operation)
            }
            DeviceError::ContextLost => write!(f, "rendering context lost"),
            DeviceError::Cancelled => write!(f, "device completion was cancelled"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Future returned by device operations that complete asynchronously.
pub type DeviceFuture<T> = Pin<Box<dyn Future<Output = Result<T, DeviceError>> + Send + 'static>>;

/// The target's intended usage, sent to a handle before it changes owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleUsage {
    pub source: SourceKind,
    pub generate_mipmaps: bool,
    pub is_cube: bool,
    pub width: u32,
    pub height: u32,
}

/// Load a 2D texture from a URL.
#[derive(Debug, Clone)]
pub struct UrlRequest {
    pub url: String,
    pub generate_mipmaps: bool,
    pub invert_y: bool,
    pub sampling_mode: SamplingMode,
    /// In-memory content to decode instead of fetching `url`.
    pub buffer: Option<Arc<[u8]>>,
    pub format: PixelFormat,
    pub extension: Option<String>,
    pub use_srgb_buffer: bool,
}

/// Build a 2D texture from a raw buffer.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub generate_mipmaps: bool,
    pub invert_y: bool,
    pub sampling_mode: SamplingMode,
    pub compression: Option<String>,
    pub component_type: ComponentType,
    pub use_srgb_buffer: bool,
}

/// Build a 3D or 2D-array texture from a raw buffer.
#[derive(Debug, Clone)]
pub struct RawVolumeRequest {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Depth for volumes, layer count for arrays.
    pub depth: u32,
    pub format: PixelFormat,
    pub generate_mipmaps: bool,
    pub invert_y: bool,
    pub sampling_mode: SamplingMode,
    pub compression: Option<String>,
    pub component_type: ComponentType,
}

/// Allocate an empty texture that is filled from a render surface.
#[derive(Debug, Clone, Copy)]
pub struct DynamicRequest {
    pub width: u32,
    pub height: u32,
    pub generate_mipmaps: bool,
    pub sampling_mode: SamplingMode,
}

/// Load a cube texture from a URL or an explicit list of face files.
#[derive(Debug, Clone)]
pub struct CubeUrlRequest {
    pub url: String,
    pub files: Option<Vec<String>>,
    pub generate_mipmaps: bool,
    pub format: PixelFormat,
    pub extension: Option<String>,
    pub use_srgb_buffer: bool,
}

/// Build a cube texture from one buffer per face.
#[derive(Debug, Clone)]
pub struct CubeRawRequest {
    pub faces: Vec<Arc<[u8]>>,
    pub size: u32,
    pub format: PixelFormat,
    pub component_type: ComponentType,
    pub generate_mipmaps: bool,
    pub invert_y: bool,
    pub sampling_mode: SamplingMode,
    pub compression: Option<String>,
}

/// Load a prefiltered environment cube.
#[derive(Debug, Clone)]
pub struct PrefilteredCubeRequest {
    pub url: String,
    pub lod_scale: f32,
    pub lod_offset: f32,
    pub format: PixelFormat,
    pub extension: Option<String>,
}

/// Result of a prefiltered cube load.
#[derive(Debug, Clone)]
pub struct PrefilteredCube {
    pub handle: HardwareHandle,
    /// Lighting data computed during the load, if the device computed any.
    pub spherical_polynomial: Option<SphericalPolynomial>,
}

/// GPU operations the texture lifecycle depends on.
///
/// Methods take `&self` so a device can be shared as `Arc<dyn TextureDevice>`;
/// implementations use interior mutability where they need it.
///
/// Asynchronous loads return a [`DeviceFuture`]. The future standing in for a
/// completion callback must resolve once, with either the new handle or the
/// device's error.
pub trait TextureDevice: Send + Sync {
    /// Allocate an empty hardware handle.
    fn create_hardware_handle(&self) -> Result<HardwareHandle, DeviceError>;

    /// Reallocate or reinterpret `handle` at new dimensions.
    fn resize_handle(
        &self,
        handle: HardwareHandle,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<(), DeviceError>;

    /// Tell a handle about the shape of the descriptor it is about to move into.
    fn reconfigure_handle(&self, handle: HardwareHandle, usage: &HandleUsage);

    fn create_from_url(&self, request: &UrlRequest) -> DeviceFuture<HardwareHandle>;

    fn create_raw(&self, request: &RawRequest) -> Result<HardwareHandle, DeviceError>;

    fn create_raw_3d(&self, request: &RawVolumeRequest) -> Result<HardwareHandle, DeviceError>;

    fn create_raw_2d_array(&self, request: &RawVolumeRequest)
    -> Result<HardwareHandle, DeviceError>;

    fn create_dynamic(&self, request: &DynamicRequest) -> Result<HardwareHandle, DeviceError>;

    /// The surface currently being rendered to, if any.
    fn render_surface(&self) -> Option<SurfaceId>;

    /// Copy `surface` into a dynamic texture. Returns whether the handle is now ready.
    fn push_surface_into_dynamic(
        &self,
        handle: HardwareHandle,
        surface: SurfaceId,
        invert_y: bool,
        format: PixelFormat,
    ) -> Result<bool, DeviceError>;

    fn create_cube_from_urls(&self, request: &CubeUrlRequest) -> DeviceFuture<HardwareHandle>;

    fn create_cube_raw(&self, request: &CubeRawRequest) -> Result<HardwareHandle, DeviceError>;

    fn create_prefiltered_cube(
        &self,
        request: &PrefilteredCubeRequest,
    ) -> DeviceFuture<PrefilteredCube>;

    /// Free the device-side object. Called exactly once per handle.
    fn release_handle(&self, handle: HardwareHandle);
}
