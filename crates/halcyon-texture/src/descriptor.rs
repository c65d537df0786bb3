//! The resource descriptor: everything known about a texture, whether or not a
//! hardware handle currently backs it.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use futures_lite::future;

use crate::device::{ComponentType, HardwareHandle, PixelFormat, SamplingMode, TextureDevice};
use crate::error::{TextureError, TextureResult};
use crate::event::{Observable, ObserverId, TextureFailure};
use crate::handle::TextureId;
use crate::rebuild::RebuildHook;
use crate::source::{BackingPayload, SourceKind};
use crate::spherical::{PolynomialFuture, SphericalPolynomial};

bitflags! {
    /// Dimensionality class of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureShape: u8 {
        const CUBE = 1 << 0;
        const VOLUME = 1 << 1;
        const ARRAY_2D = 1 << 2;
        const MULTIVIEW = 1 << 3;
    }
}

/// Owned derived textures a descriptor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedSlot {
    LodHigh,
    LodMid,
    LodLow,
    Irradiance,
}

impl DerivedSlot {
    pub const ALL: [DerivedSlot; 4] = [
        DerivedSlot::LodHigh,
        DerivedSlot::LodMid,
        DerivedSlot::LodLow,
        DerivedSlot::Irradiance,
    ];
}

/// Sampler state the device resolved for this texture on its last use.
///
/// `None` means "not resolved yet"; the device re-resolves on next bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerCache {
    pub coordinates_mode: Option<u32>,
    pub wrap_u: Option<u32>,
    pub wrap_v: Option<u32>,
    pub wrap_r: Option<u32>,
    pub anisotropic_filtering_level: Option<u32>,
}

impl SamplerCache {
    pub fn invalidate(&mut self) {
        *self = SamplerCache::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == SamplerCache::default()
    }
}

/// Parameters for creating a texture.
///
/// Build one with a source-specific constructor, then adjust with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub source: SourceKind,
    pub payload: BackingPayload,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: PixelFormat,
    pub component_type: ComponentType,
    pub shape: TextureShape,
    pub generate_mipmaps: bool,
    pub invert_y: bool,
    pub use_srgb_buffer: bool,
    pub is_rgbd: bool,
    pub sampling_mode: SamplingMode,
    pub url: Option<String>,
    pub cube_files: Option<Vec<String>>,
    pub extension: Option<String>,
    pub compression: Option<String>,
    pub lod_generation_scale: f32,
    pub lod_generation_offset: f32,
    /// Register the texture without allocating a hardware handle.
    pub defer_allocation: bool,
}

impl TextureDesc {
    fn base(source: SourceKind, width: u32, height: u32) -> Self {
        Self {
            source,
            payload: BackingPayload::None,
            width,
            height,
            depth: 1,
            format: PixelFormat::RGBA,
            component_type: ComponentType::UNSIGNED_BYTE,
            shape: TextureShape::empty(),
            generate_mipmaps: false,
            invert_y: false,
            use_srgb_buffer: false,
            is_rgbd: false,
            sampling_mode: SamplingMode::default(),
            url: None,
            cube_files: None,
            extension: None,
            compression: None,
            lod_generation_scale: 1.0,
            lod_generation_offset: 0.0,
            defer_allocation: false,
        }
    }

    /// A texture loaded from a URL. Dimensions are unknown until the device loads it.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            generate_mipmaps: true,
            ..Self::base(SourceKind::Url, 0, 0)
        }
    }

    pub fn raw(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        format: PixelFormat,
        component_type: ComponentType,
    ) -> Self {
        Self {
            payload: BackingPayload::Buffer(data.into()),
            format,
            component_type,
            ..Self::base(SourceKind::Raw, width, height)
        }
    }

    pub fn raw_3d(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        depth: u32,
        format: PixelFormat,
        component_type: ComponentType,
    ) -> Self {
        Self {
            payload: BackingPayload::Buffer(data.into()),
            depth,
            format,
            component_type,
            shape: TextureShape::VOLUME,
            ..Self::base(SourceKind::Raw3D, width, height)
        }
    }

    pub fn raw_2d_array(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        layers: u32,
        format: PixelFormat,
        component_type: ComponentType,
    ) -> Self {
        Self {
            payload: BackingPayload::Buffer(data.into()),
            depth: layers,
            format,
            component_type,
            shape: TextureShape::ARRAY_2D,
            ..Self::base(SourceKind::Raw2DArray, width, height)
        }
    }

    /// A texture refreshed from the render surface.
    pub fn dynamic(width: u32, height: u32) -> Self {
        Self::base(SourceKind::Dynamic, width, height)
    }

    /// Scratch texture with no recreation strategy.
    pub fn temp(width: u32, height: u32) -> Self {
        Self::base(SourceKind::Temp, width, height)
    }

    pub fn render_target(width: u32, height: u32) -> Self {
        Self::base(SourceKind::RenderTarget, width, height)
    }

    /// Cube map from a URL, or from explicit face files when `files` is given.
    pub fn cube(url: impl Into<String>, files: Option<Vec<String>>) -> Self {
        Self {
            url: Some(url.into()),
            cube_files: files,
            shape: TextureShape::CUBE,
            generate_mipmaps: true,
            ..Self::base(SourceKind::Cube, 0, 0)
        }
    }

    pub fn cube_raw(
        faces: Vec<Arc<[u8]>>,
        size: u32,
        format: PixelFormat,
        component_type: ComponentType,
    ) -> Self {
        Self {
            payload: BackingPayload::Faces(faces),
            format,
            component_type,
            shape: TextureShape::CUBE,
            ..Self::base(SourceKind::CubeRaw, size, size)
        }
    }

    /// RGBD cube holding one buffer per mip per face.
    pub fn cube_raw_rgbd(face_mips: Vec<Vec<Arc<[u8]>>>, size: u32) -> Self {
        Self {
            payload: BackingPayload::FaceMips(face_mips),
            shape: TextureShape::CUBE,
            is_rgbd: true,
            ..Self::base(SourceKind::CubeRawRgbd, size, size)
        }
    }

    pub fn prefiltered_cube(url: impl Into<String>, lod_scale: f32, lod_offset: f32) -> Self {
        Self {
            url: Some(url.into()),
            shape: TextureShape::CUBE,
            lod_generation_scale: lod_scale,
            lod_generation_offset: lod_offset,
            ..Self::base(SourceKind::CubePrefiltered, 0, 0)
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_mipmaps(mut self, generate_mipmaps: bool) -> Self {
        self.generate_mipmaps = generate_mipmaps;
        self
    }

    pub fn with_invert_y(mut self, invert_y: bool) -> Self {
        self.invert_y = invert_y;
        self
    }

    pub fn with_sampling_mode(mut self, sampling_mode: SamplingMode) -> Self {
        self.sampling_mode = sampling_mode;
        self
    }

    pub fn with_srgb_buffer(mut self, use_srgb_buffer: bool) -> Self {
        self.use_srgb_buffer = use_srgb_buffer;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Keep in-memory content for a URL texture (decoded instead of fetched).
    pub fn with_buffer(mut self, data: impl Into<Arc<[u8]>>) -> Self {
        self.payload = BackingPayload::Buffer(data.into());
        self
    }

    pub fn with_multiview(mut self) -> Self {
        self.shape |= TextureShape::MULTIVIEW;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer_allocation = true;
        self
    }
}

/// A texture's semantic record plus the hardware handle that currently backs it.
pub struct TextureDescriptor {
    id: TextureId,

    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: u32,
    base_width: u32,
    base_height: u32,
    base_depth: u32,
    size: u64,

    format: PixelFormat,
    component_type: ComponentType,
    shape: TextureShape,
    generate_mipmaps: bool,
    invert_y: bool,
    use_srgb_buffer: bool,
    pub(crate) is_rgbd: bool,
    pub(crate) is_ready: bool,
    sampling_mode: SamplingMode,

    source: SourceKind,
    payload: BackingPayload,
    url: Option<String>,
    original_url: Option<String>,
    cube_files: Option<Vec<String>>,
    extension: Option<String>,
    compression: Option<String>,
    lod_generation_scale: f32,
    lod_generation_offset: f32,

    lod_high: Option<Box<TextureDescriptor>>,
    lod_mid: Option<Box<TextureDescriptor>>,
    lod_low: Option<Box<TextureDescriptor>>,
    irradiance: Option<Box<TextureDescriptor>>,

    pub(crate) spherical_polynomial: Option<SphericalPolynomial>,
    pending_polynomial: Option<PolynomialFuture>,

    references: u32,
    pub(crate) handle: Option<HardwareHandle>,
    sampler: SamplerCache,
    pub(crate) rebuild_token: u64,

    on_loaded: Observable<TextureDescriptor>,
    on_error: Observable<TextureFailure>,
    pub(crate) rebuild_hook: Option<Box<dyn RebuildHook>>,
}

impl fmt::Debug for TextureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureDescriptor")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("size", &(self.width, self.height, self.depth))
            .field("handle", &self.handle)
            .field("references", &self.references)
            .field("is_ready", &self.is_ready)
            .finish_non_exhaustive()
    }
}

impl TextureDescriptor {
    /// Build a descriptor without a hardware handle.
    pub fn new(desc: TextureDesc) -> Self {
        let depth = desc.depth.max(1);
        Self {
            id: TextureId::next(),
            width: desc.width,
            height: desc.height,
            depth,
            base_width: desc.width,
            base_height: desc.height,
            base_depth: depth,
            size: desc.width as u64 * desc.height as u64 * depth as u64,
            format: desc.format,
            component_type: desc.component_type,
            shape: desc.shape,
            generate_mipmaps: desc.generate_mipmaps,
            invert_y: desc.invert_y,
            use_srgb_buffer: desc.use_srgb_buffer,
            is_rgbd: desc.is_rgbd,
            is_ready: false,
            sampling_mode: desc.sampling_mode,
            source: desc.source,
            payload: desc.payload,
            original_url: desc.url.clone(),
            url: desc.url,
            cube_files: desc.cube_files,
            extension: desc.extension,
            compression: desc.compression,
            lod_generation_scale: desc.lod_generation_scale,
            lod_generation_offset: desc.lod_generation_offset,
            lod_high: None,
            lod_mid: None,
            lod_low: None,
            irradiance: None,
            spherical_polynomial: None,
            pending_polynomial: None,
            references: 1,
            handle: None,
            sampler: SamplerCache::default(),
            rebuild_token: 0,
            on_loaded: Observable::new(),
            on_error: Observable::new(),
            rebuild_hook: None,
        }
    }

    /// A transient `Temp` descriptor wrapping a freshly created handle.
    ///
    /// This is the shape of a rebuild replacement: it only exists to carry the
    /// handle (and any derived resources) into the descriptor being rebuilt.
    pub fn from_handle(handle: HardwareHandle) -> Self {
        let mut descriptor = Self::new(TextureDesc::temp(0, 0));
        descriptor.handle = Some(handle);
        descriptor
    }

    /// Build a descriptor and allocate its hardware handle.
    pub fn allocate(desc: TextureDesc, device: &dyn TextureDevice) -> TextureResult<Self> {
        let defer = desc.defer_allocation;
        let mut descriptor = Self::new(desc);
        if !defer {
            let handle =
                device
                    .create_hardware_handle()
                    .map_err(|source| TextureError::DeviceCreation {
                        texture: descriptor.id,
                        kind: descriptor.source,
                        source,
                    })?;
            descriptor.handle = Some(handle);
        }
        Ok(descriptor)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn payload(&self) -> &BackingPayload {
        &self.payload
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn base_width(&self) -> u32 {
        self.base_width
    }

    pub fn base_height(&self) -> u32 {
        self.base_height
    }

    pub fn base_depth(&self) -> u32 {
        self.base_depth
    }

    /// Cached logical size, `width * height * depth`.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn shape(&self) -> TextureShape {
        self.shape
    }

    pub fn is_cube(&self) -> bool {
        self.shape.contains(TextureShape::CUBE)
    }

    pub fn is_3d(&self) -> bool {
        self.shape.contains(TextureShape::VOLUME)
    }

    pub fn is_2d_array(&self) -> bool {
        self.shape.contains(TextureShape::ARRAY_2D)
    }

    pub fn is_multiview(&self) -> bool {
        self.shape.contains(TextureShape::MULTIVIEW)
    }

    pub fn generate_mipmaps(&self) -> bool {
        self.generate_mipmaps
    }

    pub fn invert_y(&self) -> bool {
        self.invert_y
    }

    pub fn use_srgb_buffer(&self) -> bool {
        self.use_srgb_buffer
    }

    pub fn is_rgbd(&self) -> bool {
        self.is_rgbd
    }

    pub fn set_rgbd(&mut self, is_rgbd: bool) {
        self.is_rgbd = is_rgbd;
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampling_mode
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The URL the texture was first created from, before any redirect or rename.
    pub fn original_url(&self) -> Option<&str> {
        self.original_url.as_deref()
    }

    /// Point the texture at a new URL. The original URL is kept for rebuilds.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }

    pub fn cube_files(&self) -> Option<&[String]> {
        self.cube_files.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn compression(&self) -> Option<&str> {
        self.compression.as_deref()
    }

    pub fn lod_generation_scale(&self) -> f32 {
        self.lod_generation_scale
    }

    pub fn lod_generation_offset(&self) -> f32 {
        self.lod_generation_offset
    }

    pub fn handle(&self) -> Option<HardwareHandle> {
        self.handle
    }

    pub fn references(&self) -> u32 {
        self.references
    }

    pub fn is_disposed(&self) -> bool {
        self.references == 0
    }

    pub fn sampler(&self) -> &SamplerCache {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut SamplerCache {
        &mut self.sampler
    }

    pub fn spherical_polynomial(&self) -> Option<&SphericalPolynomial> {
        self.spherical_polynomial.as_ref()
    }

    pub fn set_spherical_polynomial(&mut self, polynomial: Option<SphericalPolynomial>) {
        self.spherical_polynomial = polynomial;
        self.pending_polynomial = None;
    }

    /// Attach a polynomial computation that is still running.
    pub fn set_pending_spherical_polynomial(&mut self, pending: PolynomialFuture) {
        self.pending_polynomial = Some(pending);
    }

    pub fn has_pending_spherical_polynomial(&self) -> bool {
        self.pending_polynomial.is_some()
    }

    /// Poll the pending polynomial once. Stores it when finished.
    ///
    /// Returns `true` when a polynomial was resolved by this call.
    pub fn poll_spherical_polynomial(&mut self) -> bool {
        let Some(pending) = self.pending_polynomial.as_mut() else {
            return false;
        };
        match future::block_on(future::poll_once(pending)) {
            Some(polynomial) => {
                self.spherical_polynomial = Some(polynomial);
                self.pending_polynomial = None;
                true
            }
            None => false,
        }
    }

    pub fn derived(&self, slot: DerivedSlot) -> Option<&TextureDescriptor> {
        self.derived_slot(slot).as_deref()
    }

    fn derived_slot(&self, slot: DerivedSlot) -> &Option<Box<TextureDescriptor>> {
        match slot {
            DerivedSlot::LodHigh => &self.lod_high,
            DerivedSlot::LodMid => &self.lod_mid,
            DerivedSlot::LodLow => &self.lod_low,
            DerivedSlot::Irradiance => &self.irradiance,
        }
    }

    fn derived_slot_mut(&mut self, slot: DerivedSlot) -> &mut Option<Box<TextureDescriptor>> {
        match slot {
            DerivedSlot::LodHigh => &mut self.lod_high,
            DerivedSlot::LodMid => &mut self.lod_mid,
            DerivedSlot::LodLow => &mut self.lod_low,
            DerivedSlot::Irradiance => &mut self.irradiance,
        }
    }

    /// Put `child` in `slot`, returning whatever was there. The caller owns the
    /// returned descriptor and is responsible for releasing it.
    pub fn replace_derived(
        &mut self,
        slot: DerivedSlot,
        child: TextureDescriptor,
    ) -> Option<Box<TextureDescriptor>> {
        self.derived_slot_mut(slot).replace(Box::new(child))
    }

    pub fn take_derived(&mut self, slot: DerivedSlot) -> Option<Box<TextureDescriptor>> {
        self.derived_slot_mut(slot).take()
    }

    pub fn on_loaded(&mut self) -> &mut Observable<TextureDescriptor> {
        &mut self.on_loaded
    }

    pub fn on_error(&mut self) -> &mut Observable<TextureFailure> {
        &mut self.on_error
    }

    /// Register a loaded callback; fires immediately if the texture is already ready.
    pub fn add_loaded_observer(
        &mut self,
        mut callback: impl FnMut(&TextureDescriptor) + Send + 'static,
    ) -> ObserverId {
        if self.is_ready {
            callback(self);
        }
        self.on_loaded.add(callback)
    }

    pub fn set_rebuild_hook(&mut self, hook: Box<dyn RebuildHook>) {
        self.rebuild_hook = Some(hook);
    }

    pub fn clear_rebuild_hook(&mut self) -> Option<Box<dyn RebuildHook>> {
        self.rebuild_hook.take()
    }

    pub fn has_rebuild_hook(&self) -> bool {
        self.rebuild_hook.is_some()
    }

    /// Resize the texture.
    ///
    /// The device reallocates the handle first; only if it accepts are the current
    /// and base dimensions overwritten and the logical size recomputed.
    pub fn update_size(
        &mut self,
        device: &dyn TextureDevice,
        width: u32,
        height: u32,
        depth: u32,
    ) -> TextureResult<()> {
        if self.is_disposed() {
            return Err(TextureError::UseAfterDispose { texture: self.id });
        }
        if let Some(handle) = self.handle {
            device
                .resize_handle(handle, width, height, depth)
                .map_err(|source| TextureError::DeviceResize {
                    texture: self.id,
                    source,
                })?;
        }

        self.width = width;
        self.height = height;
        self.depth = depth;
        self.base_width = width;
        self.base_height = height;
        self.base_depth = depth;
        self.size = width as u64 * height as u64 * depth as u64;
        Ok(())
    }

    /// Add a logical owner. Returns the new count.
    ///
    /// A disposed descriptor cannot be revived.
    pub fn increment_references(&mut self) -> TextureResult<u32> {
        if self.is_disposed() {
            return Err(TextureError::UseAfterDispose { texture: self.id });
        }
        self.references = self.references.saturating_add(1);
        Ok(self.references)
    }

    /// Drop one logical owner.
    ///
    /// Both observer channels are cleared on every call. The hardware handle and
    /// owned derived textures are released only when the count reaches zero.
    /// Returns `true` when this call released the texture.
    pub fn dispose(&mut self, device: &dyn TextureDevice) -> TextureResult<bool> {
        if self.references == 0 {
            return Err(TextureError::UseAfterDispose { texture: self.id });
        }

        self.references -= 1;
        self.on_loaded.clear();
        self.on_error.clear();

        if self.references > 0 {
            return Ok(false);
        }

        self.release_resources(device);
        Ok(true)
    }

    /// Free the hardware handle and every owned derived texture.
    ///
    /// Also bumps the rebuild token so completions issued before this point are
    /// discarded.
    pub(crate) fn release_resources(&mut self, device: &dyn TextureDevice) {
        if let Some(handle) = self.handle.take() {
            device.release_handle(handle);
        }
        for slot in DerivedSlot::ALL {
            if let Some(mut child) = self.take_derived(slot) {
                child.references = 0;
                child.release_resources(device);
            }
        }
        self.pending_polynomial = None;
        self.rebuild_token = self.rebuild_token.wrapping_add(1);
        self.is_ready = false;
    }

    /// Reset the state that a rebuild invalidates.
    pub(crate) fn begin_rebuild(&mut self) -> u64 {
        self.is_ready = false;
        self.sampler.invalidate();
        self.rebuild_token = self.rebuild_token.wrapping_add(1);
        self.rebuild_token
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.is_ready = ready;
    }

    pub(crate) fn notify_loaded(&mut self) {
        let mut observers = std::mem::take(&mut self.on_loaded);
        observers.notify(self);
        self.on_loaded = observers;
    }

    pub(crate) fn notify_error(&mut self, failure: &TextureFailure) {
        self.on_error.notify(failure);
    }
}
