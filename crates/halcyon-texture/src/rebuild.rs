//! Recreating a texture's hardware handle after the old one became invalid.
//!
//! [`plan_rebuild`] looks at a descriptor's [`SourceKind`] (or its custom
//! [`RebuildHook`]) and produces a replacement descriptor holding a fresh handle.
//! The replacement is then transferred into the original with
//! [`TextureDescriptor::transfer_into`], so the original keeps its identity.

use crate::descriptor::TextureDescriptor;
use crate::device::{
    CubeRawRequest, CubeUrlRequest, DeviceError, DeviceFuture, DynamicRequest, HardwareHandle,
    PrefilteredCubeRequest, RawRequest, RawVolumeRequest, TextureDevice, UrlRequest,
};
use crate::error::{TextureError, TextureResult};
use crate::source::{BackingPayload, SourceKind};

/// A recreated value that is either available now or still being produced by the device.
pub enum Recreation<T> {
    Ready(T),
    Pending(DeviceFuture<T>),
}

impl<T> Recreation<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Recreation::Pending(_))
    }
}

impl<T> std::fmt::Debug for Recreation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recreation::Ready(_) => f.write_str("Recreation::Ready(..)"),
            Recreation::Pending(_) => f.write_str("Recreation::Pending(..)"),
        }
    }
}

/// How the rebuilt texture decides it is ready once the new handle is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Ready as soon as the handle is in place.
    MarkReady,
    /// Push the current render surface into the handle; the device reports readiness.
    FromRenderSurface,
    /// Readiness chosen by a custom hook.
    Hook(bool),
}

/// What a rebuild will install into the texture.
#[derive(Debug)]
pub struct RebuildPlan {
    pub replacement: Recreation<TextureDescriptor>,
    pub readiness: Readiness,
    /// Whether the transfer copies shape flags (the RGBD bit) from the replacement.
    pub transfer_shape_flags: bool,
    /// The texture's rebuild token when the plan was made.
    pub token: u64,
}

/// Result of a custom rebuild hook.
pub struct CustomRebuild {
    pub replacement: Recreation<TextureDescriptor>,
    /// Readiness applied after the replacement has been transferred.
    pub is_ready: bool,
}

impl CustomRebuild {
    pub fn ready(replacement: TextureDescriptor, is_ready: bool) -> Self {
        Self {
            replacement: Recreation::Ready(replacement),
            is_ready,
        }
    }

    pub fn pending(replacement: DeviceFuture<TextureDescriptor>, is_ready: bool) -> Self {
        Self {
            replacement: Recreation::Pending(replacement),
            is_ready,
        }
    }

    pub fn is_async(&self) -> bool {
        self.replacement.is_pending()
    }
}

/// Replaces the built-in rebuild strategy for one texture.
pub trait RebuildHook: Send {
    fn rebuild(
        &mut self,
        texture: &TextureDescriptor,
        device: &dyn TextureDevice,
    ) -> TextureResult<CustomRebuild>;
}

impl<F> RebuildHook for F
where
    F: FnMut(&TextureDescriptor, &dyn TextureDevice) -> TextureResult<CustomRebuild> + Send,
{
    fn rebuild(
        &mut self,
        texture: &TextureDescriptor,
        device: &dyn TextureDevice,
    ) -> TextureResult<CustomRebuild> {
        self(texture, device)
    }
}

/// Work out how to recreate `texture`.
///
/// Returns `Ok(None)` for kinds with nothing to regenerate; those leave the
/// descriptor untouched. Otherwise the ready flag and sampler cache are cleared,
/// the rebuild token is advanced, and synchronous kinds are recreated on the spot.
pub fn plan_rebuild(
    texture: &mut TextureDescriptor,
    device: &dyn TextureDevice,
) -> TextureResult<Option<RebuildPlan>> {
    if texture.is_disposed() {
        return Err(TextureError::UseAfterDispose { texture: texture.id() });
    }

    if let Some(mut hook) = texture.rebuild_hook.take() {
        let token = texture.begin_rebuild();
        let result = hook.rebuild(texture, device);
        texture.rebuild_hook = Some(hook);
        let custom = result?;
        return Ok(Some(RebuildPlan {
            replacement: custom.replacement,
            readiness: Readiness::Hook(custom.is_ready),
            transfer_shape_flags: true,
            token,
        }));
    }

    if !texture.source().is_rebuildable() {
        return Ok(None);
    }

    let token = texture.begin_rebuild();
    let creation_error = |source: DeviceError| TextureError::DeviceCreation {
        texture: texture.id(),
        kind: texture.source(),
        source,
    };

    let (replacement, readiness, transfer_shape_flags) = match texture.source() {
        SourceKind::Url => {
            let url = texture
                .original_url()
                .or(texture.url())
                .unwrap_or_default()
                .to_string();
            let request = UrlRequest {
                url,
                generate_mipmaps: texture.generate_mipmaps(),
                invert_y: texture.invert_y(),
                sampling_mode: texture.sampling_mode(),
                buffer: texture.payload().buffer().cloned(),
                format: texture.format(),
                extension: texture.extension().map(str::to_string),
                use_srgb_buffer: texture.use_srgb_buffer(),
            };
            (
                pending_handle(device.create_from_url(&request)),
                Readiness::MarkReady,
                true,
            )
        }
        SourceKind::Raw => {
            let data = required_buffer(texture)?;
            let request = RawRequest {
                data,
                width: texture.base_width(),
                height: texture.base_height(),
                format: texture.format(),
                generate_mipmaps: texture.generate_mipmaps(),
                invert_y: texture.invert_y(),
                sampling_mode: texture.sampling_mode(),
                compression: texture.compression().map(str::to_string),
                component_type: texture.component_type(),
                use_srgb_buffer: texture.use_srgb_buffer(),
            };
            let handle = device.create_raw(&request).map_err(creation_error)?;
            (ready_handle(handle), Readiness::MarkReady, true)
        }
        SourceKind::Raw3D | SourceKind::Raw2DArray => {
            let data = required_buffer(texture)?;
            let request = RawVolumeRequest {
                data,
                width: texture.base_width(),
                height: texture.base_height(),
                depth: texture.base_depth(),
                format: texture.format(),
                generate_mipmaps: texture.generate_mipmaps(),
                invert_y: texture.invert_y(),
                sampling_mode: texture.sampling_mode(),
                compression: texture.compression().map(str::to_string),
                component_type: texture.component_type(),
            };
            let handle = if texture.source() == SourceKind::Raw3D {
                device.create_raw_3d(&request)
            } else {
                device.create_raw_2d_array(&request)
            }
            .map_err(creation_error)?;
            (ready_handle(handle), Readiness::MarkReady, true)
        }
        SourceKind::Dynamic => {
            let request = DynamicRequest {
                width: texture.base_width(),
                height: texture.base_height(),
                generate_mipmaps: texture.generate_mipmaps(),
                sampling_mode: texture.sampling_mode(),
            };
            let handle = device.create_dynamic(&request).map_err(creation_error)?;
            (ready_handle(handle), Readiness::FromRenderSurface, true)
        }
        SourceKind::Cube => {
            let request = CubeUrlRequest {
                url: texture.url().unwrap_or_default().to_string(),
                files: texture.cube_files().map(<[String]>::to_vec),
                generate_mipmaps: texture.generate_mipmaps(),
                format: texture.format(),
                extension: texture.extension().map(str::to_string),
                use_srgb_buffer: texture.use_srgb_buffer(),
            };
            (
                pending_handle(device.create_cube_from_urls(&request)),
                Readiness::MarkReady,
                true,
            )
        }
        SourceKind::CubeRaw => {
            let BackingPayload::Faces(faces) = texture.payload() else {
                return Err(missing_payload(texture));
            };
            let request = CubeRawRequest {
                faces: faces.clone(),
                size: texture.width(),
                format: texture.format(),
                component_type: texture.component_type(),
                generate_mipmaps: texture.generate_mipmaps(),
                invert_y: texture.invert_y(),
                sampling_mode: texture.sampling_mode(),
                compression: texture.compression().map(str::to_string),
            };
            let handle = device.create_cube_raw(&request).map_err(creation_error)?;
            (ready_handle(handle), Readiness::MarkReady, true)
        }
        SourceKind::CubePrefiltered => {
            let request = PrefilteredCubeRequest {
                url: texture.url().unwrap_or_default().to_string(),
                lod_scale: texture.lod_generation_scale(),
                lod_offset: texture.lod_generation_offset(),
                format: texture.format(),
                extension: texture.extension().map(str::to_string),
            };
            let fallback = texture.spherical_polynomial().copied();
            let load = device.create_prefiltered_cube(&request);
            let replacement: DeviceFuture<TextureDescriptor> = Box::pin(async move {
                let cube = load.await?;
                let mut replacement = TextureDescriptor::from_handle(cube.handle);
                replacement.set_spherical_polynomial(cube.spherical_polynomial.or(fallback));
                Ok::<_, DeviceError>(replacement)
            });
            (Recreation::Pending(replacement), Readiness::MarkReady, false)
        }
        // `is_rebuildable` already filtered the rest.
        _ => return Ok(None),
    };

    Ok(Some(RebuildPlan {
        replacement,
        readiness,
        transfer_shape_flags,
        token,
    }))
}

fn ready_handle(handle: HardwareHandle) -> Recreation<TextureDescriptor> {
    Recreation::Ready(TextureDescriptor::from_handle(handle))
}

fn pending_handle(load: DeviceFuture<HardwareHandle>) -> Recreation<TextureDescriptor> {
    Recreation::Pending(Box::pin(async move {
        let handle = load.await?;
        Ok::<_, DeviceError>(TextureDescriptor::from_handle(handle))
    }))
}

fn required_buffer(texture: &TextureDescriptor) -> TextureResult<std::sync::Arc<[u8]>> {
    texture
        .payload()
        .buffer()
        .cloned()
        .ok_or_else(|| missing_payload(texture))
}

fn missing_payload(texture: &TextureDescriptor) -> TextureError {
    TextureError::MissingPayload {
        texture: texture.id(),
        kind: texture.source(),
    }
}
