//! Swap-and-die: moving a descriptor's hardware resources into another descriptor.

use crate::descriptor::{DerivedSlot, TextureDescriptor};
use crate::device::{HandleUsage, HardwareHandle, TextureDevice};
use crate::error::{TextureError, TextureResult};
use crate::handle::TextureId;

/// What a transfer left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The id of the descriptor that was consumed.
    pub retired: TextureId,
    /// The handle the target held before it was overwritten, if it differs from the new one.
    pub displaced: Option<HardwareHandle>,
}

impl TextureDescriptor {
    /// Move this descriptor's handle and derived resources into `target`, consuming `self`.
    ///
    /// The target keeps its identity and every semantic property except those
    /// listed here. The handle is reconfigured for the target's usage, then
    /// installed unconditionally. Derived LOD and irradiance textures present on
    /// `self` replace (and release) the target's. A spherical polynomial on `self`
    /// replaces the target's.
    ///
    /// The target's previous handle is returned in the outcome instead of being
    /// released, since the caller knows whether it is still a live device object.
    ///
    /// A disposed target is refused with [`TextureError::UseAfterDispose`]; the
    /// resources of `self` are released instead of being installed.
    pub fn transfer_into(
        mut self,
        target: &mut TextureDescriptor,
        transfer_shape_flags: bool,
        device: &dyn TextureDevice,
    ) -> TextureResult<TransferOutcome> {
        if target.is_disposed() {
            tracing::warn!("Refusing transfer of {} into disposed {}", self.id(), target.id());
            self.release_resources(device);
            return Err(TextureError::UseAfterDispose { texture: target.id() });
        }

        if let Some(handle) = self.handle {
            device.reconfigure_handle(
                handle,
                &HandleUsage {
                    source: target.source(),
                    generate_mipmaps: target.generate_mipmaps(),
                    is_cube: target.is_cube(),
                    width: target.width(),
                    height: target.height(),
                },
            );
        }

        let previous = std::mem::replace(&mut target.handle, self.handle.take());
        let displaced = previous.filter(|old| Some(*old) != target.handle);

        if transfer_shape_flags {
            target.is_rgbd = self.is_rgbd;
        }

        for slot in DerivedSlot::ALL {
            if let Some(child) = self.take_derived(slot)
                && let Some(mut old) = target.replace_derived(slot, *child)
            {
                old.release_resources(device);
            }
        }

        if let Some(polynomial) = self.spherical_polynomial.take() {
            target.spherical_polynomial = Some(polynomial);
        }

        tracing::trace!("Transferred resources of {} into {}", self.id(), target.id());

        Ok(TransferOutcome {
            retired: self.id(),
            displaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TextureDesc;
    use crate::device::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDevice {
        reconfigured: Mutex<Vec<(HardwareHandle, HandleUsage)>>,
        released: Mutex<Vec<HardwareHandle>>,
    }

    impl TextureDevice for RecordingDevice {
        fn create_hardware_handle(&self) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn resize_handle(&self, _: HardwareHandle, _: u32, _: u32, _: u32) -> Result<(), DeviceError> {
            Ok(())
        }
        fn reconfigure_handle(&self, handle: HardwareHandle, usage: &HandleUsage) {
            self.reconfigured.lock().unwrap().push((handle, *usage));
        }
        fn create_from_url(&self, _: &UrlRequest) -> DeviceFuture<HardwareHandle> {
            Box::pin(std::future::ready(Err::<HardwareHandle, _>(DeviceError::ContextLost)))
        }
        fn create_raw(&self, _: &RawRequest) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn create_raw_3d(&self, _: &RawVolumeRequest) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn create_raw_2d_array(&self, _: &RawVolumeRequest) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn create_dynamic(&self, _: &DynamicRequest) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn render_surface(&self) -> Option<SurfaceId> {
            None
        }
        fn push_surface_into_dynamic(
            &self,
            _: HardwareHandle,
            _: SurfaceId,
            _: bool,
            _: PixelFormat,
        ) -> Result<bool, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn create_cube_from_urls(&self, _: &CubeUrlRequest) -> DeviceFuture<HardwareHandle> {
            Box::pin(std::future::ready(Err::<HardwareHandle, _>(DeviceError::ContextLost)))
        }
        fn create_cube_raw(&self, _: &CubeRawRequest) -> Result<HardwareHandle, DeviceError> {
            Err(DeviceError::ContextLost)
        }
        fn create_prefiltered_cube(&self, _: &PrefilteredCubeRequest) -> DeviceFuture<PrefilteredCube> {
            Box::pin(std::future::ready(Err::<PrefilteredCube, _>(DeviceError::ContextLost)))
        }
        fn release_handle(&self, handle: HardwareHandle) {
            self.released.lock().unwrap().push(handle);
        }
    }

    fn handle(raw: u64) -> HardwareHandle {
        HardwareHandle::from_raw(raw).unwrap()
    }

    fn with_handle(desc: TextureDesc, raw: u64) -> TextureDescriptor {
        let mut descriptor = TextureDescriptor::new(desc);
        descriptor.handle = Some(handle(raw));
        descriptor
    }

    #[test]
    fn test_handle_moves_and_target_usage_is_applied() {
        let device = RecordingDevice::default();
        let source = TextureDescriptor::from_handle(handle(10));
        let mut target = with_handle(TextureDesc::cube("sky", None).with_size(64, 64), 3);
        let target_id = target.id();

        let outcome = source.transfer_into(&mut target, true, &device).unwrap();

        assert_eq!(target.id(), target_id);
        assert_eq!(target.handle(), Some(handle(10)));
        assert_eq!(outcome.displaced, Some(handle(3)));

        let reconfigured = device.reconfigured.lock().unwrap();
        assert_eq!(reconfigured.len(), 1);
        let (moved, usage) = reconfigured[0];
        assert_eq!(moved, handle(10));
        assert_eq!(usage.source, crate::source::SourceKind::Cube);
        assert!(usage.is_cube);
        assert_eq!((usage.width, usage.height), (64, 64));
    }

    #[test]
    fn test_handleless_source_clears_target_handle() {
        let device = RecordingDevice::default();
        let source = TextureDescriptor::new(TextureDesc::temp(1, 1));
        let mut target = with_handle(TextureDesc::temp(1, 1), 4);

        let outcome = source.transfer_into(&mut target, true, &device).unwrap();
        assert_eq!(target.handle(), None);
        assert_eq!(outcome.displaced, Some(handle(4)));
        assert!(device.reconfigured.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shape_flags_follow_switch() {
        let device = RecordingDevice::default();
        let mut source = TextureDescriptor::from_handle(handle(1));
        source.set_rgbd(true);
        let mut target = TextureDescriptor::new(TextureDesc::temp(1, 1));
        source.transfer_into(&mut target, false, &device).unwrap();
        assert!(!target.is_rgbd());

        let mut source = TextureDescriptor::from_handle(handle(2));
        source.set_rgbd(true);
        source.transfer_into(&mut target, true, &device).unwrap();
        assert!(target.is_rgbd());
    }

    #[test]
    fn test_derived_textures_move_and_old_ones_are_released() {
        let device = RecordingDevice::default();
        let mut source = TextureDescriptor::from_handle(handle(1));
        source.replace_derived(DerivedSlot::LodHigh, with_handle(TextureDesc::temp(1, 1), 20));

        let mut target = TextureDescriptor::new(TextureDesc::temp(1, 1));
        target.replace_derived(DerivedSlot::LodHigh, with_handle(TextureDesc::temp(1, 1), 30));
        target.replace_derived(DerivedSlot::Irradiance, with_handle(TextureDesc::temp(1, 1), 40));

        source.transfer_into(&mut target, true, &device).unwrap();

        assert_eq!(
            target.derived(DerivedSlot::LodHigh).and_then(|d| d.handle()),
            Some(handle(20))
        );
        assert_eq!(
            target.derived(DerivedSlot::Irradiance).and_then(|d| d.handle()),
            Some(handle(40))
        );
        assert_eq!(*device.released.lock().unwrap(), vec![handle(30)]);
    }

    #[test]
    fn test_polynomial_replaces_target() {
        use crate::spherical::SphericalPolynomial;

        let device = RecordingDevice::default();
        let fresh = SphericalPolynomial::uniform(glam::Vec3::splat(2.0));
        let mut source = TextureDescriptor::from_handle(handle(1));
        source.set_spherical_polynomial(Some(fresh));

        let mut target = TextureDescriptor::new(TextureDesc::prefiltered_cube("env", 1.0, 0.0));
        target.set_spherical_polynomial(Some(SphericalPolynomial::default()));

        source.transfer_into(&mut target, false, &device).unwrap();
        assert_eq!(target.spherical_polynomial(), Some(&fresh));

        // A source without a polynomial leaves the target's alone.
        TextureDescriptor::from_handle(handle(2))
            .transfer_into(&mut target, false, &device)
            .unwrap();
        assert_eq!(target.spherical_polynomial(), Some(&fresh));
    }

    #[test]
    fn test_disposed_target_refuses_transfer() {
        let device = RecordingDevice::default();
        let mut source = TextureDescriptor::from_handle(handle(7));
        source.replace_derived(DerivedSlot::Irradiance, with_handle(TextureDesc::temp(1, 1), 8));
        let mut target = TextureDescriptor::new(TextureDesc::temp(1, 1));
        target.dispose(&device).unwrap();

        let err = source.transfer_into(&mut target, true, &device).unwrap_err();
        assert!(err.is_use_after_dispose());
        assert_eq!(target.handle(), None);
        assert!(target.derived(DerivedSlot::Irradiance).is_none());
        assert!(device.reconfigured.lock().unwrap().is_empty());
        assert_eq!(*device.released.lock().unwrap(), vec![handle(7), handle(8)]);
    }
}
