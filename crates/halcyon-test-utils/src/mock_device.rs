//! Mock implementation of TextureDevice for testing.
//!
//! Handles are plain counters; nothing touches a GPU. Every call is recorded so
//! tests can assert on exactly what the lifecycle asked the device to do.

use std::collections::VecDeque;

use futures::channel::oneshot;
use halcyon_texture::{
    CubeRawRequest, CubeUrlRequest, DeviceError, DeviceFuture, DynamicRequest, HandleUsage,
    HardwareHandle, PixelFormat, PrefilteredCube, PrefilteredCubeRequest, RawRequest,
    RawVolumeRequest, SphericalPolynomial, SurfaceId, TextureDevice, UrlRequest,
};
use parking_lot::Mutex;

/// Records a device operation for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateHandle {
        handle: HardwareHandle,
    },
    Resize {
        handle: HardwareHandle,
        width: u32,
        height: u32,
        depth: u32,
    },
    Reconfigure {
        handle: HardwareHandle,
        usage: HandleUsage,
    },
    CreateFromUrl {
        url: String,
        has_buffer: bool,
    },
    CreateRaw {
        width: u32,
        height: u32,
        bytes: usize,
    },
    CreateRaw3D {
        width: u32,
        height: u32,
        depth: u32,
    },
    CreateRaw2DArray {
        width: u32,
        height: u32,
        layers: u32,
    },
    CreateDynamic {
        width: u32,
        height: u32,
    },
    PushSurface {
        handle: HardwareHandle,
        surface: SurfaceId,
    },
    CreateCubeFromUrls {
        url: String,
        files: Option<Vec<String>>,
    },
    CreateCubeRaw {
        size: u32,
        faces: usize,
    },
    CreatePrefilteredCube {
        url: String,
        lod_scale: f32,
        lod_offset: f32,
    },
    Release {
        handle: HardwareHandle,
    },
}

impl DeviceCall {
    /// Whether this call produced (or will produce) a new hardware handle.
    pub fn is_creation(&self) -> bool {
        !matches!(
            self,
            DeviceCall::Resize { .. }
                | DeviceCall::Reconfigure { .. }
                | DeviceCall::PushSurface { .. }
                | DeviceCall::Release { .. }
        )
    }
}

/// An asynchronous load waiting for the test to complete it.
enum PendingCompletion {
    Handle(oneshot::Sender<Result<HardwareHandle, DeviceError>>),
    Prefiltered(oneshot::Sender<Result<PrefilteredCube, DeviceError>>),
}

struct MockState {
    next_handle: u64,
    live: Vec<HardwareHandle>,
    released: Vec<HardwareHandle>,
    pending: VecDeque<PendingCompletion>,
    failing: Vec<&'static str>,
    render_surface: Option<SurfaceId>,
    dynamic_ready: bool,
    prefiltered_polynomial: Option<SphericalPolynomial>,
}

impl MockState {
    fn allocate(&mut self) -> HardwareHandle {
        self.next_handle += 1;
        // next_handle starts at 0 and only grows, so it is never zero here.
        let handle = HardwareHandle::from_raw(self.next_handle)
            .unwrap_or_else(|| unreachable!("handle counter is non-zero"));
        self.live.push(handle);
        handle
    }

    fn check(&self, operation: &'static str) -> Result<(), DeviceError> {
        if self.failing.contains(&operation) {
            Err(DeviceError::Rejected {
                operation,
                reason: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Mock implementation of [`TextureDevice`] for testing.
///
/// Methods take `&self` and record into `parking_lot::Mutex`es, so the mock can
/// be shared as `Arc<dyn TextureDevice>` with a manager while the test keeps
/// its own `Arc<MockTextureDevice>` for assertions.
///
/// # Example
///
/// ```rust
/// use halcyon_test_utils::MockTextureDevice;
/// use halcyon_texture::TextureDevice;
///
/// let mock = MockTextureDevice::new();
/// let handle = mock.create_hardware_handle().unwrap();
/// mock.release_handle(handle);
///
/// assert_eq!(mock.count_creates(), 1);
/// assert_eq!(mock.release_count(handle), 1);
/// ```
pub struct MockTextureDevice {
    /// Recorded calls for verification
    calls: Mutex<Vec<DeviceCall>>,

    state: Mutex<MockState>,
}

impl MockTextureDevice {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(MockState {
                next_handle: 0,
                live: Vec::new(),
                released: Vec::new(),
                pending: VecDeque::new(),
                failing: Vec::new(),
                render_surface: Some(SurfaceId(1)),
                dynamic_ready: true,
                prefiltered_polynomial: None,
            }),
        }
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().push(call);
    }

    /// Make every later call to `operation` fail (by trait method name).
    pub fn fail_operation(&self, operation: &'static str) {
        self.state.lock().failing.push(operation);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// The surface reported by `render_surface`. Defaults to `Some(SurfaceId(1))`.
    pub fn set_render_surface(&self, surface: Option<SurfaceId>) {
        self.state.lock().render_surface = surface;
    }

    /// What `push_surface_into_dynamic` reports. Defaults to `true`.
    pub fn set_dynamic_ready(&self, ready: bool) {
        self.state.lock().dynamic_ready = ready;
    }

    /// Polynomial attached to prefiltered cube loads when they resolve.
    pub fn set_prefiltered_polynomial(&self, polynomial: Option<SphericalPolynomial>) {
        self.state.lock().prefiltered_polynomial = polynomial;
    }

    /// Number of asynchronous loads still waiting.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Complete the oldest pending load with a fresh handle.
    ///
    /// Returns the handle, or `None` if nothing was pending.
    pub fn resolve_next(&self) -> Option<HardwareHandle> {
        let mut state = self.state.lock();
        let completion = state.pending.pop_front()?;
        let handle = state.allocate();
        match completion {
            PendingCompletion::Handle(sender) => {
                let _ = sender.send(Ok(handle));
            }
            PendingCompletion::Prefiltered(sender) => {
                let _ = sender.send(Ok(PrefilteredCube {
                    handle,
                    spherical_polynomial: state.prefiltered_polynomial,
                }));
            }
        }
        Some(handle)
    }

    /// Complete every pending load, oldest first.
    pub fn resolve_all(&self) -> Vec<HardwareHandle> {
        std::iter::from_fn(|| self.resolve_next()).collect()
    }

    /// Fail the oldest pending load. Returns `false` if nothing was pending.
    pub fn fail_next(&self, reason: &str) -> bool {
        let Some(completion) = self.state.lock().pending.pop_front() else {
            return false;
        };
        let error = DeviceError::Rejected {
            operation: "async load",
            reason: reason.to_string(),
        };
        match completion {
            PendingCompletion::Handle(sender) => {
                let _ = sender.send(Err(error));
            }
            PendingCompletion::Prefiltered(sender) => {
                let _ = sender.send(Err(error));
            }
        }
        true
    }

    /// Handles created and not yet released.
    pub fn live_handles(&self) -> Vec<HardwareHandle> {
        self.state.lock().live.clone()
    }

    /// Every release, in order. A handle appearing twice was double-freed.
    pub fn released_handles(&self) -> Vec<HardwareHandle> {
        self.state.lock().released.clone()
    }

    pub fn release_count(&self, handle: HardwareHandle) -> usize {
        self.state
            .lock()
            .released
            .iter()
            .filter(|released| **released == handle)
            .count()
    }

    pub fn is_live(&self, handle: HardwareHandle) -> bool {
        self.state.lock().live.contains(&handle)
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Count calls that create handles, including async loads not yet resolved.
    pub fn count_creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_creation())
            .count()
    }

    pub fn count_releases(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Release { .. }))
            .count()
    }

    pub fn count_reconfigures(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Reconfigure { .. }))
            .count()
    }

    pub fn count_resizes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Resize { .. }))
            .count()
    }

    pub fn count_surface_pushes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::PushSurface { .. }))
            .count()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn create_sync(&self, operation: &'static str, call: DeviceCall) -> Result<HardwareHandle, DeviceError> {
        self.record(call);
        let mut state = self.state.lock();
        state.check(operation)?;
        Ok(state.allocate())
    }

    fn queue_handle(&self, operation: &'static str) -> DeviceFuture<HardwareHandle> {
        let mut state = self.state.lock();
        if let Err(err) = state.check(operation) {
            return Box::pin(async move { Err::<HardwareHandle, _>(err) });
        }
        let (sender, receiver) = oneshot::channel();
        state.pending.push_back(PendingCompletion::Handle(sender));
        Box::pin(async move { receiver.await.unwrap_or(Err(DeviceError::Cancelled)) })
    }
}

impl Default for MockTextureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureDevice for MockTextureDevice {
    fn create_hardware_handle(&self) -> Result<HardwareHandle, DeviceError> {
        let mut state = self.state.lock();
        state.check("create_hardware_handle")?;
        let handle = state.allocate();
        drop(state);
        self.record(DeviceCall::CreateHandle { handle });
        Ok(handle)
    }

    fn resize_handle(
        &self,
        handle: HardwareHandle,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<(), DeviceError> {
        self.record(DeviceCall::Resize {
            handle,
            width,
            height,
            depth,
        });
        self.state.lock().check("resize_handle")
    }

    fn reconfigure_handle(&self, handle: HardwareHandle, usage: &HandleUsage) {
        self.record(DeviceCall::Reconfigure {
            handle,
            usage: *usage,
        });
    }

    fn create_from_url(&self, request: &UrlRequest) -> DeviceFuture<HardwareHandle> {
        self.record(DeviceCall::CreateFromUrl {
            url: request.url.clone(),
            has_buffer: request.buffer.is_some(),
        });
        self.queue_handle("create_from_url")
    }

    fn create_raw(&self, request: &RawRequest) -> Result<HardwareHandle, DeviceError> {
        self.create_sync(
            "create_raw",
            DeviceCall::CreateRaw {
                width: request.width,
                height: request.height,
                bytes: request.data.len(),
            },
        )
    }

    fn create_raw_3d(&self, request: &RawVolumeRequest) -> Result<HardwareHandle, DeviceError> {
        self.create_sync(
            "create_raw_3d",
            DeviceCall::CreateRaw3D {
                width: request.width,
                height: request.height,
                depth: request.depth,
            },
        )
    }

    fn create_raw_2d_array(
        &self,
        request: &RawVolumeRequest,
    ) -> Result<HardwareHandle, DeviceError> {
        self.create_sync(
            "create_raw_2d_array",
            DeviceCall::CreateRaw2DArray {
                width: request.width,
                height: request.height,
                layers: request.depth,
            },
        )
    }

    fn create_dynamic(&self, request: &DynamicRequest) -> Result<HardwareHandle, DeviceError> {
        self.create_sync(
            "create_dynamic",
            DeviceCall::CreateDynamic {
                width: request.width,
                height: request.height,
            },
        )
    }

    fn render_surface(&self) -> Option<SurfaceId> {
        self.state.lock().render_surface
    }

    fn push_surface_into_dynamic(
        &self,
        handle: HardwareHandle,
        surface: SurfaceId,
        _invert_y: bool,
        _format: PixelFormat,
    ) -> Result<bool, DeviceError> {
        self.record(DeviceCall::PushSurface { handle, surface });
        let state = self.state.lock();
        state.check("push_surface_into_dynamic")?;
        Ok(state.dynamic_ready)
    }

    fn create_cube_from_urls(&self, request: &CubeUrlRequest) -> DeviceFuture<HardwareHandle> {
        self.record(DeviceCall::CreateCubeFromUrls {
            url: request.url.clone(),
            files: request.files.clone(),
        });
        self.queue_handle("create_cube_from_urls")
    }

    fn create_cube_raw(&self, request: &CubeRawRequest) -> Result<HardwareHandle, DeviceError> {
        self.create_sync(
            "create_cube_raw",
            DeviceCall::CreateCubeRaw {
                size: request.size,
                faces: request.faces.len(),
            },
        )
    }

    fn create_prefiltered_cube(
        &self,
        request: &PrefilteredCubeRequest,
    ) -> DeviceFuture<PrefilteredCube> {
        self.record(DeviceCall::CreatePrefilteredCube {
            url: request.url.clone(),
            lod_scale: request.lod_scale,
            lod_offset: request.lod_offset,
        });

        let mut state = self.state.lock();
        if let Err(err) = state.check("create_prefiltered_cube") {
            return Box::pin(async move { Err::<PrefilteredCube, _>(err) });
        }
        let (sender, receiver) = oneshot::channel();
        state.pending.push_back(PendingCompletion::Prefiltered(sender));
        Box::pin(async move { receiver.await.unwrap_or(Err(DeviceError::Cancelled)) })
    }

    fn release_handle(&self, handle: HardwareHandle) {
        self.record(DeviceCall::Release { handle });
        let mut state = self.state.lock();
        state.live.retain(|live| *live != handle);
        state.released.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_sync_creation_records_call() {
        let mock = MockTextureDevice::new();
        let handle = mock
            .create_raw(&RawRequest {
                data: vec![0u8; 16].into(),
                width: 2,
                height: 2,
                format: PixelFormat::RGBA,
                generate_mipmaps: false,
                invert_y: false,
                sampling_mode: Default::default(),
                compression: None,
                component_type: Default::default(),
                use_srgb_buffer: false,
            })
            .unwrap();

        assert!(mock.is_live(handle));
        assert_eq!(
            mock.calls(),
            vec![DeviceCall::CreateRaw {
                width: 2,
                height: 2,
                bytes: 16
            }]
        );
    }

    #[test]
    fn test_async_load_resolves_on_demand() {
        let mock = MockTextureDevice::new();
        let load = mock.create_cube_from_urls(&CubeUrlRequest {
            url: "sky".to_string(),
            files: None,
            generate_mipmaps: true,
            format: PixelFormat::RGBA,
            extension: None,
            use_srgb_buffer: false,
        });
        assert_eq!(mock.pending_count(), 1);

        let handle = mock.resolve_next();
        assert_eq!(block_on(load).ok(), handle);
        assert_eq!(mock.pending_count(), 0);
    }

    #[test]
    fn test_failed_load() {
        let mock = MockTextureDevice::new();
        let load = mock.create_from_url(&UrlRequest {
            url: "a.png".to_string(),
            generate_mipmaps: false,
            invert_y: false,
            sampling_mode: Default::default(),
            buffer: None,
            format: PixelFormat::RGBA,
            extension: None,
            use_srgb_buffer: false,
        });
        assert!(mock.fail_next("404"));
        assert!(matches!(block_on(load), Err(DeviceError::Rejected { .. })));
        assert!(!mock.fail_next("nothing pending"));
    }

    #[test]
    fn test_injected_failure() {
        let mock = MockTextureDevice::new();
        mock.fail_operation("create_hardware_handle");
        assert!(mock.create_hardware_handle().is_err());
        mock.clear_failures();
        assert!(mock.create_hardware_handle().is_ok());
    }

    #[test]
    fn test_release_tracking() {
        let mock = MockTextureDevice::new();
        let handle = mock.create_hardware_handle().unwrap();
        mock.release_handle(handle);
        mock.release_handle(handle);
        assert!(!mock.is_live(handle));
        assert_eq!(mock.release_count(handle), 2);
        assert_eq!(mock.count_releases(), 2);
    }
}
