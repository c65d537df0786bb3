//! GPU texture lifecycle management.
//!
//! This crate keeps track of textures whose hardware storage lives on a
//! [`TextureDevice`]: who owns them, how to recreate them after the rendering
//! context is lost, and how to move a freshly created handle into the
//! descriptor everyone already points at.
//!
//! # Overview
//!
//! - [`TextureManager`] - owns every live [`TextureDescriptor`] and drives rebuilds
//! - [`TextureDescriptor`] - a texture's semantic record plus its current [`HardwareHandle`]
//! - [`SourceKind`] - where the content came from, and so how it is regenerated
//! - [`TextureDevice`] - the GPU operations the lifecycle depends on
//!
//! # Example
//!
//! ```ignore
//! use halcyon_texture::{TextureDesc, TextureManager};
//!
//! let mut textures = TextureManager::new(device);
//! let sky = textures.create(TextureDesc::cube("textures/sky", None))?;
//!
//! // After a context loss:
//! textures.rebuild_all();
//! textures.process_all_pending();
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod event;
pub mod handle;
pub mod manager;
pub mod rebuild;
pub mod source;
pub mod spherical;
pub mod transfer;

pub use cache::LoadedTextureCache;
pub use config::ManagerConfig;
pub use descriptor::{DerivedSlot, SamplerCache, TextureDesc, TextureDescriptor, TextureShape};
pub use device::{
    ComponentType, CubeRawRequest, CubeUrlRequest, DeviceError, DeviceFuture, DynamicRequest,
    HandleUsage, HardwareHandle, PixelFormat, PrefilteredCube, PrefilteredCubeRequest, RawRequest,
    RawVolumeRequest, SamplingMode, SurfaceId, TextureDevice, UrlRequest,
};
pub use error::{TextureError, TextureResult};
pub use event::{Observable, ObserverId, TextureEvent, TextureEventBuffer, TextureFailure};
pub use handle::{TextureHandle, TextureId};
pub use manager::{DisposeOutcome, RebuildReport, RebuildStatus, TextureManager};
pub use rebuild::{CustomRebuild, Readiness, RebuildHook, RebuildPlan, Recreation, plan_rebuild};
pub use source::{BackingPayload, PayloadShape, SourceKind};
pub use spherical::{PolynomialFuture, SphericalPolynomial};
pub use transfer::TransferOutcome;
