//! Test utilities for the Halcyon texture crates.
//!
//! The main component is `MockTextureDevice` (requires the `mock` feature), a
//! [`TextureDevice`](halcyon_texture::TextureDevice) that hands out fake
//! hardware handles and records every call.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use std::sync::Arc;
//! use halcyon_test_utils::MockTextureDevice;
//! use halcyon_texture::{TextureDesc, TextureManager};
//!
//! let device = Arc::new(MockTextureDevice::new());
//! let mut textures = TextureManager::new(device.clone());
//!
//! let texture = textures.create(TextureDesc::url("sprites/player.png")).unwrap();
//! textures.rebuild(texture).unwrap();
//!
//! // Url loads stay pending until the test completes them.
//! assert_eq!(device.pending_count(), 1);
//! device.resolve_next();
//! textures.process_all_pending();
//! assert!(textures.get(texture).unwrap().is_ready());
//! # }
//! ```
//!
//! # Asynchronous loads
//!
//! Url, cube and prefiltered loads return futures backed by
//! `futures::channel::oneshot`. Nothing completes on its own: tests call
//! `resolve_next`, `resolve_all` or `fail_next` to decide when and how each
//! load finishes, which makes completion order fully deterministic.

#[cfg(feature = "mock")]
pub mod mock_device;

#[cfg(feature = "mock")]
pub use mock_device::*;
