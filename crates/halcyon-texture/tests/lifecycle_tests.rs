//! Integration tests for creation, reference counting and disposal.
//!
//! These tests drive a `TextureManager` against the mock device from
//! `halcyon-test-utils`, so every hardware call can be checked.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use halcyon_test_utils::{DeviceCall, MockTextureDevice};
use halcyon_texture::*;

// ============================================================================
// Helpers
// ============================================================================

fn setup() -> (Arc<MockTextureDevice>, TextureManager) {
    let device = Arc::new(MockTextureDevice::new());
    let manager = TextureManager::new(device.clone());
    (device, manager)
}

fn raw_desc() -> TextureDesc {
    TextureDesc::raw(
        vec![0u8; 64],
        4,
        4,
        PixelFormat::RGBA,
        ComponentType::UNSIGNED_BYTE,
    )
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_create_allocates_and_registers() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();

    let descriptor = textures.get(texture).unwrap();
    let handle = descriptor.handle().expect("texture should have a handle");
    assert!(device.is_live(handle));
    assert_eq!(descriptor.references(), 1);
    assert_eq!(descriptor.source(), SourceKind::Raw);

    assert!(textures.is_loaded(texture.id()));
    assert_eq!(textures.len(), 1);

    let events: Vec<_> = textures.drain_events().collect();
    assert!(matches!(events[..], [TextureEvent::Created { texture: id }] if id == texture.id()));
}

#[test]
fn test_deferred_allocation_has_no_handle() {
    let (device, mut textures) = setup();
    let texture = textures.create(TextureDesc::render_target(8, 8).deferred()).unwrap();

    assert_eq!(textures.get(texture).unwrap().handle(), None);
    assert_eq!(device.count_creates(), 0);
    assert!(textures.is_loaded(texture.id()));
}

#[test]
fn test_create_surfaces_device_failure() {
    let (device, mut textures) = setup();
    device.fail_operation("create_hardware_handle");

    let err = textures.create(raw_desc()).unwrap_err();
    assert!(matches!(
        err,
        TextureError::DeviceCreation {
            kind: SourceKind::Raw,
            ..
        }
    ));
    assert!(textures.is_empty());
    assert_eq!(textures.loaded_count(), 0);
}

#[test]
fn test_ids_are_unique_and_monotonic() {
    let (_device, mut textures) = setup();
    let a = textures.create(raw_desc()).unwrap();
    let b = textures.create(raw_desc()).unwrap();
    assert!(b.id() > a.id());
    assert_eq!(textures.loaded_ids(), vec![a.id(), b.id()]);
}

// ============================================================================
// Size
// ============================================================================

#[test]
fn test_update_size_sets_current_and_base_dims() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();

    textures.update_size(texture, 16, 8, 2).unwrap();

    let descriptor = textures.get(texture).unwrap();
    assert_eq!(
        (descriptor.width(), descriptor.height(), descriptor.depth()),
        (16, 8, 2)
    );
    assert_eq!(
        (
            descriptor.base_width(),
            descriptor.base_height(),
            descriptor.base_depth()
        ),
        (16, 8, 2)
    );
    assert_eq!(descriptor.size(), 256);
    assert_eq!(device.count_resizes(), 1);
}

#[test]
fn test_update_size_keeps_dims_when_device_refuses() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    device.fail_operation("resize_handle");

    let err = textures.update_size(texture, 4096, 4096, 1).unwrap_err();
    assert!(matches!(err, TextureError::DeviceResize { .. }));

    let descriptor = textures.get(texture).unwrap();
    assert_eq!((descriptor.width(), descriptor.base_width()), (4, 4));
    assert_eq!(descriptor.size(), 16);
}

#[test]
fn test_update_size_without_handle_skips_device() {
    let (device, mut textures) = setup();
    let texture = textures.create(TextureDesc::temp(2, 2).deferred()).unwrap();

    textures.update_size(texture, 3, 3, 1).unwrap();
    assert_eq!(textures.get(texture).unwrap().size(), 9);
    assert_eq!(device.count_resizes(), 0);
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn test_release_happens_on_last_dispose_only() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    let handle = textures.get(texture).unwrap().handle().unwrap();

    assert_eq!(textures.increment_references(texture).unwrap(), 2);
    assert_eq!(textures.increment_references(texture).unwrap(), 3);

    assert_eq!(
        textures.dispose(texture).unwrap(),
        DisposeOutcome::Retained { references: 2 }
    );
    assert_eq!(
        textures.dispose(texture).unwrap(),
        DisposeOutcome::Retained { references: 1 }
    );
    assert_eq!(device.count_releases(), 0);

    assert_eq!(textures.dispose(texture).unwrap(), DisposeOutcome::Released);
    assert_eq!(device.release_count(handle), 1);
}

#[test]
fn test_extra_disposals_are_rejected() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    let handle = textures.get(texture).unwrap().handle().unwrap();

    for _ in 0..4 {
        textures.increment_references(texture).unwrap();
    }
    for _ in 0..5 {
        textures.dispose(texture).unwrap();
    }

    for _ in 0..3 {
        let err = textures.dispose(texture).unwrap_err();
        assert!(err.is_use_after_dispose());
    }
    assert_eq!(device.release_count(handle), 1);
    assert!(textures.increment_references(texture).is_err());
}

#[test]
fn test_released_texture_leaves_manager() {
    let (_device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    textures.dispose(texture).unwrap();

    assert!(!textures.contains(texture));
    assert!(!textures.is_loaded(texture.id()));
    assert!(textures.get(texture).is_err());
    assert!(textures.drain_events().any(|event| event.is_released()));
}

#[test]
fn test_descriptor_dispose_clears_handle() {
    let device = MockTextureDevice::new();
    let mut descriptor = TextureDescriptor::allocate(raw_desc(), &device).unwrap();
    let handle = descriptor.handle().unwrap();
    assert_eq!(
        (
            descriptor.base_width(),
            descriptor.base_height(),
            descriptor.base_depth()
        ),
        (4, 4, 1)
    );

    assert!(descriptor.dispose(&device).unwrap());
    assert_eq!(descriptor.handle(), None);
    assert_eq!(device.release_count(handle), 1);

    assert!(descriptor.dispose(&device).unwrap_err().is_use_after_dispose());
    assert_eq!(device.release_count(handle), 1);
}

#[test]
fn test_stale_handle_does_not_reach_slot_reuse() {
    let (_device, mut textures) = setup();
    let first = textures.create(raw_desc()).unwrap();
    textures.dispose(first).unwrap();

    let second = textures.create(raw_desc()).unwrap();
    assert_eq!(first.slot().index(), second.slot().index());
    assert!(textures.get(first).is_err());
    assert!(textures.get(second).is_ok());
}

// ============================================================================
// Descriptors disposed outside the manager
// ============================================================================

/// Dispose through the descriptor itself, which leaves it registered.
fn dispose_in_place(
    device: &MockTextureDevice,
    textures: &mut TextureManager,
    texture: TextureHandle,
) -> HardwareHandle {
    let descriptor = textures.get_mut(texture).unwrap();
    let handle = descriptor.handle().unwrap();
    assert!(descriptor.dispose(device).unwrap());
    handle
}

#[test]
fn test_rebuild_refuses_disposed_descriptor() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    dispose_in_place(&device, &mut textures, texture);
    textures.drain_events().for_each(drop);
    let creates = device.count_creates();

    let err = textures.rebuild(texture).unwrap_err();
    assert!(err.is_use_after_dispose());

    let report = textures.rebuild_all();
    assert_eq!(report.failed, 1);

    let descriptor = textures.get(texture).unwrap();
    assert_eq!(descriptor.handle(), None);
    assert!(!descriptor.is_ready());
    assert_eq!(device.count_creates(), creates);
    assert!(device.live_handles().is_empty());
    assert!(!textures.drain_events().any(|event| matches!(event, TextureEvent::RebuildFailed { .. })));
}

#[test]
fn test_transfer_refuses_disposed_target() {
    let (device, mut textures) = setup();
    let source = textures.create(raw_desc()).unwrap();
    let target = textures.create(raw_desc()).unwrap();
    let source_handle = textures.get(source).unwrap().handle().unwrap();
    dispose_in_place(&device, &mut textures, target);

    let err = textures.transfer(source, target, true).unwrap_err();
    assert!(err.is_use_after_dispose());

    assert_eq!(textures.get(target).unwrap().handle(), None);
    assert!(textures.contains(source));
    assert!(textures.is_loaded(source.id()));
    assert!(device.is_live(source_handle));
    assert_eq!(device.count_reconfigures(), 0);
}

#[test]
fn test_increment_refuses_disposed_descriptor() {
    let (device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    let handle = dispose_in_place(&device, &mut textures, texture);

    assert!(textures.increment_references(texture).unwrap_err().is_use_after_dispose());
    assert_eq!(textures.get(texture).unwrap().references(), 0);
    assert_eq!(device.release_count(handle), 1);
}

// ============================================================================
// Observers
// ============================================================================

#[test]
fn test_dispose_clears_observers_even_when_retained() {
    let (_device, mut textures) = setup();
    let texture = textures.create(raw_desc()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    textures
        .on_loaded(texture, move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    textures.increment_references(texture).unwrap();
    textures.dispose(texture).unwrap();

    textures.mark_ready(texture).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 0);
    assert!(textures.get(texture).unwrap().is_ready());
}

#[test]
fn test_mark_ready_notifies_loaded_observers() {
    let (_device, mut textures) = setup();
    let texture = textures.create(TextureDesc::url("a.png")).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    textures
        .on_loaded(texture, move |descriptor| {
            assert!(descriptor.is_ready());
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    textures.mark_ready(texture).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    // Late observers fire immediately.
    let counter = hits.clone();
    textures
        .on_loaded(texture, move |_| {
            counter.fetch_add(10, Ordering::Relaxed);
        })
        .unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 11);
}

#[test]
fn test_report_error_reaches_error_observers() {
    let (_device, mut textures) = setup();
    let texture = textures.create(TextureDesc::url("missing.png")).unwrap();
    let messages = Arc::new(Mutex::new(Vec::new()));

    let sink = messages.clone();
    textures
        .on_error(texture, move |failure| {
            sink.lock().unwrap().push(failure.message.clone());
        })
        .unwrap();
    textures
        .report_error(texture, "decode failed", None)
        .unwrap();

    assert_eq!(*messages.lock().unwrap(), vec!["decode failed".to_string()]);
}

// ============================================================================
// Derived textures
// ============================================================================

#[test]
fn test_attach_derived_moves_ownership() {
    let (device, mut textures) = setup();
    let parent = textures.create(TextureDesc::prefiltered_cube("env.dds", 0.8, 0.0)).unwrap();
    let child = textures.create(raw_desc()).unwrap();
    let child_handle = textures.get(child).unwrap().handle().unwrap();

    textures
        .attach_derived(parent, DerivedSlot::LodHigh, child)
        .unwrap();

    assert!(!textures.contains(child));
    assert!(!textures.is_loaded(child.id()));
    assert_eq!(
        textures
            .get(parent)
            .unwrap()
            .derived(DerivedSlot::LodHigh)
            .map(|d| d.id()),
        Some(child.id())
    );

    textures.dispose(parent).unwrap();
    assert_eq!(device.release_count(child_handle), 1);
}

#[test]
fn test_attach_derived_releases_previous_occupant() {
    let (device, mut textures) = setup();
    let parent = textures.create(TextureDesc::temp(1, 1)).unwrap();
    let first = textures.create(raw_desc()).unwrap();
    let second = textures.create(raw_desc()).unwrap();
    let first_handle = textures.get(first).unwrap().handle().unwrap();

    textures
        .attach_derived(parent, DerivedSlot::Irradiance, first)
        .unwrap();
    textures
        .attach_derived(parent, DerivedSlot::Irradiance, second)
        .unwrap();

    assert_eq!(device.release_count(first_handle), 1);
    assert!(
        textures
            .attach_derived(parent, DerivedSlot::LodLow, parent)
            .is_err()
    );
}

#[test]
fn test_dropping_manager_releases_live_handles() {
    let device = Arc::new(MockTextureDevice::new());
    let mut textures = TextureManager::new(device.clone());
    let disposed = textures.create(raw_desc()).unwrap();
    textures.create(raw_desc()).unwrap();
    textures.create(raw_desc()).unwrap();
    textures.dispose(disposed).unwrap();

    drop(textures);

    assert!(device.live_handles().is_empty());
    let releases = device
        .calls()
        .into_iter()
        .filter(|call| matches!(call, DeviceCall::Release { .. }))
        .count();
    assert_eq!(releases, 3);
}
