//! The texture manager - owner of every live texture descriptor on a device.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_lite::future;
use halcyon_core::alloc::HashMap;
use halcyon_core::alloc::sparse_set::{IndexSlot, SparseSet};
use halcyon_core::profiling::profile_function;

use crate::cache::LoadedTextureCache;
use crate::config::ManagerConfig;
use crate::descriptor::{DerivedSlot, TextureDesc, TextureDescriptor};
use crate::device::{DeviceError, DeviceFuture, TextureDevice};
use crate::error::{TextureError, TextureResult};
use crate::event::{ObserverId, TextureEvent, TextureEventBuffer, TextureFailure};
use crate::handle::{TextureHandle, TextureId};
use crate::rebuild::{Readiness, RebuildHook, Recreation, plan_rebuild};
use crate::source::SourceKind;

/// A rebuild waiting on a device completion.
struct PendingRebuild {
    /// The texture the replacement is destined for.
    target: TextureId,
    /// The target's rebuild token when the rebuild was issued.
    token: u64,
    kind: SourceKind,
    replacement: DeviceFuture<TextureDescriptor>,
    readiness: Readiness,
    transfer_shape_flags: bool,
}

/// Outcome of [`TextureManager::rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStatus {
    /// The source kind has nothing to regenerate.
    Skipped,
    /// The new handle is installed.
    Completed,
    /// The device is still producing the new handle; see [`TextureManager::process_pending`].
    Pending,
}

/// Tally of a [`TextureManager::rebuild_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub completed: usize,
    pub pending: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RebuildReport {
    pub fn total(&self) -> usize {
        self.completed + self.pending + self.skipped + self.failed
    }
}

/// Outcome of [`TextureManager::dispose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeOutcome {
    /// Other owners remain.
    Retained { references: u32 },
    /// The last reference was dropped and the hardware handle freed.
    Released,
}

/// Owns the texture descriptors of one device and drives their lifecycle.
///
/// # Example
///
/// ```ignore
/// let mut textures = TextureManager::new(device.clone());
/// let texture = textures.create(TextureDesc::url("sprites/player.png"))?;
///
/// // The rendering context was lost and restored.
/// let report = textures.rebuild_all();
///
/// // Once per frame: install whatever the device finished loading.
/// textures.process_all_pending();
/// for event in textures.drain_events() {
///     if let TextureEvent::Rebuilt { texture, ready } = event {
///         // ...
///     }
/// }
///
/// textures.dispose(texture)?;
/// ```
pub struct TextureManager {
    device: Arc<dyn TextureDevice>,
    textures: SparseSet<TextureDescriptor>,
    slots: HashMap<TextureId, IndexSlot>,
    loaded: LoadedTextureCache,
    pending: VecDeque<PendingRebuild>,
    events: TextureEventBuffer,
    config: ManagerConfig,
}

impl TextureManager {
    pub fn new(device: Arc<dyn TextureDevice>) -> Self {
        Self::with_config(device, ManagerConfig::default())
    }

    pub fn with_config(device: Arc<dyn TextureDevice>, config: ManagerConfig) -> Self {
        Self {
            device,
            textures: SparseSet::new(),
            slots: HashMap::default(),
            loaded: LoadedTextureCache::new(),
            pending: VecDeque::new(),
            events: TextureEventBuffer::new(),
            config,
        }
    }

    pub fn device(&self) -> &Arc<dyn TextureDevice> {
        &self.device
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Create a texture and register it with the loaded cache.
    pub fn create(&mut self, desc: TextureDesc) -> TextureResult<TextureHandle> {
        profile_function!();

        let descriptor = TextureDescriptor::allocate(desc, self.device.as_ref()).inspect_err(|e| {
            tracing::error!("Texture creation failed: {}", e);
        })?;
        Ok(self.register(descriptor))
    }

    /// Register a descriptor built elsewhere, for example with [`TextureDescriptor::allocate`].
    pub fn register(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        let id = descriptor.id();
        tracing::debug!(
            "Registered texture {} ({:?}, {}x{}x{})",
            id,
            descriptor.source(),
            descriptor.width(),
            descriptor.height(),
            descriptor.depth()
        );

        let slot = self.textures.push(descriptor);
        self.slots.insert(id, slot);
        self.loaded.insert(id);
        self.events.push(TextureEvent::Created { texture: id });
        TextureHandle::new(slot, id)
    }

    fn resolve(&self, handle: TextureHandle) -> TextureResult<IndexSlot> {
        match self.textures.try_get(handle.slot) {
            Some(texture) if texture.id() == handle.id => Ok(handle.slot),
            _ => Err(TextureError::UseAfterDispose { texture: handle.id }),
        }
    }

    pub fn get(&self, handle: TextureHandle) -> TextureResult<&TextureDescriptor> {
        let slot = self.resolve(handle)?;
        self.textures
            .try_get(slot)
            .ok_or(TextureError::UseAfterDispose { texture: handle.id })
    }

    pub fn get_mut(&mut self, handle: TextureHandle) -> TextureResult<&mut TextureDescriptor> {
        let slot = self.resolve(handle)?;
        self.textures
            .try_get_mut(slot)
            .ok_or(TextureError::UseAfterDispose { texture: handle.id })
    }

    /// Look a texture up by id.
    pub fn get_by_id(&self, id: TextureId) -> Option<&TextureDescriptor> {
        self.slots
            .get(&id)
            .and_then(|slot| self.textures.try_get(*slot))
    }

    /// A handle for a live texture id.
    pub fn handle_of(&self, id: TextureId) -> Option<TextureHandle> {
        self.slots.get(&id).map(|slot| TextureHandle::new(*slot, id))
    }

    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Number of live textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Ids in the loaded cache, ascending.
    pub fn loaded_ids(&self) -> Vec<TextureId> {
        self.loaded.sorted_ids()
    }

    pub fn is_loaded(&self, id: TextureId) -> bool {
        self.loaded.contains(id)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn update_size(
        &mut self,
        handle: TextureHandle,
        width: u32,
        height: u32,
        depth: u32,
    ) -> TextureResult<()> {
        let device = Arc::clone(&self.device);
        self.get_mut(handle)?
            .update_size(device.as_ref(), width, height, depth)
    }

    /// Add a logical owner. Returns the new count.
    pub fn increment_references(&mut self, handle: TextureHandle) -> TextureResult<u32> {
        self.get_mut(handle)?.increment_references()
    }

    /// Drop one logical owner of a texture.
    ///
    /// When the last owner goes the hardware handle is released, the texture
    /// leaves the loaded cache, and `handle` stops resolving.
    pub fn dispose(&mut self, handle: TextureHandle) -> TextureResult<DisposeOutcome> {
        profile_function!();

        let slot = self.resolve(handle)?;
        let device = Arc::clone(&self.device);
        let texture = self
            .textures
            .try_get_mut(slot)
            .ok_or(TextureError::UseAfterDispose { texture: handle.id })?;

        if !texture.dispose(device.as_ref())? {
            return Ok(DisposeOutcome::Retained {
                references: texture.references(),
            });
        }

        self.textures.remove(slot);
        self.slots.remove(&handle.id);
        self.loaded.remove(handle.id);
        self.events.push(TextureEvent::Released { texture: handle.id });
        tracing::debug!("Released texture {}", handle.id);
        Ok(DisposeOutcome::Released)
    }

    /// Flag a texture ready (e.g. after its initial upload) and notify loaded observers.
    pub fn mark_ready(&mut self, handle: TextureHandle) -> TextureResult<()> {
        let texture = self.get_mut(handle)?;
        texture.set_ready(true);
        texture.notify_loaded();
        self.events.push(TextureEvent::Ready { texture: handle.id });
        Ok(())
    }

    /// Report a failure on a texture's error channel.
    pub fn report_error(
        &mut self,
        handle: TextureHandle,
        message: impl Into<String>,
        error: Option<TextureError>,
    ) -> TextureResult<()> {
        let failure = TextureFailure::new(message, error);
        tracing::warn!("Texture {} reported an error: {}", handle.id, failure.message);
        self.get_mut(handle)?.notify_error(&failure);
        Ok(())
    }

    /// Observe a texture becoming ready. Fires at once if it already is.
    pub fn on_loaded(
        &mut self,
        handle: TextureHandle,
        callback: impl FnMut(&TextureDescriptor) + Send + 'static,
    ) -> TextureResult<ObserverId> {
        Ok(self.get_mut(handle)?.add_loaded_observer(callback))
    }

    pub fn on_error(
        &mut self,
        handle: TextureHandle,
        callback: impl FnMut(&TextureFailure) + Send + 'static,
    ) -> TextureResult<ObserverId> {
        Ok(self.get_mut(handle)?.on_error().add(callback))
    }

    /// Replace the built-in rebuild strategy of one texture.
    pub fn set_rebuild_hook(
        &mut self,
        handle: TextureHandle,
        hook: impl RebuildHook + 'static,
    ) -> TextureResult<()> {
        self.get_mut(handle)?.set_rebuild_hook(Box::new(hook));
        Ok(())
    }

    pub fn clear_rebuild_hook(&mut self, handle: TextureHandle) -> TextureResult<()> {
        self.get_mut(handle)?.clear_rebuild_hook();
        Ok(())
    }

    /// Hand `child` over to `parent` as a derived texture.
    ///
    /// The child leaves the manager: its handle stops resolving and it is dropped
    /// from the loaded cache. Any texture previously in the slot is released.
    pub fn attach_derived(
        &mut self,
        parent: TextureHandle,
        slot: DerivedSlot,
        child: TextureHandle,
    ) -> TextureResult<()> {
        let parent_slot = self.resolve(parent)?;
        let child_slot = self.resolve(child)?;
        if parent_slot == child_slot {
            return Err(TextureError::InvalidHandle {
                reason: format!("texture {} cannot be derived from itself", parent.id),
            });
        }

        let child_texture = self
            .textures
            .remove(child_slot)
            .ok_or(TextureError::UseAfterDispose { texture: child.id })?;
        self.slots.remove(&child.id);
        self.loaded.remove(child.id);

        let device = Arc::clone(&self.device);
        let parent_texture = self
            .textures
            .try_get_mut(parent_slot)
            .ok_or(TextureError::UseAfterDispose { texture: parent.id })?;
        if let Some(mut previous) = parent_texture.replace_derived(slot, child_texture) {
            tracing::debug!("Releasing {:?} {} of {}", slot, previous.id(), parent.id);
            previous.release_resources(device.as_ref());
        }
        Ok(())
    }

    /// Swap-and-die between two managed textures.
    ///
    /// `source`'s handle and derived textures move into `target`, then `source`
    /// is retired: it leaves the arena and the loaded cache and its handle stops
    /// resolving. A handle `target` held before is released.
    pub fn transfer(
        &mut self,
        source: TextureHandle,
        target: TextureHandle,
        transfer_shape_flags: bool,
    ) -> TextureResult<()> {
        profile_function!();

        let source_slot = self.resolve(source)?;
        let target_slot = self.resolve(target)?;
        if source_slot == target_slot {
            return Err(TextureError::InvalidHandle {
                reason: format!("texture {} cannot be transferred into itself", source.id),
            });
        }

        if self
            .textures
            .try_get(target_slot)
            .is_some_and(TextureDescriptor::is_disposed)
        {
            return Err(TextureError::UseAfterDispose { texture: target.id });
        }

        let retiring = self
            .textures
            .remove(source_slot)
            .ok_or(TextureError::UseAfterDispose { texture: source.id })?;
        self.slots.remove(&source.id);

        self.install(target_slot, retiring, transfer_shape_flags, true)?;
        self.events.push(TextureEvent::Transferred {
            from: source.id,
            into: target.id,
        });
        Ok(())
    }

    /// Transfer `replacement` into the texture at `target_slot` and fix up the cache.
    fn install(
        &mut self,
        target_slot: IndexSlot,
        replacement: TextureDescriptor,
        transfer_shape_flags: bool,
        expect_cached: bool,
    ) -> TextureResult<TextureId> {
        let device = Arc::clone(&self.device);
        let target = self
            .textures
            .try_get_mut(target_slot)
            .ok_or(TextureError::InvalidHandle {
                reason: "transfer target vacated its slot".to_string(),
            })?;
        let target_id = target.id();

        let outcome = replacement.transfer_into(target, transfer_shape_flags, device.as_ref())?;
        if let Some(displaced) = outcome.displaced {
            device.release_handle(displaced);
        }

        let was_cached = self.loaded.replace(outcome.retired, target_id);
        if expect_cached && !was_cached && self.config.strict_cache {
            tracing::error!(
                "Retired texture {} was missing from the loaded cache",
                outcome.retired
            );
            debug_assert!(
                was_cached,
                "retired texture {} missing from the loaded cache",
                outcome.retired
            );
        }
        Ok(target_id)
    }

    /// Recreate one texture's hardware handle.
    ///
    /// Synchronous kinds finish before this returns. Asynchronous ones are queued
    /// and installed by [`process_pending`](Self::process_pending).
    pub fn rebuild(&mut self, handle: TextureHandle) -> TextureResult<RebuildStatus> {
        profile_function!();

        let slot = self.resolve(handle)?;
        let device = Arc::clone(&self.device);
        let texture = self
            .textures
            .try_get_mut(slot)
            .ok_or(TextureError::UseAfterDispose { texture: handle.id })?;
        let kind = texture.source();

        let plan = match plan_rebuild(texture, device.as_ref()) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                tracing::trace!("Nothing to rebuild for {} ({:?})", handle.id, kind);
                return Ok(RebuildStatus::Skipped);
            }
            Err(err) => {
                if !err.is_use_after_dispose() {
                    self.fail_rebuild(slot, &err);
                }
                return Err(err);
            }
        };

        match plan.replacement {
            Recreation::Ready(replacement) => {
                tracing::debug!("Rebuilt {} ({:?}) synchronously", handle.id, kind);
                self.complete_rebuild(slot, replacement, plan.readiness, plan.transfer_shape_flags)?;
                Ok(RebuildStatus::Completed)
            }
            Recreation::Pending(replacement) => {
                tracing::debug!("Queued rebuild of {} ({:?})", handle.id, kind);
                self.pending.push_back(PendingRebuild {
                    target: handle.id,
                    token: plan.token,
                    kind,
                    replacement,
                    readiness: plan.readiness,
                    transfer_shape_flags: plan.transfer_shape_flags,
                });
                Ok(RebuildStatus::Pending)
            }
        }
    }

    /// Rebuild every texture in the loaded cache, typically after a context loss.
    ///
    /// Failures are counted and reported on each texture's error channel; they do
    /// not stop the pass.
    pub fn rebuild_all(&mut self) -> RebuildReport {
        profile_function!();

        let mut report = RebuildReport::default();
        for id in self.loaded.sorted_ids() {
            let Some(handle) = self.handle_of(id) else {
                tracing::warn!("Loaded cache holds {} but no texture is registered", id);
                report.skipped += 1;
                continue;
            };
            match self.rebuild(handle) {
                Ok(RebuildStatus::Completed) => report.completed += 1,
                Ok(RebuildStatus::Pending) => report.pending += 1,
                Ok(RebuildStatus::Skipped) => report.skipped += 1,
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            "Rebuilt textures: {} completed, {} pending, {} skipped, {} failed",
            report.completed,
            report.pending,
            report.skipped,
            report.failed
        );
        report
    }

    fn complete_rebuild(
        &mut self,
        slot: IndexSlot,
        replacement: TextureDescriptor,
        readiness: Readiness,
        transfer_shape_flags: bool,
    ) -> TextureResult<()> {
        let target_id = self.install(slot, replacement, transfer_shape_flags, false)?;

        let device = Arc::clone(&self.device);
        let texture = self
            .textures
            .try_get_mut(slot)
            .ok_or(TextureError::UseAfterDispose { texture: target_id })?;

        let ready = match readiness {
            Readiness::MarkReady => true,
            Readiness::Hook(ready) => ready,
            Readiness::FromRenderSurface => {
                match (texture.handle(), device.render_surface()) {
                    (Some(handle), Some(surface)) => {
                        match device.push_surface_into_dynamic(
                            handle,
                            surface,
                            texture.invert_y(),
                            texture.format(),
                        ) {
                            Ok(ready) => ready,
                            Err(source) => {
                                let err = TextureError::DeviceCreation {
                                    texture: target_id,
                                    kind: texture.source(),
                                    source,
                                };
                                self.fail_rebuild(slot, &err);
                                return Err(err);
                            }
                        }
                    }
                    _ => false,
                }
            }
        };

        texture.set_ready(ready);
        if ready {
            texture.notify_loaded();
        }
        self.events.push(TextureEvent::Rebuilt {
            texture: target_id,
            ready,
        });
        Ok(())
    }

    fn fail_rebuild(&mut self, slot: IndexSlot, err: &TextureError) {
        let Some(texture) = self.textures.try_get_mut(slot) else {
            return;
        };
        tracing::error!("Rebuild of {} failed: {}", texture.id(), err);

        texture.set_ready(false);
        texture.notify_error(&TextureFailure::new(err.to_string(), Some(err.clone())));
        self.events.push(TextureEvent::RebuildFailed {
            texture: texture.id(),
            error: err.to_string(),
        });
    }

    /// Number of rebuilds waiting on the device.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Poll queued rebuilds once each and apply up to `max` completions.
    ///
    /// Unfinished rebuilds stay queued in order. A completion whose texture was
    /// disposed or rebuilt again since it was issued is discarded and its new
    /// handle released. Returns the number of completions consumed.
    pub fn process_pending(&mut self, max: usize) -> usize {
        profile_function!();

        let mut processed = 0;
        let mut remaining = self.pending.len();
        while remaining > 0 && processed < max {
            remaining -= 1;
            let Some(mut pending) = self.pending.pop_front() else {
                break;
            };

            match future::block_on(future::poll_once(&mut pending.replacement)) {
                None => self.pending.push_back(pending),
                Some(result) => {
                    processed += 1;
                    self.finish_pending(pending, result);
                }
            }
        }

        // Keep the queue in issue order when the budget ran out mid-pass.
        self.pending.rotate_left(remaining);
        processed
    }

    /// [`process_pending`](Self::process_pending) with the configured budget.
    pub fn process_all_pending(&mut self) -> usize {
        self.process_pending(self.config.pending_budget)
    }

    fn finish_pending(
        &mut self,
        pending: PendingRebuild,
        result: Result<TextureDescriptor, DeviceError>,
    ) {
        let live_slot = self.slots.get(&pending.target).copied().filter(|slot| {
            self.textures
                .try_get(*slot)
                .is_some_and(|texture| texture.rebuild_token == pending.token)
        });

        match (live_slot, result) {
            (Some(slot), Ok(replacement)) => {
                tracing::debug!("Async rebuild of {} completed", pending.target);
                if let Err(err) = self.complete_rebuild(
                    slot,
                    replacement,
                    pending.readiness,
                    pending.transfer_shape_flags,
                ) {
                    tracing::debug!("Async rebuild of {} not installed: {}", pending.target, err);
                }
            }
            (Some(slot), Err(source)) => {
                let err = TextureError::DeviceCreation {
                    texture: pending.target,
                    kind: pending.kind,
                    source,
                };
                self.fail_rebuild(slot, &err);
            }
            (None, Ok(mut replacement)) => {
                tracing::warn!(
                    "Discarding stale rebuild of {}; releasing its new handle",
                    pending.target
                );
                replacement.release_resources(self.device.as_ref());
            }
            (None, Err(err)) => {
                tracing::debug!("Stale rebuild of {} failed: {}", pending.target, err);
            }
        }
    }

    /// Resolve pending spherical polynomial computations. Returns how many finished.
    pub fn poll_spherical_polynomials(&mut self) -> usize {
        let mut resolved = 0;
        for slot in self.textures.slots() {
            if let Some(texture) = self.textures.try_get_mut(slot)
                && texture.poll_spherical_polynomial()
            {
                resolved += 1;
            }
        }
        resolved
    }

    /// Drain all events emitted since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = TextureEvent> + '_ {
        self.events.drain()
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &TextureEvent> {
        self.events.iter()
    }
}

impl Drop for TextureManager {
    fn drop(&mut self) {
        for slot in self.textures.slots() {
            if let Some(mut texture) = self.textures.remove(slot) {
                texture.release_resources(self.device.as_ref());
            }
        }
        self.pending.clear();
    }
}
