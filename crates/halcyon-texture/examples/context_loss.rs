//! Context loss walkthrough using the mock device.
//!
//! This example shows:
//! - Creating textures of several source kinds
//! - Rebuilding everything after a simulated context loss
//! - Completing asynchronous loads and draining events
//! - Disposing a texture while its rebuild is still in flight

use std::sync::Arc;

use halcyon_core::logging;
use halcyon_core::profiling::{self, ProfilingBackend};
use halcyon_test_utils::MockTextureDevice;
use halcyon_texture::*;

fn main() -> Result<(), TextureError> {
    logging::init();
    if std::env::var_os("HALCYON_PROFILE").is_some() {
        profiling::init_profiling(ProfilingBackend::PuffinHttp);
    }

    let device = Arc::new(MockTextureDevice::new());
    let mut textures = TextureManager::new(device.clone());

    let checker = textures.create(TextureDesc::raw(
        vec![255u8; 4 * 8 * 8],
        8,
        8,
        PixelFormat::RGBA,
        ComponentType::UNSIGNED_BYTE,
    ))?;
    let sprite = textures.create(TextureDesc::url("sprites/player.png"))?;
    let sky = textures.create(TextureDesc::cube("textures/sky", None))?;
    let scratch = textures.create(TextureDesc::temp(64, 64))?;

    textures.on_loaded(sprite, |texture| {
        println!("{} is ready again ({:?})", texture.id(), texture.handle());
    })?;

    println!("=== Context lost ===");
    let report = textures.rebuild_all();
    println!(
        "{} completed, {} pending, {} skipped, {} failed",
        report.completed, report.pending, report.skipped, report.failed
    );

    // The sky finishes loading after the app has already let go of it.
    textures.dispose(sky)?;

    device.resolve_all();
    profiling::new_frame();
    let applied = textures.process_all_pending();
    println!("Applied {} completions", applied);

    for event in textures.drain_events() {
        println!("  {:?}", event);
    }

    for handle in [checker, sprite, scratch] {
        let texture = textures.get(handle)?;
        println!(
            "{} {:?}: ready={} handle={:?}",
            texture.id(),
            texture.source(),
            texture.is_ready(),
            texture.handle()
        );
    }

    println!("Live device handles: {:?}", device.live_handles());
    Ok(())
}
