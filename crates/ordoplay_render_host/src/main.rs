// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` render host.
//!
//! Builds the frame graph, then runs it once per frame and submits the
//! recorded command buffers. A failed frame submits nothing.
//!
//! Usage: `ordoplay_render_host [settings.ron]`

mod error;
mod passes;
mod settings;

use error::HostError;
use ordoplay_render_graph::{CommandBuffer, EntityId, RenderGraphRunner, TextureViewId};
use parking_lot::RwLock;
use passes::{Cameras, ViewTarget, ViewTargets};
use settings::HostSettings;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let settings = match std::env::args().nth(1) {
        Some(path) => match HostSettings::load(Path::new(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to load settings from {path}: {e}");
                std::process::exit(1);
            }
        },
        None => HostSettings::default(),
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    tracing::info!("Starting OrdoPlay render host v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&settings) {
        tracing::error!("Render host stopped: {e}");
        std::process::exit(1);
    }
}

fn init_logging(settings: &HostSettings) -> Result<(), HostError> {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in &settings.log_directives {
        env_filter = env_filter.add_directive(directive.parse()?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn run(settings: &HostSettings) -> Result<(), HostError> {
    let cameras: Cameras = Arc::new(RwLock::new(Vec::new()));
    let targets: ViewTargets = Arc::new(RwLock::new(HashMap::new()));
    for _ in 0..settings.cameras {
        spawn_camera(&cameras, &targets);
    }
    let swapchain = TextureViewId::new();

    let mut graph = passes::build_frame_graph(&cameras, &targets, swapchain);
    graph.validate()?;
    tracing::info!(
        "Frame graph ready: {} nodes, {} cameras",
        graph.node_count(),
        settings.cameras
    );

    let runner = RenderGraphRunner::new(settings.runner.clone());
    for frame in 0..settings.frames {
        if settings.remove_camera_at == Some(frame) {
            despawn_camera(&cameras, &targets);
        }

        graph.update();
        match runner.run(&graph) {
            Ok(command_buffers) => submit(frame, &command_buffers),
            Err(e) if settings.fail_fast => return Err(e.into()),
            Err(e) => tracing::warn!("Skipping frame {}: {}", frame, e),
        }
    }

    tracing::info!("Rendered {} frames", settings.frames);
    Ok(())
}

fn spawn_camera(cameras: &Cameras, targets: &ViewTargets) {
    let camera = EntityId::new();
    targets.write().insert(camera, ViewTarget::new());
    cameras.write().push(camera);
    tracing::debug!("Spawned camera {:?}", camera);
}

fn despawn_camera(cameras: &Cameras, targets: &ViewTargets) {
    let Some(camera) = cameras.write().pop() else {
        return;
    };
    targets.write().remove(&camera);
    tracing::info!("Despawned camera {:?}", camera);
}

fn submit(frame: u32, command_buffers: &[CommandBuffer]) {
    let commands: usize = command_buffers.iter().map(|buffer| buffer.commands.len()).sum();
    tracing::info!(
        "Frame {} submitted {} command buffers ({} commands)",
        frame,
        command_buffers.len(),
        commands
    );
    for buffer in command_buffers {
        tracing::trace!("{:?}", buffer);
    }
}
