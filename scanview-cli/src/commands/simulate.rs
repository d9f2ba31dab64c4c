//! Simulate command - run the adaptive preset loop against the simulated engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scanview::config::ConfigFile;
use scanview::engine::{RenderEngine, SimulatedEngine, SimulationProfile};
use scanview::logging::init_logging;
use scanview::notify::{ObserverError, SettingsChange, SettingsObserver};
use scanview::{Preset, Shortcut, ViewerConfig, ViewerController};
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub seconds: u64,
    pub target_fps: Option<f64>,
    pub preset: Option<Preset>,
    pub no_culling: bool,
    pub points_per_second: Option<f64>,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let config_file = ConfigFile::load()?;
    let _logging = init_logging(&config_file.logging)?;

    let mut viewer_config = ViewerConfig::from(&config_file).with_auto_adjust(true);
    if let Some(target_fps) = args.target_fps {
        viewer_config.monitor = viewer_config.monitor.with_target_fps(target_fps);
    }
    if let Some(preset) = args.preset {
        viewer_config = viewer_config.with_preset(preset);
    }
    if args.no_culling {
        viewer_config = viewer_config.with_frustum_culling(false);
    }

    let mut profile = SimulationProfile::default();
    if let Some(rate) = args.points_per_second {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CliError::Config(format!(
                "--points-per-second must be positive, got {}",
                rate
            )));
        }
        profile.points_per_second = rate;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    runtime.block_on(simulate(viewer_config, profile, Duration::from_secs(args.seconds)))
}

async fn simulate(
    config: ViewerConfig,
    profile: SimulationProfile,
    duration: Duration,
) -> Result<(), CliError> {
    let sample_period = config.monitor.sample_period;
    let engine = Arc::new(SimulatedEngine::new(profile));
    let viewer = ViewerController::new(Arc::clone(&engine) as Arc<dyn RenderEngine>, config)?;

    let started = Instant::now();
    let observer: Arc<dyn SettingsObserver> =
        Arc::new(move |change: &SettingsChange| -> Result<(), ObserverError> {
            println!(
                "[{:>6.1}s] Preset -> {} (culling {})",
                started.elapsed().as_secs_f64(),
                change.preset,
                if change.frustum_culling_enabled { "ON" } else { "OFF" }
            );
            Ok(())
        });
    viewer.subscribe(observer);

    let loaded = viewer.load_default_datasets().await;
    if loaded.is_empty() {
        return Err(CliError::Config("No datasets could be loaded".to_string()));
    }
    viewer.navigate_to_default().await;

    println!("ScanView simulation");
    println!("===================");
    println!();
    println!("Datasets:   {}", loaded.len());
    println!("Preset:     {}", viewer.current_preset());
    println!(
        "Target:     {} fps (sampled every {} ms, {} low samples to adjust)",
        viewer.monitor().config().target_fps,
        sample_period.as_millis(),
        viewer.monitor().config().adjust_threshold
    );
    println!("Duration:   {} s", duration.as_secs());
    println!();
    println!("{}", Shortcut::help());
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let render_loop = engine.spawn_render_loop(shutdown.child_token());

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut status = tokio::time::interval(sample_period);
    status.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = &mut deadline => break,
            _ = status.tick() => {
                println!(
                    "[{:>6.1}s] {}",
                    started.elapsed().as_secs_f64(),
                    viewer.snapshot()
                );
            }
        }
    }

    viewer.set_auto_performance(false);
    shutdown.cancel();
    if let Err(e) = render_loop.await {
        tracing::warn!(error = %e, "Render loop ended abnormally");
    }

    let snapshot = viewer.snapshot();
    println!();
    println!("Summary");
    println!("-------");
    println!("Frames rendered: {}", engine.frames_rendered());
    println!("Final preset:    {}", snapshot.preset);
    println!("Last FPS:        {:.1}", snapshot.fps);
    println!("Points loaded:   {}", snapshot.points_human());
    println!("GPU memory:      {}", snapshot.memory_human());

    Ok(())
}
