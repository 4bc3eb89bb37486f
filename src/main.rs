//! AR Sandbox - Main Entry Point
//!
//! Loads configuration and calibration, connects the depth sensor, and runs
//! the render loop either behind the egui operator UI or headless into a PNG
//! sequence.

use anyhow::{anyhow, Context};
use arsandbox_rs::{
    backend::{open_sensor, RenderLoop, SensorAdapter},
    config::{
        log_dir, AppConfig, CalibrationFile, PipelineSettings, ProjectorCalibration, SensorKind,
    },
    control::ControlSurface,
    frontend::SandboxApp,
    pipeline::{ContourRenderer, SharedStore, Stabilizer},
    presentation::{PngSequenceSurface, ProjectorWindow},
    raster::Raster,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor `--log-level` is given
const DEFAULT_LOG_FILTER: &str = "info,arsandbox_rs=debug";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SensorArg {
    Synthetic,
    Recorded,
}

impl From<SensorArg> for SensorKind {
    fn from(arg: SensorArg) -> Self {
        match arg {
            SensorArg::Synthetic => SensorKind::Synthetic,
            SensorArg::Recorded => SensorKind::Recorded,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "arsandbox-rs", version, about = "Augmented-reality sandbox projector")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sensor calibration record (JSON)
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Projector calibration record (JSON)
    #[arg(long)]
    projector_calibration: Option<PathBuf>,

    /// Run without UI, writing composites as PNG files
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames (headless only)
    #[arg(long)]
    frames: Option<u64>,

    /// Output directory for headless frames
    #[arg(long, default_value = "frames")]
    output_dir: PathBuf,

    /// Depth source, overriding the config file
    #[arg(long, value_enum)]
    sensor: Option<SensorArg>,

    /// Recording to replay with `--sensor recorded`
    #[arg(long)]
    recording_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `info,arsandbox_rs=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Also write a daily rolling log file under the app data directory
    #[arg(long)]
    log_file: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid --log-level")?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let (file_layer, guard) = if cli.log_file {
        let dir = log_dir().context("Could not determine log directory")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {:?}", dir))?;
        let appender = tracing_appender::rolling::daily(dir, "arsandbox.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(sensor) = cli.sensor {
        config.sensor.kind = sensor.into();
    }
    if let Some(dir) = &cli.recording_dir {
        config.sensor.recording_dir = Some(dir.clone());
        if cli.sensor.is_none() {
            config.sensor.kind = SensorKind::Recorded;
        }
    }
    if let Some(path) = &cli.calibration {
        config.calibration.sensor_file = Some(path.clone());
    }
    if let Some(path) = &cli.projector_calibration {
        config.calibration.projector_file = Some(path.clone());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    tracing::info!("Starting AR Sandbox");

    let mut config = AppConfig::load_or_default(cli.config.as_deref());
    apply_overrides(&mut config, &cli);
    config.validate()?;

    if let Some(path) = &cli.write_config {
        config.save(path)?;
        tracing::info!("Wrote configuration to {:?}", path);
        return Ok(());
    }

    let calibration = CalibrationFile::load_or_default(config.sensor_calibration_path().as_deref());
    let projector_calibration =
        ProjectorCalibration::load_or_default(config.projector_calibration_path().as_deref());

    let (min_depth, max_depth) = calibration.depth_bounds();
    let mut settings = config.defaults.to_settings(min_depth, max_depth);
    if let Err(e) = settings.validate() {
        tracing::warn!("Calibrated settings invalid ({}), using standard defaults", e);
        settings = PipelineSettings::default();
    }
    tracing::info!(
        "Depth range {}..{} mm, contour step {}",
        settings.min_depth,
        settings.max_depth,
        settings.contour_step
    );
    let store = Arc::new(SharedStore::new(settings));
    let running = Arc::new(AtomicBool::new(true));

    let mut adapter = SensorAdapter::new(open_sensor(&config.sensor)?, calibration);
    adapter
        .connect_with_retry(
            config.sensor.connect_retries,
            Duration::from_millis(config.sensor.retry_backoff_ms),
        )
        .context("Depth sensor unavailable, aborting startup")?;
    let sensor_description = adapter.description();

    let stabilizer = Stabilizer::new(config.stabilizer.clone());
    let renderer =
        ContourRenderer::new(config.render.clone()).with_projector(&projector_calibration);
    let idle_sleep = Duration::from_millis(config.display.idle_sleep_ms);

    if cli.headless {
        let surface = PngSequenceSurface::new(&cli.output_dir, cli.frames)?;
        let mut render_loop = RenderLoop::new(
            adapter,
            stabilizer,
            renderer,
            Box::new(surface),
            store,
            running,
        )
        .with_idle_sleep(idle_sleep);
        render_loop.run();
        let stats = render_loop.stats().clone();
        // Dropping the loop flushes the PNG writer.
        drop(render_loop);
        tracing::info!(
            "Headless run finished: {} frames written to {:?}",
            stats.frames_rendered,
            cli.output_dir
        );
        return Ok(());
    }

    let (width, height) =
        projector_calibration.output_size(config.sensor.width, config.sensor.height);
    let projector = ProjectorWindow::create_window(
        config.display.projector_title.clone(),
        Raster::filled(width, height, [0, 0, 0]),
        config.display.fullscreen,
    );

    let render_handle = {
        let mut render_loop = RenderLoop::new(
            adapter,
            stabilizer,
            renderer,
            Box::new(projector.clone()),
            Arc::clone(&store),
            Arc::clone(&running),
        )
        .with_idle_sleep(idle_sleep)
        .with_color_preview(true);
        std::thread::Builder::new()
            .name("render-loop".to_string())
            .spawn(move || render_loop.run())
            .context("Failed to spawn render loop")?
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 640.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("AR Sandbox Control"),
        ..Default::default()
    };

    let ui_running = Arc::clone(&running);
    let ui_projector = projector.clone();
    let display = config.display.clone();
    let result = eframe::run_native(
        "AR Sandbox Control",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(SandboxApp::new(
                cc,
                ControlSurface::new(store),
                ui_projector,
                ui_running,
                sensor_description,
                &display,
            )))
        }),
    );

    tracing::info!("Shutting down...");
    running.store(false, Ordering::SeqCst);
    projector.close();
    if render_handle.join().is_err() {
        tracing::error!("Render loop thread panicked");
    }

    result.map_err(|e| anyhow!("UI error: {}", e))
}
