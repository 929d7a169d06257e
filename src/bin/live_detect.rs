//! live_detect - camera → detection service → overlay loop.
//!
//! Pulls frames from the configured camera, posts each snapshot to the
//! detection endpoint and draws the returned boxes. Runs until Ctrl-C, the
//! source ends, or `--frames` frames were rendered.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use live_monitor::detect;
use live_monitor::{
    CameraPipeline, Clock, FacingPreset, MonitorConfig, OverlayRenderer, PipelineCommand,
    RasterSurface, SystemClock,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Facing {
    Default,
    Front,
    Rear,
}

impl From<Facing> for FacingPreset {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Default => FacingPreset::Default,
            Facing::Front => FacingPreset::Front,
            Facing::Rear => FacingPreset::Rear,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stream camera frames through an HTTP object detector and draw the results"
)]
struct Args {
    /// Exact camera device id (see the configured device list).
    #[arg(long, env = "MONITOR_DEVICE_ID")]
    device: Option<String>,

    /// Camera facing preset.
    #[arg(long, value_enum, default_value = "default")]
    facing: Facing,

    /// Stop after this many rendered frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Write the last composed surface to this PNG on exit.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Print the configured video inputs and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = MonitorConfig::load()?;
    let catalog = config.catalog();

    if args.list_devices {
        for device in catalog.enumerate_video_inputs() {
            println!("{}\t{}\t{}", device.device_id, device.label, device.url);
        }
        return Ok(());
    }

    let constraints = FacingPreset::from(args.facing)
        .apply(&config.camera.constraints)
        .with_device_id(args.device.clone().or(config.camera.constraints.device_id.clone()));

    let mut surface = RasterSurface::new(0, 0);
    if let Some(path) = &config.font_path {
        surface = surface.with_font(RasterSurface::load_font(path)?);
    } else {
        log::info!("no label font configured; box labels render as plain tabs");
    }

    let detector = detect::service_for(config.detection_client());
    log::info!("posting snapshots to {}", detector.name());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut pipeline = CameraPipeline::new(
        catalog,
        config.pipeline_settings(),
        clock,
        detector,
        OverlayRenderer::new(surface),
    );

    let (tx, rx) = mpsc::channel();
    tx.send(PipelineCommand::Start(constraints))
        .map_err(|_| anyhow!("pipeline command channel closed"))?;
    let stop_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(PipelineCommand::Stop);
    })
    .context("error setting Ctrl-C handler")?;

    let outcome = pipeline.run(&rx, args.frames);

    if let Some(path) = &args.png {
        match pipeline.renderer().surface().save_png_if_drawn(path) {
            Ok(true) => log::info!("wrote last composed frame to {}", path.display()),
            Ok(false) => log::warn!("no frame rendered; {} not written", path.display()),
            Err(err) => log::warn!("{}", err),
        }
    }

    let rendered = outcome?;
    let readouts = pipeline.renderer().readouts();
    log::info!(
        "rendered {} frames, last fps {}",
        rendered,
        readouts.fps_text
    );
    log::debug!("last frame metadata: {}", readouts.metadata_text);
    Ok(())
}
