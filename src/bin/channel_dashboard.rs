//! channel_dashboard - poll a channel's still image and track channel health.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use live_monitor::poller::HttpChannelFetcher;
use live_monitor::render::fit_frame;
use live_monitor::{
    ChannelId, ChannelPoller, Clock, MonitorConfig, OverlayRenderer, PollerHandle, RasterSurface,
    SystemClock,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Poll still images for a channel and report channel health"
)]
struct Args {
    /// Channel to show. Defaults to the first configured channel.
    #[arg(long, env = "MONITOR_CHANNEL")]
    channel: Option<String>,

    /// Display container width; the image is fitted at 16:9.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Display container height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Write the displayed image to this PNG on exit.
    #[arg(long)]
    png: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = MonitorConfig::load()?;

    let channel = match args.channel.as_deref() {
        Some(id) => ChannelId::new(id),
        None => match config.dashboard.channels.first() {
            Some(id) => id.clone(),
            None => bail!("no channel selected; pass --channel or set MONITOR_CHANNELS"),
        },
    };

    let (display_width, display_height) = fit_frame(args.width as f32, args.height as f32);
    let surface = RasterSurface::new(display_width.round() as u32, display_height.round() as u32);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let fetcher = HttpChannelFetcher::new(
        &config.dashboard.base_url,
        config.dashboard.timeout,
        clock,
    );
    let mut poller = ChannelPoller::new(config.poll_policy(), OverlayRenderer::new(surface));
    for known in &config.dashboard.channels {
        poller.health_mut().register(known);
    }

    let handle = PollerHandle::spawn(poller, Box::new(fetcher))?;
    let health = handle.subscribe_health()?;
    log::info!(
        "polling {} at {} fps from {}",
        channel,
        config.dashboard.fps_target,
        config.dashboard.base_url
    );
    handle.select(channel)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    log::info!("channel_dashboard waiting for shutdown signal (Ctrl-C)...");
    loop {
        if rx.try_recv().is_ok() {
            break;
        }
        match health.recv_timeout(Duration::from_millis(250)) {
            Ok(change) => log::info!(
                "channel {} is now {:?} [{}]",
                change.channel,
                change.current,
                change.current.icon()
            ),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!("shutdown signal received, stopping poller...");
    for (channel, state) in handle.health_snapshot()? {
        log::info!("{}: {:?}", channel, state);
    }
    if let Some(path) = &args.png {
        match handle.with_poller(|poller| poller.display().surface().save_png_if_drawn(path))? {
            Ok(true) => log::info!("wrote current image to {}", path.display()),
            Ok(false) => log::warn!("display is empty; {} not written", path.display()),
            Err(err) => log::warn!("{}", err),
        }
    }
    handle.stop()?;
    Ok(())
}
