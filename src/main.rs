use anyhow::Result;
use open_energy_dashboard::{config, dashboard, render, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;
    info!(
        base_url = %cfg.backend.base_url,
        poll_interval_s = cfg.poller.interval_seconds,
        stream = cfg.stream.enabled,
        fps = cfg.render.frames_per_second,
        "starting Open Energy Dashboard"
    );

    let sink = render::LogSceneSink::new(cfg.render.summary_every_frames);
    let dash = dashboard::Dashboard::start(&cfg, Box::new(sink))?;

    telemetry::shutdown_signal().await;
    dash.shutdown().await;

    info!("shutdown complete");
    Ok(())
}
