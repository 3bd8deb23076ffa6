mod app;
mod config;
mod history;
mod live;
mod logging;
mod lookup;
mod model;
mod net;
mod poller;
mod rows;
mod runtime;
#[cfg(test)]
mod testing;
mod ui;

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use app::App;
use config::parse_args;
use logging::init as init_logging;
use lookup::spawn_lookup_worker;
use net::{FlightSource, HttpSource};
use runtime::{init_terminal, restore_terminal, run_app};
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("flightboard starting");
    debug!("config path: {}", config.config_path.display());

    let http = HttpSource::new(
        &config.url,
        Duration::from_secs(config.timeout_secs),
        config.insecure,
    )
    .with_context(|| format!("failed to build HTTP client for {}", config.url))?;
    debug!(
        "source {} refresh {}ms timeout {}s",
        http.base(),
        config.refresh.as_millis(),
        config.timeout_secs
    );
    if config.timeout_secs == 0 {
        warn!(
            "no request timeout set; a stalled server holds up to {} live requests",
            live::MAX_IN_FLIGHT
        );
    }
    let source: Arc<dyn FlightSource> = Arc::new(http);

    let (tx, rx) = mpsc::channel();
    let (lookup_tx, lookup_rx) = mpsc::channel();
    spawn_lookup_worker(source.clone(), lookup_rx, tx.clone())
        .context("failed to start lookup worker")?;

    let mut app = App::new(&config, source, tx, lookup_tx)?;

    let mut terminal = init_terminal()?;
    app.start();
    let res = run_app(&mut terminal, &mut app, rx);
    app.shutdown();
    restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        warn!("runtime error: {err}");
        eprintln!("{err}");
    }

    info!("flightboard exited");
    Ok(())
}
