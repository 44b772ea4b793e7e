use anyhow::Result;
use log::{error, info, warn};
use std::sync::mpsc;
use std::sync::Arc;

use dwalld::alarm::ThreadScheduler;
use dwalld::apply::Applier;
use dwalld::config::Config;
use dwalld::coordinator::{Coordinator, Event, LiveContext};
use dwalld::db::RuleStore;
use dwalld::images::ImageStore;
use dwalld::ipc;
use dwalld::monitor::WifiMonitor;
use dwalld::sink::DesktopSink;
use dwalld::state::AppliedState;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_args()?;
    let store = RuleStore::open(&config.db_path)?;

    let state = Arc::new(AppliedState::new(config.state_path.clone()));
    let applier = Applier::new(
        ImageStore::new(config.images_dir.clone()),
        Arc::clone(&state),
        Arc::new(DesktopSink),
    );

    let (tx, rx) = mpsc::channel();

    let scheduler = ThreadScheduler::start(tx.clone());
    let _monitor = WifiMonitor::start(config.poll_interval, config.settle_delay, tx.clone());

    let sock = ipc::socket_path()?;
    {
        let events = tx.clone();
        let state = Arc::clone(&state);
        let db_path = config.db_path.clone();
        std::thread::spawn(move || {
            if let Err(err) = ipc::run_server(&sock, events, state, db_path) {
                error!("ipc server stopped: {err:#}");
            }
        });
    }

    let shutdown_tx = tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(Event::Shutdown);
    }) {
        warn!("ctrlc handler registration failed: {err}");
    }

    info!(
        "dwalld started | db={} | images={} | poll={}ms | settle={}ms",
        config.db_path.display(),
        config.images_dir.display(),
        config.poll_interval.as_millis(),
        config.settle_delay.as_millis()
    );

    // Alarms do not survive a restart; Boot re-arms every time rule and runs
    // the first resolution.
    let _ = tx.send(Event::Boot);

    let mut coordinator = Coordinator::new(
        store,
        applier,
        Box::new(scheduler),
        Box::new(LiveContext),
    );
    coordinator.run(rx);

    info!("dwalld stopped");
    Ok(())
}
