use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use delve_config::DelveConfig;
use delve_core::{DelveError, SessionEvent};
use delve_runtime::Session;

pub(super) async fn cmd_run(
    config: DelveConfig,
    timeout_secs: u64,
    json: bool,
) -> delve_core::Result<()> {
    if let Err(e) = config.validate() {
        return Err(DelveError::Config(e));
    }

    info!(api = %config.api.base_url, batch = config.explorer.batch_size, "starting exploration");
    let session = Session::from_config(&config)?;
    let progress = tokio::spawn(show_progress(session.subscribe(), json));

    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    let result = tokio::select! {
        result = session.run_to_completion(timeout) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling session");
            session.cancel();
            Err(DelveError::Cancelled)
        }
    };
    progress.abort();
    let outcome = result?;

    if json {
        let out = serde_json::json!({
            "session_id": outcome.session_id,
            "ack": outcome.ack,
            "stats": outcome.stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        eprintln!(
            "explored {} rooms, {} writings",
            outcome.stats.rooms_known, outcome.stats.writings_found
        );
        eprintln!("message: {}", outcome.stats.message);
        println!("{}", outcome.ack);
    }
    Ok(())
}

async fn show_progress(mut events: broadcast::Receiver<SessionEvent>, quiet: bool) {
    if quiet {
        return;
    }
    loop {
        match events.recv().await {
            Ok(SessionEvent::Started { room_id, drones, .. }) => {
                eprintln!("start room {room_id}, {} drones", drones.len());
            }
            Ok(SessionEvent::ExplorerFinished {
                drone_id,
                rooms_processed,
                ..
            }) => {
                eprintln!("drone {drone_id} done after {rooms_processed} rooms");
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
