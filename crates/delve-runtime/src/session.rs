use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use delve_api::{ApiClient, HttpApiClient};
use delve_config::{DelveConfig, ExplorerConfig};
use delve_core::{DelveError, EventBus, Result, SessionEvent, SessionStats};

use crate::orchestrator::Orchestrator;

/// How a completed session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    /// The API's acknowledgement of the report.
    pub ack: String,
    pub stats: SessionStats,
}

/// The outward handle on an exploration session.
///
/// Dropping the session cancels it and stops its request consumer.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    events: EventBus,
}

impl Session {
    /// Create a session on the current tokio runtime.
    pub fn new(client: Arc<dyn ApiClient>, config: ExplorerConfig) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| DelveError::Session(format!("no tokio runtime: {e}")))?;
        Ok(Self::with_handle(client, config, handle))
    }

    pub fn with_handle(client: Arc<dyn ApiClient>, config: ExplorerConfig, handle: Handle) -> Self {
        let events = EventBus::default();
        let orchestrator = Orchestrator::new(client, config, handle, events.clone());
        Self {
            orchestrator,
            events,
        }
    }

    /// Create a session talking HTTP to the configured API.
    pub fn from_config(config: &DelveConfig) -> Result<Self> {
        let client = HttpApiClient::new(
            &config.api.base_url,
            &config.api.commander_email,
            config.api.request_timeout(),
        )?;
        Self::new(Arc::new(client), config.explorer.clone())
    }

    pub fn start(&self) -> Result<Uuid> {
        self.orchestrator.start()
    }

    pub fn cancel(&self) -> bool {
        self.orchestrator.cancel()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_started()
    }

    pub fn stats(&self) -> SessionStats {
        self.orchestrator.stats()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Start a session and wait for its report to be acknowledged. On timeout
    /// the session is cancelled.
    pub async fn run_to_completion(&self, timeout: Option<Duration>) -> Result<SessionOutcome> {
        let mut events = self.subscribe();
        let session_id = self.start()?;
        let finished = wait_for_end(&mut events, session_id);

        let Some(limit) = timeout else {
            return finished.await;
        };
        match tokio::time::timeout(limit, finished).await {
            Ok(result) => result,
            Err(_) => {
                warn!(session = %session_id, secs = limit.as_secs(), "session timed out");
                self.cancel();
                Err(DelveError::Timeout(limit.as_secs()))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.orchestrator.shutdown();
    }
}

async fn wait_for_end(
    events: &mut broadcast::Receiver<SessionEvent>,
    session_id: Uuid,
) -> Result<SessionOutcome> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Finished {
                session_id: id,
                ack,
                stats,
            }) if id == session_id => {
                return Ok(SessionOutcome {
                    session_id,
                    ack,
                    stats,
                });
            }
            Ok(SessionEvent::Cancelled { session_id: id }) if id == session_id => {
                return Err(DelveError::Cancelled);
            }
            Ok(SessionEvent::Failed {
                session_id: id,
                error,
            }) if id == session_id => return Err(DelveError::Session(error)),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "session events lagged"),
            Err(RecvError::Closed) => {
                return Err(DelveError::Session("event bus closed".into()));
            }
        }
    }
}
