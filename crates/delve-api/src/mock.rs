//! Mock API for deterministic testing.
//!
//! Serves a pre-configured in-memory graph without making any HTTP calls and
//! records every request it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::client::*;
use delve_core::{Command, CommandKind, DelveError, Result, Writing};

/// A room of the mock graph.
#[derive(Debug, Clone, Default)]
pub struct MockRoom {
    pub connections: Vec<String>,
    /// `None` is served as the "no writing" sentinel.
    pub writing: Option<(String, i64)>,
}

/// An in-memory exploration API.
///
/// # Example
/// ```
/// use delve_api::MockApiClient;
/// let api = MockApiClient::new("R0", ["D1", "D2"])
///     .with_edges(&[("R0", "R1"), ("R1", "R2")])
///     .with_writing("R2", "hello", 0);
/// ```
pub struct MockApiClient {
    initial_room: String,
    drones: Vec<String>,
    rooms: BTreeMap<String, MockRoom>,
    ack: String,
    latency: Option<Duration>,
    /// Remaining injected per-command errors, keyed by (kind, room).
    command_errors: Mutex<HashMap<(CommandKind, String), usize>>,
    /// Remaining whole-request transport failures for commands calls.
    transport_failures: Mutex<usize>,
    /// Status and message the report is refused with.
    report_rejection: Option<(u16, String)>,
    /// Every request received, in arrival order.
    pub requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockApiClient {
    pub fn new<I, S>(initial_room: impl Into<String>, drones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let initial_room = initial_room.into();
        let mut rooms = BTreeMap::new();
        rooms.insert(initial_room.clone(), MockRoom::default());
        Self {
            initial_room,
            drones: drones.into_iter().map(Into::into).collect(),
            rooms,
            ack: "mock: report received".into(),
            latency: None,
            command_errors: Mutex::new(HashMap::new()),
            transport_failures: Mutex::new(0),
            report_rejection: None,
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Add undirected edges, creating rooms as needed.
    pub fn with_edges(mut self, edges: &[(&str, &str)]) -> Self {
        for (a, b) in edges {
            self.link(a, b);
            self.link(b, a);
        }
        self
    }

    /// Add a one-way edge.
    pub fn with_edge(mut self, from: &str, to: &str) -> Self {
        self.link(from, to);
        self.rooms.entry(to.to_string()).or_default();
        self
    }

    fn link(&mut self, from: &str, to: &str) {
        let room = self.rooms.entry(from.to_string()).or_default();
        if !room.connections.iter().any(|c| c == to) {
            room.connections.push(to.to_string());
        }
    }

    /// Insert or replace a whole room.
    pub fn with_room(mut self, id: &str, room: MockRoom) -> Self {
        self.rooms.insert(id.to_string(), room);
        self
    }

    /// Put a writing in a room.
    pub fn with_writing(mut self, room: &str, text: &str, order: i64) -> Self {
        self.rooms.entry(room.to_string()).or_default().writing = Some((text.to_string(), order));
        self
    }

    /// Acknowledgement returned for the report.
    pub fn with_ack(mut self, ack: &str) -> Self {
        self.ack = ack.to_string();
        self
    }

    /// Delay every call, to widen race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer the next `times` commands of `kind` on `room` with an error.
    pub fn with_command_error(self, kind: CommandKind, room: &str, times: usize) -> Self {
        self.command_errors
            .lock()
            .insert((kind, room.to_string()), times);
        self
    }

    /// Fail the next `times` commands calls with a transport error.
    pub fn with_transport_failures(self, times: usize) -> Self {
        *self.transport_failures.lock() = times;
        self
    }

    /// Refuse the report with a non-success status.
    pub fn with_report_rejection(mut self, status: u16, message: &str) -> Self {
        self.report_rejection = Some((status, message.to_string()));
        self
    }

    /// Get all requests that were made to this client.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<ApiRequest>>> {
        Arc::clone(&self.requests)
    }

    /// How many times a command of `kind` was sent for `room`.
    pub fn command_count(&self, kind: CommandKind, room: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| match r {
                ApiRequest::Commands { commands, .. } => Some(commands),
                _ => None,
            })
            .flatten()
            .filter(|c| c.kind() == kind && c.room_id() == room)
            .count()
    }

    /// Messages submitted through `send_report`.
    pub fn reports(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| match r {
                ApiRequest::Report { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Largest batch received in a single commands call.
    pub fn max_batch(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| match r {
                ApiRequest::Commands { commands, .. } => Some(commands.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Ids of every room in the mock graph.
    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    /// The message a complete exploration should report.
    pub fn expected_message(&self) -> String {
        let mut writings = delve_core::WritingMap::new();
        for (text, order) in self.rooms.values().filter_map(|r| r.writing.clone()) {
            writings.insert(Writing::new(text, order));
        }
        writings.message()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_command_error(&self, command: &Command) -> bool {
        let mut errors = self.command_errors.lock();
        match errors.get_mut(&(command.kind(), command.room_id().to_string())) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn resolve(&self, command: &Command) -> CommandResult {
        if self.take_command_error(command) {
            return CommandResult::Error {
                message: format!("mock: {} refused", command.token()),
            };
        }
        let Some(room) = self.rooms.get(command.room_id()) else {
            return CommandResult::Error {
                message: format!("mock: unknown room {}", command.room_id()),
            };
        };
        match command.kind() {
            CommandKind::Explore => CommandResult::Connections {
                rooms: room.connections.clone(),
            },
            CommandKind::Read => match &room.writing {
                Some((text, order)) => CommandResult::Writing {
                    text: text.clone(),
                    order: *order,
                },
                None => CommandResult::Writing {
                    text: String::new(),
                    order: Writing::NO_WRITING,
                },
            },
        }
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self) -> Result<ApiResponse> {
        self.requests.lock().push(ApiRequest::Start);
        self.simulate_latency().await;
        Ok(ApiResponse::Start {
            room_id: self.initial_room.clone(),
            drone_ids: self.drones.clone(),
        })
    }

    async fn send_commands(&self, drone_id: &str, commands: &[Command]) -> Result<ApiResponse> {
        self.requests.lock().push(ApiRequest::Commands {
            drone_id: drone_id.to_string(),
            commands: commands.to_vec(),
        });
        self.simulate_latency().await;

        {
            let mut failures = self.transport_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(DelveError::Transport("mock: connection reset".into()));
            }
        }

        if !self.drones.iter().any(|d| d == drone_id) {
            return Ok(ApiResponse::NotFound);
        }

        let outcomes = commands
            .iter()
            .map(|command| CommandOutcome {
                command: command.clone(),
                result: self.resolve(command),
            })
            .collect();
        Ok(ApiResponse::Commands {
            drone_id: drone_id.to_string(),
            outcomes,
        })
    }

    async fn send_report(&self, message: &str) -> Result<ApiResponse> {
        self.requests.lock().push(ApiRequest::Report {
            message: message.to_string(),
        });
        self.simulate_latency().await;
        if let Some((status, message)) = &self.report_rejection {
            return Ok(ApiResponse::Error {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(ApiResponse::Report {
            ack: self.ack.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_start() {
        let api = MockApiClient::new("R0", ["D1", "D2"]);
        match api.start().await.unwrap() {
            ApiResponse::Start { room_id, drone_ids } => {
                assert_eq!(room_id, "R0");
                assert_eq!(drone_ids, vec!["D1", "D2"]);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_resolves_commands() {
        let api = MockApiClient::new("R0", ["D1"])
            .with_edges(&[("R0", "R1")])
            .with_writing("R1", "hi", 3);
        let commands = [
            Command::explore("R0").with_index(1),
            Command::read("R1").with_index(2),
            Command::read("R0").with_index(3),
        ];
        let ApiResponse::Commands { outcomes, .. } = api.send_commands("D1", &commands).await.unwrap()
        else {
            panic!("expected commands response");
        };
        assert_eq!(
            outcomes[0].result,
            CommandResult::Connections {
                rooms: vec!["R1".into()]
            }
        );
        assert_eq!(
            outcomes[1].result,
            CommandResult::Writing {
                text: "hi".into(),
                order: 3
            }
        );
        assert_eq!(
            outcomes[2].result,
            CommandResult::Writing {
                text: String::new(),
                order: -1
            }
        );
    }

    #[tokio::test]
    async fn test_mock_unknown_drone_is_not_found() {
        let api = MockApiClient::new("R0", ["D1"]);
        let resp = api.send_commands("D9", &[Command::read("R0").with_index(1)]).await.unwrap();
        assert_eq!(resp, ApiResponse::NotFound);
    }

    #[tokio::test]
    async fn test_mock_injected_errors_run_out() {
        let api = MockApiClient::new("R0", ["D1"]).with_command_error(CommandKind::Read, "R0", 1);
        let cmd = [Command::read("R0").with_index(1)];
        let first = api.send_commands("D1", &cmd).await.unwrap();
        let second = api.send_commands("D1", &cmd).await.unwrap();
        assert!(matches!(
            first,
            ApiResponse::Commands { ref outcomes, .. }
                if matches!(outcomes[0].result, CommandResult::Error { .. })
        ));
        assert!(matches!(
            second,
            ApiResponse::Commands { ref outcomes, .. }
                if matches!(outcomes[0].result, CommandResult::Writing { .. })
        ));
        assert_eq!(api.command_count(CommandKind::Read, "R0"), 2);
    }

    #[test]
    fn test_mock_expected_message() {
        let api = MockApiClient::new("R0", ["D1"])
            .with_edges(&[("R0", "R1"), ("R0", "R2")])
            .with_writing("R2", "world", 1)
            .with_writing("R1", "hello ", 0);
        assert_eq!(api.expected_message(), "hello world");
        assert_eq!(api.room_ids(), vec!["R0", "R1", "R2"]);
    }
}
