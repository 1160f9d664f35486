use async_trait::async_trait;
use delve_core::{Command, DroneId, Result, RoomId};

/// A request waiting to be executed against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// Begin a session: yields the initial room and the drones.
    Start,
    /// Send a batch of commands on behalf of one drone.
    Commands {
        drone_id: DroneId,
        commands: Vec<Command>,
    },
    /// Submit the assembled message.
    Report { message: String },
}

impl ApiRequest {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ApiRequest::Start => "start",
            ApiRequest::Commands { .. } => "commands",
            ApiRequest::Report { .. } => "report",
        }
    }
}

/// The outcome of one command, already decoded into its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Rooms connected to the explored room, in API order.
    Connections { rooms: Vec<RoomId> },
    /// Writing read from the room. `order == -1` means there is none.
    Writing { text: String, order: i64 },
    /// The API refused or failed this command.
    Error { message: String },
}

/// A command paired with its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: Command,
    pub result: CommandResult,
}

/// A decoded API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    Start {
        room_id: RoomId,
        drone_ids: Vec<DroneId>,
    },
    /// Outcomes sorted by command index.
    Commands {
        drone_id: DroneId,
        outcomes: Vec<CommandOutcome>,
    },
    Report {
        ack: String,
    },
    /// HTTP 404.
    NotFound,
    /// Any other non-success status, including 400.
    Error {
        status: u16,
        message: String,
    },
}

/// Trait implemented by each API transport (HTTP, in-memory mock).
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Human-readable name, e.g. "http", "mock".
    fn name(&self) -> &str;

    async fn start(&self) -> Result<ApiResponse>;

    async fn send_commands(&self, drone_id: &str, commands: &[Command]) -> Result<ApiResponse>;

    async fn send_report(&self, message: &str) -> Result<ApiResponse>;

    /// Execute a queued request with the matching call.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        match request {
            ApiRequest::Start => self.start().await,
            ApiRequest::Commands { drone_id, commands } => {
                self.send_commands(drone_id, commands).await
            }
            ApiRequest::Report { message } => self.send_report(message).await,
        }
    }
}
