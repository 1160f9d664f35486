//! # delve-runtime
//!
//! Cooperative exploration of a remote room graph by a fleet of drones.
//!
//! ## Architecture
//!
//! ```text
//!   explorer-D1   explorer-D2   ...      one OS thread per drone
//!        │             │
//!        │ Commands    │ Commands
//!        ▼             ▼
//!   ┌──────────────────────────┐
//!   │    Request Dispatcher    │   single tokio consumer, FIFO
//!   └────────────┬─────────────┘
//!                │ ApiClient (HTTP / mock)
//!                ▼
//!   ┌──────────────────────────┐
//!   │       Orchestrator       │   canonical rooms, writings, completion
//!   └────────────┬─────────────┘
//!                │ enqueue / set_busy / wake
//!                ▼
//!          explorer tasks
//! ```
//!
//! Results are applied one at a time on the dispatcher consumer. Explorers
//! block on a condition variable until the results gating them have landed.

pub mod dispatcher;
pub mod explorer;
pub mod orchestrator;
pub mod session;

pub use dispatcher::{Dispatch, Dispatcher, ResponseListener};
pub use explorer::{ExplorerListener, ExplorerTask};
pub use orchestrator::Orchestrator;
pub use session::{Session, SessionOutcome};
