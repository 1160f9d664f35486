//! # Explorer Task
//!
//! One explorer per drone, each on its own OS thread. An explorer walks its
//! private frontier depth-first, claims the rooms it is first to see, batches
//! the resulting read/explore commands, and blocks until the orchestrator has
//! applied the results that gate its progress.

use parking_lot::{Condvar, Mutex};
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use delve_api::ApiRequest;
use delve_config::ExplorerConfig;
use delve_core::{Command, CommandKind, DroneId, Room, RoomId};

use crate::dispatcher::{Dispatch, Dispatcher};

/// Notified when an explorer has nothing left to do.
pub trait ExplorerListener: Send + Sync {
    fn on_explorer_finished(&self, drone_id: &str, epoch: u64, rooms_processed: usize);
}

#[derive(Default)]
struct State {
    frontier: VecDeque<Arc<Room>>,
    known: HashSet<RoomId>,
    current: Option<Arc<Room>>,
    /// A batch of this drone's commands is in flight.
    busy: bool,
    cancelled: bool,
}

pub struct ExplorerTask {
    drone_id: DroneId,
    epoch: u64,
    config: ExplorerConfig,
    dispatcher: Dispatcher,
    listener: Weak<dyn ExplorerListener>,
    state: Mutex<State>,
    wakeup: Condvar,
}

impl ExplorerTask {
    pub fn new(
        drone_id: impl Into<DroneId>,
        epoch: u64,
        config: ExplorerConfig,
        dispatcher: Dispatcher,
        listener: Weak<dyn ExplorerListener>,
    ) -> Self {
        Self {
            drone_id: drone_id.into(),
            epoch,
            config,
            dispatcher,
            listener,
            state: Mutex::new(State::default()),
            wakeup: Condvar::new(),
        }
    }

    pub fn drone_id(&self) -> &str {
        &self.drone_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Push the rooms this explorer has not seen yet onto the front of its
    /// frontier. Always wakes the loop. Returns whether anything was added.
    pub fn enqueue(&self, mut rooms: Vec<Arc<Room>>) -> bool {
        if self.config.shuffle {
            rooms.shuffle(&mut rand::rng());
        }
        let mut added = false;
        {
            let mut state = self.state.lock();
            for room in rooms {
                if state.known.insert(room.id().to_string()) {
                    state.frontier.push_front(room);
                    added = true;
                }
            }
        }
        self.wakeup.notify_all();
        added
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.lock().busy = busy;
        if !busy {
            self.wakeup.notify_all();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Whether the loop is currently evaluating `room`.
    pub fn is_current(&self, room: &Room) -> bool {
        self.state
            .lock()
            .current
            .as_deref()
            .is_some_and(|current| current == room)
    }

    /// Wake the loop so it re-checks its wait condition.
    pub fn wake(&self) {
        let _state = self.state.lock();
        self.wakeup.notify_all();
    }

    /// Ask the loop to stop at its next check. A request in flight is not
    /// interrupted.
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Rooms waiting in the frontier.
    pub fn frontier_len(&self) -> usize {
        self.state.lock().frontier.len()
    }

    /// The explorer loop. Blocks the calling thread until the frontier is
    /// exhausted or the task is cancelled, then reports to the listener once.
    pub fn run(&self) {
        debug!(drone = %self.drone_id, epoch = self.epoch, "explorer started");
        let mut buffer: Vec<Pending> = Vec::new();
        let mut processed = 0usize;

        loop {
            let Some(room) = self.advance() else {
                if buffer.is_empty() || self.is_cancelled() {
                    break;
                }
                // Nothing left to walk, but claimed rooms still need requesting.
                while !buffer.is_empty() && !self.is_cancelled() {
                    self.flush(&mut buffer);
                    self.wait_while(|state| state.busy);
                }
                continue;
            };
            processed += 1;

            if room.try_claim_writing() {
                buffer.push(Pending::new(Command::read(room.id()), &room));
            }
            if room.try_claim_connections() {
                buffer.push(Pending::new(Command::explore(room.id()), &room));
            }
            if let Some(connections) = room.connections() {
                self.enqueue(connections);
            }

            if room.is_awaiting_connections() || buffer.len() >= self.config.batch_size {
                self.flush(&mut buffer);
            }
            // Our own explore for this room may not have fit in that batch.
            while !self.is_cancelled() && buffer.iter().any(|p| p.explores(&room)) {
                self.wait_while(|state| state.busy);
                if self.is_cancelled() {
                    break;
                }
                self.flush(&mut buffer);
            }
            self.wait_while(|state| state.busy || room.is_awaiting_connections());
        }

        for pending in buffer.drain(..) {
            debug!(drone = %self.drone_id, command = %pending.command, "dropping unsent command");
            pending.release();
        }
        self.state.lock().current = None;

        if self.is_cancelled() {
            info!(drone = %self.drone_id, processed, "explorer cancelled");
        } else {
            info!(drone = %self.drone_id, processed, "explorer finished");
        }
        if let Some(listener) = self.listener.upgrade() {
            listener.on_explorer_finished(&self.drone_id, self.epoch, processed);
        }
    }

    /// Pop the next room as current. `None` when the frontier is empty or the
    /// task was cancelled.
    fn advance(&self) -> Option<Arc<Room>> {
        let mut state = self.state.lock();
        state.current = if state.cancelled {
            None
        } else {
            state.frontier.pop_front()
        };
        state.current.clone()
    }

    fn wait_while(&self, mut blocked: impl FnMut(&State) -> bool) {
        let mut state = self.state.lock();
        while !state.cancelled && blocked(&state) {
            self.wakeup.wait(&mut state);
        }
    }

    /// Send up to `batch_size` buffered commands as one request, indexed from 1
    /// in buffer order.
    fn flush(&self, buffer: &mut Vec<Pending>) {
        if buffer.is_empty() {
            return;
        }
        let take = buffer.len().min(self.config.batch_size.max(1));
        let batch: Vec<Pending> = buffer.drain(..take).collect();
        let commands: Vec<Command> = batch
            .iter()
            .enumerate()
            .map(|(i, pending)| pending.command.clone().with_index(i as u32 + 1))
            .collect();

        // Mark busy before submitting so a fast result cannot be lost.
        self.state.lock().busy = true;

        debug!(drone = %self.drone_id, count = commands.len(), "flushing commands");
        let request = ApiRequest::Commands {
            drone_id: self.drone_id.clone(),
            commands,
        };
        if self.dispatcher.submit(Dispatch::new(self.epoch, request)) {
            return;
        }

        warn!(drone = %self.drone_id, "dispatcher stopped, cancelling explorer");
        for pending in batch.into_iter().chain(buffer.drain(..)) {
            pending.release();
        }
        let mut state = self.state.lock();
        state.busy = false;
        state.cancelled = true;
        self.wakeup.notify_all();
    }
}

/// A claimed command that has not been sent yet.
struct Pending {
    command: Command,
    room: Arc<Room>,
}

impl Pending {
    fn new(command: Command, room: &Arc<Room>) -> Self {
        Self {
            command,
            room: Arc::clone(room),
        }
    }

    fn explores(&self, room: &Room) -> bool {
        self.command.kind() == CommandKind::Explore && *self.room == *room
    }

    /// Give the claim back so another explorer can request the room.
    fn release(&self) {
        self.room.release(self.command.kind());
    }
}
