//! # Orchestrator
//!
//! Owns the canonical state of one exploration session: the drones, their
//! explorer tasks, every room seen so far, and the collected writings. It is
//! the single [`ResponseListener`] of the dispatcher, so all API results are
//! applied here, one delivery at a time, and it detects global completion
//! when the last explorer finishes.
//!
//! Lock order is orchestrator state, then explorer state. Explorers never
//! call back into the orchestrator while holding their own lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use delve_api::{ApiClient, ApiRequest, ApiResponse, CommandOutcome, CommandResult};
use delve_config::ExplorerConfig;
use delve_core::{
    Command, DelveError, Drone, DroneId, EventBus, Result, Room, RoomId, SessionEvent,
    SessionStats, Writing, WritingMap,
};

use crate::dispatcher::{Dispatch, Dispatcher, ResponseListener};
use crate::explorer::{ExplorerListener, ExplorerTask};

struct State {
    session_id: Uuid,
    /// Bumped on every start and cancel. Results tagged with another epoch
    /// are stale.
    epoch: u64,
    started: bool,
    reported: bool,
    drones: Vec<Drone>,
    /// Explorers still running, by drone id.
    tasks: HashMap<DroneId, Arc<ExplorerTask>>,
    rooms: HashMap<RoomId, Arc<Room>>,
    writings: WritingMap,
    processed: BTreeMap<DroneId, usize>,
    started_at: Option<DateTime<Utc>>,
}

impl State {
    fn new() -> Self {
        Self {
            session_id: Uuid::nil(),
            epoch: 0,
            started: false,
            reported: false,
            drones: vec![],
            tasks: HashMap::new(),
            rooms: HashMap::new(),
            writings: WritingMap::new(),
            processed: BTreeMap::new(),
            started_at: None,
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        epoch != self.epoch
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            rooms_known: self.rooms.len(),
            writings_found: self.writings.len(),
            rooms_processed: self.processed.clone(),
            message: self.writings.message(),
            started_at: self.started_at,
            finished_at: None,
        }
    }

    fn cancel_tasks(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.cancel();
        }
    }

    /// Wake every explorer currently evaluating `room`.
    fn wake_current(&self, room: &Room) {
        for task in self.tasks.values() {
            if task.is_current(room) {
                task.wake();
            }
        }
    }

    /// Give back the in-flight claim a command held, so the room can be
    /// requested again and nobody keeps waiting on it.
    fn release(&self, command: &Command) {
        if let Some(room) = self.rooms.get(command.room_id()) {
            room.release(command.kind());
            self.wake_current(room);
        }
    }
}

pub struct Orchestrator {
    me: Weak<Orchestrator>,
    dispatcher: Dispatcher,
    config: ExplorerConfig,
    events: EventBus,
    state: Mutex<State>,
}

impl Orchestrator {
    /// Build an orchestrator and register it as the dispatcher's listener.
    pub fn new(
        client: Arc<dyn ApiClient>,
        config: ExplorerConfig,
        handle: Handle,
        events: EventBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Orchestrator>| {
            let dispatcher = Dispatcher::new(client, handle);
            let listener: Weak<dyn ResponseListener> = me.clone();
            dispatcher.set_listener(listener);
            Self {
                me: me.clone(),
                dispatcher,
                config,
                events,
                state: Mutex::new(State::new()),
            }
        })
    }

    /// Begin a new session. Idempotent while one is running: returns the id
    /// of the running session.
    pub fn start(&self) -> Result<Uuid> {
        let mut state = self.state.lock();
        if state.started {
            debug!(session = %state.session_id, "session already running");
            return Ok(state.session_id);
        }
        if self.dispatcher.is_stopped() {
            return Err(DelveError::DispatcherStopped);
        }

        self.dispatcher.reset();
        state.cancel_tasks();
        state.drones.clear();
        state.rooms.clear();
        state.writings.clear();
        state.processed.clear();

        state.epoch += 1;
        state.session_id = Uuid::new_v4();
        state.started = true;
        state.reported = false;
        state.started_at = Some(Utc::now());

        info!(session = %state.session_id, epoch = state.epoch, "session starting");
        if !self
            .dispatcher
            .submit(Dispatch::new(state.epoch, ApiRequest::Start))
        {
            state.started = false;
            return Err(DelveError::DispatcherStopped);
        }
        Ok(state.session_id)
    }

    /// Stop the running session. Explorers stop at their next check; results
    /// still in flight are discarded when they arrive. Returns `false` if no
    /// session was running.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if !state.started {
            return false;
        }
        self.dispatcher.reset();
        state.started = false;
        state.epoch += 1;
        state.cancel_tasks();
        info!(session = %state.session_id, "session cancelled");
        self.events.publish(SessionEvent::Cancelled {
            session_id: state.session_id,
        });
        true
    }

    /// Cancel and stop the dispatcher for good.
    pub fn shutdown(&self) {
        self.cancel();
        self.dispatcher.stop();
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn session_id(&self) -> Uuid {
        self.state.lock().session_id
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Explorers that have not finished yet.
    pub fn running(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn drones(&self) -> Vec<Drone> {
        self.state.lock().drones.clone()
    }

    /// Snapshot of the session so far.
    pub fn stats(&self) -> SessionStats {
        self.state.lock().stats()
    }

    pub fn room(&self, id: &str) -> Option<Arc<Room>> {
        self.state.lock().rooms.get(id).cloned()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The canonical room for `id`, created on first sight.
    fn resolve_room(&self, state: &mut State, id: &str) -> Arc<Room> {
        if let Some(room) = state.rooms.get(id) {
            return Arc::clone(room);
        }
        let room = Arc::new(Room::new(id));
        state.rooms.insert(id.to_string(), Arc::clone(&room));
        debug!(room = id, "room discovered");
        self.events.publish(SessionEvent::RoomDiscovered {
            session_id: state.session_id,
            room_id: id.to_string(),
        });
        room
    }

    fn handle_start(&self, state: &mut State, room_id: RoomId, drone_ids: Vec<DroneId>) {
        info!(room = %room_id, drones = drone_ids.len(), "session started");
        self.events.publish(SessionEvent::Started {
            session_id: state.session_id,
            room_id: room_id.clone(),
            drones: drone_ids.clone(),
        });
        state.drones = drone_ids.iter().map(Drone::new).collect();

        if drone_ids.is_empty() {
            warn!("no drones assigned, reporting an empty message");
            self.submit_report(state);
            return;
        }

        let initial = self.resolve_room(state, &room_id);
        for drone_id in drone_ids {
            let listener: Weak<dyn ExplorerListener> = self.me.clone();
            let task = Arc::new(ExplorerTask::new(
                drone_id.clone(),
                state.epoch,
                self.config.clone(),
                self.dispatcher.clone(),
                listener,
            ));
            task.enqueue(vec![Arc::clone(&initial)]);
            state.tasks.insert(drone_id, task);
        }

        let tasks: Vec<Arc<ExplorerTask>> = state.tasks.values().cloned().collect();
        for task in tasks {
            let runner = Arc::clone(&task);
            let spawned = std::thread::Builder::new()
                .name(format!("explorer-{}", task.drone_id()))
                .spawn(move || runner.run());
            if let Err(e) = spawned {
                error!(drone = %task.drone_id(), error = %e, "failed to spawn explorer thread");
                state.tasks.remove(task.drone_id());
            }
        }

        if state.tasks.is_empty() {
            self.submit_report(state);
        }
    }

    fn handle_commands(
        &self,
        state: &mut State,
        drone_id: &str,
        commands: &[Command],
        outcomes: Vec<CommandOutcome>,
    ) {
        let mut answered = HashSet::with_capacity(outcomes.len());

        for CommandOutcome { command, result } in outcomes {
            answered.insert(command.index());
            let room = self.resolve_room(state, command.room_id());

            match result {
                CommandResult::Connections { rooms } => {
                    let connections: Vec<Arc<Room>> = rooms
                        .iter()
                        .map(|id| self.resolve_room(state, id))
                        .collect();
                    // Hand the connections over before the awaiting flag clears.
                    for task in state.tasks.values() {
                        if task.is_current(&room) {
                            task.enqueue(connections.clone());
                        }
                    }
                    if !room.set_connections(&connections) {
                        debug!(room = %room.id(), "connections already known");
                    }
                    state.wake_current(&room);
                }
                CommandResult::Writing { text, order } => {
                    let writing = Writing::new(text, order);
                    if writing.is_valid() {
                        debug!(room = %room.id(), order, "writing found");
                        self.events.publish(SessionEvent::WritingFound {
                            session_id: state.session_id,
                            room_id: room.id().to_string(),
                            order,
                            text: writing.text.clone(),
                        });
                        state.writings.insert(writing.clone());
                    }
                    room.set_writing(writing);
                }
                CommandResult::Error { message } => {
                    warn!(drone = drone_id, command = %command, error = %message, "command failed");
                    if self.config.release_on_error {
                        state.release(&command);
                    }
                }
            }
        }

        for command in commands.iter().filter(|c| !answered.contains(&c.index())) {
            warn!(drone = drone_id, command = %command, "no result for command");
            state.release(command);
        }

        if let Some(task) = state.tasks.get(drone_id) {
            task.set_busy(false);
        }
    }

    fn handle_report(&self, state: &mut State, ack: String) {
        let mut stats = state.stats();
        stats.finished_at = Some(Utc::now());
        state.started = false;
        info!(
            session = %state.session_id,
            ack = %ack,
            rooms = stats.rooms_known,
            writings = stats.writings_found,
            "report acknowledged"
        );
        self.events.publish(SessionEvent::Finished {
            session_id: state.session_id,
            ack,
            stats,
        });
    }

    /// Send the aggregated message. At most once per session.
    fn submit_report(&self, state: &mut State) {
        if state.reported {
            return;
        }
        state.reported = true;
        let message = state.writings.message();
        info!(
            writings = state.writings.len(),
            rooms = state.rooms.len(),
            "all explorers finished, reporting"
        );
        if !self
            .dispatcher
            .submit(Dispatch::new(state.epoch, ApiRequest::Report { message }))
        {
            self.fail(state, "dispatcher stopped before the report was sent".into());
        }
    }

    /// A request produced no usable result.
    fn abandon(&self, state: &mut State, request: &ApiRequest, reason: DelveError) {
        match request {
            ApiRequest::Commands { drone_id, commands } => {
                warn!(drone = %drone_id, count = commands.len(), reason = %reason, "command batch lost");
                for command in commands {
                    state.release(command);
                }
                if let Some(task) = state.tasks.get(drone_id) {
                    task.set_busy(false);
                }
            }
            ApiRequest::Start | ApiRequest::Report { .. } => {
                self.fail(state, format!("{} request failed: {reason}", request.label()));
            }
        }
    }

    fn fail(&self, state: &mut State, error: String) {
        error!(session = %state.session_id, error = %error, "session failed");
        state.started = false;
        state.epoch += 1;
        state.cancel_tasks();
        self.events.publish(SessionEvent::Failed {
            session_id: state.session_id,
            error,
        });
    }
}

impl ResponseListener for Orchestrator {
    fn on_response(&self, dispatch: &Dispatch, response: ApiResponse) {
        let mut state = self.state.lock();
        if state.is_stale(dispatch.epoch) {
            debug!(
                request = dispatch.request.label(),
                epoch = dispatch.epoch,
                current = state.epoch,
                "discarding stale result"
            );
            return;
        }

        match (&dispatch.request, response) {
            (ApiRequest::Start, ApiResponse::Start { room_id, drone_ids }) => {
                self.handle_start(&mut state, room_id, drone_ids)
            }
            (ApiRequest::Commands { drone_id, commands }, ApiResponse::Commands { outcomes, .. }) => {
                self.handle_commands(&mut state, drone_id, commands, outcomes)
            }
            (ApiRequest::Report { .. }, ApiResponse::Report { ack }) => {
                self.handle_report(&mut state, ack)
            }
            (request, ApiResponse::NotFound) => {
                warn!(request = request.label(), "api returned not found");
                self.abandon(
                    &mut state,
                    request,
                    DelveError::NotFound(request.label().to_string()),
                );
            }
            (request, ApiResponse::Error { status, message }) => {
                warn!(request = request.label(), status, error = %message, "api returned an error");
                self.abandon(&mut state, request, DelveError::Request { status, message });
            }
            (request, other) => {
                warn!(request = request.label(), response = ?other, "response does not match request");
                self.abandon(
                    &mut state,
                    request,
                    DelveError::Decode(format!("unexpected response to {}", request.label())),
                );
            }
        }
    }

    fn on_request_error(&self, dispatch: &Dispatch, error: DelveError) {
        let mut state = self.state.lock();
        if state.is_stale(dispatch.epoch) {
            debug!(request = dispatch.request.label(), "discarding stale failure");
            return;
        }
        self.abandon(&mut state, &dispatch.request, error);
    }
}

impl ExplorerListener for Orchestrator {
    fn on_explorer_finished(&self, drone_id: &str, epoch: u64, rooms_processed: usize) {
        let mut state = self.state.lock();
        if state.is_stale(epoch) {
            debug!(drone = drone_id, epoch, "ignoring explorer from an earlier session");
            return;
        }
        if state.tasks.remove(drone_id).is_none() {
            return;
        }
        state.processed.insert(drone_id.to_string(), rooms_processed);
        self.events.publish(SessionEvent::ExplorerFinished {
            session_id: state.session_id,
            drone_id: drone_id.to_string(),
            rooms_processed,
        });
        debug!(drone = drone_id, remaining = state.tasks.len(), "explorer removed");

        if state.tasks.is_empty() {
            self.submit_report(&mut state);
        }
    }
}
