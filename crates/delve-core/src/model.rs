//! Rooms, drones, commands and writings.
//!
//! A [`Room`] is shared between the orchestrator (which owns the canonical
//! registry) and every explorer thread (which only reads it and claims its
//! request flags). Set-once fields are published through [`OnceLock`] and the
//! in-flight markers are atomics, so readers on other threads never need the
//! orchestrator's lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::error::{DelveError, Result};

/// Identifier of a room in the remote graph.
pub type RoomId = String;

/// Identifier of a drone handed out by the remote API.
pub type DroneId = String;

// ── Room ───────────────────────────────────────────────────────

/// A node of the explored graph.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    /// An explore request for this room is in flight.
    awaiting_connections: AtomicBool,
    /// A read request for this room is in flight.
    awaiting_writing: AtomicBool,
    /// Weak so that cyclic graphs are freed once the registry drops them.
    connections: OnceLock<Vec<Weak<Room>>>,
    writing: OnceLock<Writing>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            awaiting_connections: AtomicBool::new(false),
            awaiting_writing: AtomicBool::new(false),
            connections: OnceLock::new(),
            writing: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_awaiting_connections(&self) -> bool {
        self.awaiting_connections.load(Ordering::Acquire)
    }

    pub fn is_awaiting_writing(&self) -> bool {
        self.awaiting_writing.load(Ordering::Acquire)
    }

    /// Whether connections have been returned for this room.
    pub fn has_connections(&self) -> bool {
        self.connections.get().is_some()
    }

    /// Whether a writing has been returned for this room. This includes the
    /// "no writing" sentinel.
    pub fn has_writing(&self) -> bool {
        self.writing.get().is_some()
    }

    /// The connected rooms that are still alive in the registry, in the order
    /// the API returned them.
    pub fn connections(&self) -> Option<Vec<Arc<Room>>> {
        self.connections
            .get()
            .map(|rooms| rooms.iter().filter_map(Weak::upgrade).collect())
    }

    pub fn writing(&self) -> Option<&Writing> {
        self.writing.get()
    }

    /// Atomically claim the right to request this room's writing.
    ///
    /// Returns `true` exactly once per outstanding request: never when the
    /// writing is already known or another request is in flight.
    pub fn try_claim_writing(&self) -> bool {
        Self::try_claim(&self.awaiting_writing, || self.has_writing())
    }

    /// Atomically claim the right to request this room's connections.
    pub fn try_claim_connections(&self) -> bool {
        Self::try_claim(&self.awaiting_connections, || self.has_connections())
    }

    fn try_claim(flag: &AtomicBool, resolved: impl Fn() -> bool) -> bool {
        if resolved() {
            return false;
        }
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // The result may have landed between the first check and the swap.
        if resolved() {
            flag.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Cache the connections and clear the in-flight marker. Returns `false`
    /// if connections were already set; the first value is kept.
    pub fn set_connections(&self, connections: &[Arc<Room>]) -> bool {
        let stored = self
            .connections
            .set(connections.iter().map(Arc::downgrade).collect())
            .is_ok();
        self.awaiting_connections.store(false, Ordering::Release);
        stored
    }

    /// Cache the writing and clear the in-flight marker. Returns `false` if a
    /// writing was already set; the first value is kept.
    pub fn set_writing(&self, writing: Writing) -> bool {
        let stored = self.writing.set(writing).is_ok();
        self.awaiting_writing.store(false, Ordering::Release);
        stored
    }

    /// Drop the in-flight marker for `kind` without caching a result, so the
    /// room can be requested again.
    pub fn release(&self, kind: CommandKind) {
        match kind {
            CommandKind::Read => self.awaiting_writing.store(false, Ordering::Release),
            CommandKind::Explore => self.awaiting_connections.store(false, Ordering::Release),
        }
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Room {}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Room({})", self.id)
    }
}

// ── Drone ──────────────────────────────────────────────────────

/// An exploration agent handed out by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Drone {
    pub id: DroneId,
}

impl Drone {
    pub fn new(id: impl Into<DroneId>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Drone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Drone({})", self.id)
    }
}

// ── Command ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Ask for the writing in a room.
    Read,
    /// Ask for the rooms connected to a room.
    Explore,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Read => "read",
            CommandKind::Explore => "explore",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = DelveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(CommandKind::Read),
            "explore" => Ok(CommandKind::Explore),
            other => Err(DelveError::CommandKind(other.to_string())),
        }
    }
}

/// A single drone command against one room.
///
/// The index is assigned when the command is flushed in a batch and is only
/// used to correlate the asynchronous result back to the command. Index `0`
/// means "not yet assigned".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    index: u32,
    kind: CommandKind,
    room_id: RoomId,
}

impl Command {
    const DELIMITER: char = '.';

    pub fn new(kind: CommandKind, room_id: impl Into<RoomId>) -> Self {
        Self {
            index: 0,
            kind,
            room_id: room_id.into(),
        }
    }

    pub fn read(room_id: impl Into<RoomId>) -> Self {
        Self::new(CommandKind::Read, room_id)
    }

    pub fn explore(room_id: impl Into<RoomId>) -> Self {
        Self::new(CommandKind::Explore, room_id)
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The correlation token, `"{index}.{kind}.{room_id}"`.
    pub fn token(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.index,
            self.kind,
            self.room_id,
            d = Self::DELIMITER
        )
    }

    /// Decode a correlation token. Only the first two delimiters are
    /// significant, so room ids may themselves contain dots.
    pub fn from_token(token: &str) -> Result<Self> {
        let mut parts = token.splitn(3, Self::DELIMITER);
        let (Some(index), Some(kind), Some(room_id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DelveError::CommandToken(token.to_string()));
        };
        let index = index
            .parse::<u32>()
            .map_err(|_| DelveError::CommandToken(token.to_string()))?;
        if room_id.is_empty() {
            return Err(DelveError::CommandToken(token.to_string()));
        }
        Ok(Self {
            index,
            kind: kind.parse()?,
            room_id: room_id.to_string(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

// ── Writing ────────────────────────────────────────────────────

/// A text fragment found in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Writing {
    pub text: String,
    pub order: i64,
}

impl Writing {
    /// Order reported for rooms that hold no writing.
    pub const NO_WRITING: i64 = -1;

    pub fn new(text: impl Into<String>, order: i64) -> Self {
        Self {
            text: text.into(),
            order,
        }
    }

    /// Whether this writing takes part in the final message.
    pub fn is_valid(&self) -> bool {
        self.order != Self::NO_WRITING
    }
}

/// Valid writings keyed by order. Gaps are allowed; a later insert at an
/// existing order replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct WritingMap {
    writings: BTreeMap<i64, Writing>,
}

impl WritingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a writing. Sentinel writings are ignored and return `false`.
    pub fn insert(&mut self, writing: Writing) -> bool {
        if !writing.is_valid() {
            return false;
        }
        self.writings.insert(writing.order, writing);
        true
    }

    pub fn get(&self, order: i64) -> Option<&Writing> {
        self.writings.get(&order)
    }

    pub fn len(&self) -> usize {
        self.writings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writings.is_empty()
    }

    pub fn clear(&mut self) {
        self.writings.clear();
    }

    /// Writings in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Writing> {
        self.writings.values()
    }

    /// Concatenate every writing by ascending order.
    pub fn message(&self) -> String {
        self.iter().map(|w| w.text.as_str()).collect()
    }
}
