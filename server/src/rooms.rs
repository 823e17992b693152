//! Room store owning every room and the membership records inside them
//!
//! The store keeps two views in step: each room's ordered member list, and
//! the connection registry pointing each connection at its member record.
//! Every mutation updates both before returning, so callers never see a
//! member listed in a room without a registry entry, or the reverse.
//!
//! Rooms are deleted in the same call that removes their last member.

use crate::registry::ConnectionRegistry;
use log::info;
use shared::{ConnectionId, JoinError, Member, Room, RoomId, RoomSpec};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Result of removing a member from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub member: Member,
    /// The room was emptied by this departure and no longer exists.
    pub room_destroyed: bool,
}

#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: BTreeMap<RoomId, Room>,
    registry: ConnectionRegistry,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(&mut self, spec: RoomSpec) -> RoomId {
        let room_id = Uuid::new_v4().to_string();
        info!(
            "Room {} created ({:?}, capacity {})",
            room_id, spec.title, spec.capacity
        );
        self.rooms
            .insert(room_id.clone(), Room::new(room_id.clone(), spec));
        room_id
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Appends `member` to the room and installs its registry entry.
    ///
    /// Checks run in a fixed order (exists, unlocked, not full) so the
    /// reported error is deterministic. A rejected join leaves the store
    /// untouched.
    pub fn join_room(&mut self, room_id: &str, mut member: Member) -> Result<&Room, JoinError> {
        let room = self.rooms.get_mut(room_id).ok_or(JoinError::RoomNotFound)?;

        if room.is_locked {
            return Err(JoinError::RoomLocked);
        }
        if room.is_full() {
            return Err(JoinError::RoomFull);
        }

        member.room_id = room_id.to_string();
        let connection_id = member.connection_id;
        room.members.push(member.clone());
        self.registry.register_member(connection_id, member);

        info!(
            "Connection {} joined room {} ({}/{})",
            connection_id,
            room_id,
            room.members.len(),
            room.capacity
        );
        Ok(room)
    }

    /// Removes the connection from `room_id`, deleting the room if it is now
    /// empty. Returns `None` if the connection is not a member of that room.
    pub fn leave_room(&mut self, room_id: &str, connection_id: ConnectionId) -> Option<Departure> {
        match self.registry.lookup_member(connection_id) {
            Some(member) if member.room_id == room_id => {}
            _ => return None,
        }

        let member = self.registry.remove_member(connection_id)?;
        let room = self.rooms.get_mut(room_id)?;
        room.members.retain(|m| m.connection_id != connection_id);

        let room_destroyed = room.members.is_empty();
        if room_destroyed {
            self.rooms.remove(room_id);
            info!("Room {} destroyed after last member left", room_id);
        } else {
            info!("Connection {} left room {}", connection_id, room_id);
        }

        Some(Departure {
            member,
            room_destroyed,
        })
    }

    pub fn register_member(&mut self, connection_id: ConnectionId, member: Member) {
        self.registry.register_member(connection_id, member);
    }

    pub fn lookup_member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.registry.lookup_member(connection_id)
    }

    /// Clears the connection's membership wherever it is. This is the
    /// teardown entry point shared by leave and disconnect.
    pub fn remove_member(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let room_id = self.registry.lookup_member(connection_id)?.room_id.clone();
        self.leave_room(&room_id, connection_id)
    }

    /// Returns false if the room does not exist.
    pub fn set_locked(&mut self, room_id: &str, locked: bool) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.is_locked = locked;
                true
            }
            None => false,
        }
    }

    /// Returns false if the room does not exist.
    pub fn set_filter(&mut self, room_id: &str, filter: Option<String>) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.filter = filter;
                true
            }
            None => false,
        }
    }

    /// Full copy of every room, in room-id order.
    pub fn snapshot(&self) -> Vec<Room> {
        self.rooms.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.registry.len()
    }
}
