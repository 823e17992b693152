//! Connection registry mapping live connections to their room membership
//!
//! A connection holds at most one `Member` at a time. The registry is the
//! authority for "which room is this connection in", and clearing an entry
//! here is what makes teardown idempotent: a second leave or disconnect for
//! the same connection finds nothing and does nothing.

use log::debug;
use shared::{ConnectionId, Member};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: HashMap<ConnectionId, Member>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the membership record for a connection, replacing any
    /// previous one.
    pub fn register_member(&mut self, connection_id: ConnectionId, member: Member) {
        debug!(
            "Connection {} registered as {} in room {}",
            connection_id, member.user_id, member.room_id
        );
        self.members.insert(connection_id, member);
    }

    pub fn lookup_member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members.get(&connection_id)
    }

    /// Returns the removed record, or `None` if the connection was already
    /// cleared.
    pub fn remove_member(&mut self, connection_id: ConnectionId) -> Option<Member> {
        self.members.remove(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
