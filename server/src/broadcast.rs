//! Outbound fan-out to connected clients
//!
//! Each connection owns one unbounded queue drained by its writer task, so
//! events sent to a single connection arrive in the order they were queued.
//! There is no ordering between different connections.
//!
//! Two scopes exist:
//! - global: every registered connection, used for the room list snapshot
//! - room: the connections currently listed as members of one room

use log::{debug, error, warn};
use shared::{encoded_len, ConnectionId, Room, ServerEvent, MAX_SERVER_FRAME_LEN};
use std::collections::HashMap;
use tokio::sync::mpsc;

pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
pub struct Broadcaster {
    connections: HashMap<ConnectionId, Outbound>,
    max_frame_len: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_frame_limit(MAX_SERVER_FRAME_LEN)
    }

    /// `max_frame_len` is the largest frame clients will read.
    pub fn with_frame_limit(max_frame_len: usize) -> Self {
        Self {
            connections: HashMap::new(),
            max_frame_len,
        }
    }

    pub fn register(&mut self, connection_id: ConnectionId, outbound: Outbound) {
        self.connections.insert(connection_id, outbound);
    }

    /// Returns false if the connection was already gone.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> bool {
        self.connections.remove(&connection_id).is_some()
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queues an event for one connection. Returns false if the connection is
    /// unknown or its writer has already shut down.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection_id) {
            Some(outbound) => {
                if outbound.send(event).is_err() {
                    warn!("Writer for connection {} is closed", connection_id);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Sends to every connected client, except `exclude` if given.
    pub fn broadcast_all(&self, event: &ServerEvent, exclude: Option<ConnectionId>) {
        for (&connection_id, outbound) in &self.connections {
            if Some(connection_id) == exclude {
                continue;
            }
            if outbound.send(event.clone()).is_err() {
                warn!("Failed to queue broadcast for connection {}", connection_id);
            }
        }
    }

    /// Sends to the room's current members, except `exclude` if given.
    pub fn broadcast_room(&self, room: &Room, event: &ServerEvent, exclude: Option<ConnectionId>) {
        for connection_id in room.connection_ids() {
            if Some(connection_id) == exclude {
                continue;
            }
            self.send_to(connection_id, event.clone());
        }
    }

    /// Sends the full room list to everyone. The caller passes the snapshot
    /// taken after its mutation, so no client sees a partially applied state.
    ///
    /// A snapshot too large for clients to read is dropped rather than sent,
    /// since every receiver would disconnect on it. Returns whether it went
    /// out.
    pub fn broadcast_room_list(&self, rooms: Vec<Room>) -> bool {
        let event = ServerEvent::RoomList { rooms };
        match encoded_len(&event) {
            Ok(len) if len <= self.max_frame_len => {}
            Ok(len) => {
                error!(
                    "Room list of {} bytes exceeds client limit of {} bytes, not sent",
                    len, self.max_frame_len
                );
                return false;
            }
            Err(e) => {
                error!("Failed to size room list: {}", e);
                return false;
            }
        }

        debug!("Broadcasting room list to {} connections", self.connections.len());
        self.broadcast_all(&event, None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Member, RoomSpec, User};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(broadcaster: &mut Broadcaster, id: ConnectionId) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.register(id, tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn room_with(ids: &[ConnectionId]) -> Room {
        let mut room = Room::new(
            "r".to_string(),
            RoomSpec {
                title: "t".to_string(),
                capacity: 4,
            },
        );
        for &id in ids {
            room.members
                .push(Member::new(User::new("u", "n"), id, "r".to_string()));
        }
        room
    }

    #[test]
    fn test_send_to_unknown_connection() {
        let broadcaster = Broadcaster::new();
        assert!(!broadcaster.send_to(5, ServerEvent::ResetGame));
    }

    #[test]
    fn test_send_to_closed_writer() {
        let mut broadcaster = Broadcaster::new();
        let rx = connect(&mut broadcaster, 1);
        drop(rx);
        assert!(!broadcaster.send_to(1, ServerEvent::ResetGame));
    }

    #[test]
    fn test_broadcast_all_with_exclude() {
        let mut broadcaster = Broadcaster::new();
        let mut rx1 = connect(&mut broadcaster, 1);
        let mut rx2 = connect(&mut broadcaster, 2);

        broadcaster.broadcast_all(&ServerEvent::ResetGame, Some(1));

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2), vec![ServerEvent::ResetGame]);
    }

    #[test]
    fn test_broadcast_room_only_reaches_members() {
        let mut broadcaster = Broadcaster::new();
        let mut rx1 = connect(&mut broadcaster, 1);
        let mut rx2 = connect(&mut broadcaster, 2);
        let mut rx3 = connect(&mut broadcaster, 3);

        let room = room_with(&[1, 2]);
        broadcaster.broadcast_room(&room, &ServerEvent::LockingStatus { locked: true }, None);

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
        assert!(drain(&mut rx3).is_empty());

        broadcaster.broadcast_room(&room, &ServerEvent::MemberLeft { connection_id: 9 }, Some(2));
        assert_eq!(drain(&mut rx1).len(), 1);
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_per_connection_fifo() {
        let mut broadcaster = Broadcaster::new();
        let mut rx = connect(&mut broadcaster, 1);

        for connection_id in 0..5 {
            broadcaster.send_to(1, ServerEvent::TurnChange { connection_id });
        }

        let order: Vec<ConnectionId> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::TurnChange { connection_id } => Some(connection_id),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_oversized_room_list_is_not_sent() {
        let mut broadcaster = Broadcaster::with_frame_limit(256);
        let mut rx = connect(&mut broadcaster, 1);

        assert!(broadcaster.broadcast_room_list(vec![room_with(&[1])]));
        assert_eq!(drain(&mut rx).len(), 1);

        let crowded: Vec<Room> = (0..20).map(|_| room_with(&[1, 2, 3])).collect();
        assert!(!broadcaster.broadcast_room_list(crowded));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_unregister() {
        let mut broadcaster = Broadcaster::new();
        let _rx = connect(&mut broadcaster, 1);
        assert!(broadcaster.is_connected(1));
        assert!(broadcaster.unregister(1));
        assert!(!broadcaster.unregister(1));
        assert!(broadcaster.is_empty());
    }
}
