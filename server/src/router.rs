//! Event router: the single owner of coordinator state
//!
//! Every inbound event runs to completion against the room store before the
//! next one is looked at, so each validate-mutate-broadcast sequence is
//! atomic with respect to every other. Broadcasts are queued while the
//! mutation's result is still in hand, which keeps every room list snapshot
//! consistent with the store at the moment it was sent.
//!
//! Leaving and disconnecting share one teardown path. It is keyed on the
//! connection's registry entry, so whichever runs second finds nothing to do.

use crate::broadcast::{Broadcaster, Outbound};
use crate::config::ServerConfig;
use crate::relay::{relay_answer, relay_offer};
use crate::rooms::RoomStore;
use crate::turn::TurnEngine;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ClientEvent, ConnectionId, Member, Peer, Room, RoomId, RoomSpec, ServerEvent, User,
};

pub struct Coordinator {
    rooms: RoomStore,
    turns: TurnEngine,
    broadcaster: Broadcaster,
    rng: StdRng,
}

impl Coordinator {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Builds a coordinator with a caller-supplied RNG, for reproducible
    /// turn orders.
    pub fn with_rng(config: &ServerConfig, rng: StdRng) -> Self {
        Self {
            rooms: RoomStore::new(),
            turns: TurnEngine::new(config.min_players, config.explosion_range()),
            broadcaster: Broadcaster::new(),
            rng,
        }
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn turns(&self) -> &TurnEngine {
        &self.turns
    }

    pub fn connection_count(&self) -> usize {
        self.broadcaster.len()
    }

    /// Registers a new connection and tells it its id.
    pub fn connect(&mut self, connection_id: ConnectionId, outbound: Outbound) {
        info!("Connection {} opened", connection_id);
        self.broadcaster.register(connection_id, outbound);
        self.broadcaster
            .send_to(connection_id, ServerEvent::Welcome { connection_id });
    }

    /// Removes the connection and runs teardown. Safe to call more than once.
    pub fn disconnect(&mut self, connection_id: ConnectionId) {
        if self.broadcaster.unregister(connection_id) {
            info!("Connection {} closed", connection_id);
        }
        self.teardown(connection_id);
    }

    pub fn handle_event(&mut self, connection_id: ConnectionId, event: ClientEvent) {
        if let Err(e) = event.validate() {
            warn!(
                "Ignoring malformed event from connection {}: {}",
                connection_id, e
            );
            return;
        }

        match event {
            ClientEvent::CreateRoom { spec } => self.create_room(connection_id, spec),
            ClientEvent::JoinRoom { room_id, user } => self.join_room(connection_id, room_id, user),
            ClientEvent::LeaveRoom { room_id } => self.leave_room(connection_id, &room_id),
            ClientEvent::SendingSignal { target, payload } => {
                let initiator = self.peer(connection_id);
                if let Err(e) = relay_offer(&self.broadcaster, initiator, target, payload) {
                    debug!("Dropping offer from {}: {}", connection_id, e);
                }
            }
            ClientEvent::ReturningSignal { target, payload } => {
                let returner = self.peer(connection_id);
                if let Err(e) = relay_answer(&self.broadcaster, returner, target, payload) {
                    debug!("Dropping answer from {}: {}", connection_id, e);
                }
            }
            ClientEvent::Chat { text } => self.chat(connection_id, text),
            ClientEvent::SetLock { room_id, locked } => {
                self.set_locked(connection_id, &room_id, locked)
            }
            ClientEvent::SetFilter { room_id, filter } => {
                self.set_filter(connection_id, &room_id, filter)
            }
            ClientEvent::RequestRoomList => {
                let rooms = self.rooms.snapshot();
                self.broadcaster
                    .send_to(connection_id, ServerEvent::RoomList { rooms });
            }
            ClientEvent::StartGame { room_id, title } => {
                self.start_game(connection_id, &room_id, &title)
            }
            ClientEvent::ProceedGame { room_id, status } => {
                if let Some(room) = joined_room(&self.rooms, connection_id, &room_id) {
                    self.broadcaster
                        .broadcast_room(room, &ServerEvent::ProceedGame { status }, None);
                }
            }
            ClientEvent::TurnChange { room_id } => self.advance_turn(connection_id, &room_id),
            ClientEvent::ResetGame { room_id } => self.reset_game(connection_id, &room_id),
            ClientEvent::Disconnect => self.disconnect(connection_id),
        }
    }

    fn create_room(&mut self, connection_id: ConnectionId, spec: RoomSpec) {
        let room_id = self.rooms.create_room(spec);
        self.broadcaster
            .send_to(connection_id, ServerEvent::RoomCreated { room_id });
        self.broadcaster.broadcast_room_list(self.rooms.snapshot());
    }

    fn join_room(&mut self, connection_id: ConnectionId, room_id: RoomId, user: User) {
        if let Some(current) = self.rooms.lookup_member(connection_id) {
            if current.room_id == room_id {
                if let Some(room) = self.rooms.room(&room_id) {
                    let room = room.clone();
                    self.broadcaster
                        .send_to(connection_id, ServerEvent::JoinAccepted { room });
                }
                return;
            }
            self.teardown(connection_id);
        }

        let member = Member::new(user, connection_id, room_id.clone());
        match self.rooms.join_room(&room_id, member).cloned() {
            Ok(room) => {
                let joined = room
                    .members
                    .iter()
                    .find(|m| m.connection_id == connection_id)
                    .cloned();

                self.broadcaster.send_to(
                    connection_id,
                    ServerEvent::JoinAccepted { room: room.clone() },
                );
                if let Some(member) = joined {
                    self.broadcaster.broadcast_room(
                        &room,
                        &ServerEvent::MemberJoined { member },
                        Some(connection_id),
                    );
                }
                self.broadcaster.broadcast_room_list(self.rooms.snapshot());
            }
            Err(error) => {
                debug!(
                    "Connection {} rejected from room {}: {}",
                    connection_id, room_id, error
                );
                self.broadcaster
                    .send_to(connection_id, ServerEvent::JoinRejected { error });
            }
        }
    }

    fn leave_room(&mut self, connection_id: ConnectionId, room_id: &str) {
        match self.rooms.lookup_member(connection_id) {
            Some(member) if member.room_id == room_id => {
                self.teardown(connection_id);
            }
            _ => debug!(
                "Connection {} asked to leave {} but is not a member",
                connection_id, room_id
            ),
        }
    }

    /// Removes the connection from its room, if any. Returns whether there
    /// was anything to remove.
    fn teardown(&mut self, connection_id: ConnectionId) -> bool {
        let Some(departure) = self.rooms.remove_member(connection_id) else {
            return false;
        };
        let room_id = &departure.member.room_id;

        if departure.room_destroyed {
            self.turns.reset_game(room_id);
        } else if let Some(room) = self.rooms.room(room_id) {
            self.broadcaster
                .broadcast_room(room, &ServerEvent::MemberLeft { connection_id }, None);

            // The departed holder can no longer pass the turn themselves
            if self.turns.holder(room_id) == Some(connection_id) {
                if let Some(next) = self.turns.advance_turn(room, connection_id) {
                    info!(
                        "Turn holder {} left room {}, turn passes to {}",
                        connection_id, room_id, next
                    );
                    self.broadcaster.broadcast_room(
                        room,
                        &ServerEvent::TurnChange {
                            connection_id: next,
                        },
                        None,
                    );
                }
            }
        }

        self.broadcaster.broadcast_room_list(self.rooms.snapshot());
        true
    }

    fn peer(&self, connection_id: ConnectionId) -> Peer {
        match self.rooms.lookup_member(connection_id) {
            Some(member) => Peer::Member(member.clone()),
            None => Peer::Connection(connection_id),
        }
    }

    fn chat(&mut self, connection_id: ConnectionId, text: String) {
        let Some(from) = self.rooms.lookup_member(connection_id).cloned() else {
            warn!("Connection {} sent chat outside a room", connection_id);
            return;
        };
        if let Some(room) = self.rooms.room(&from.room_id) {
            self.broadcaster
                .broadcast_room(room, &ServerEvent::Chat { from, text }, None);
        }
    }

    fn set_locked(&mut self, connection_id: ConnectionId, room_id: &str, locked: bool) {
        if joined_room(&self.rooms, connection_id, room_id).is_none() {
            return;
        }
        self.rooms.set_locked(room_id, locked);
        info!("Room {} locked: {}", room_id, locked);

        if let Some(room) = self.rooms.room(room_id) {
            self.broadcaster
                .broadcast_room(room, &ServerEvent::LockingStatus { locked }, None);
        }
        self.broadcaster.broadcast_room_list(self.rooms.snapshot());
    }

    fn set_filter(&mut self, connection_id: ConnectionId, room_id: &str, filter: Option<String>) {
        if joined_room(&self.rooms, connection_id, room_id).is_none() {
            return;
        }
        self.rooms.set_filter(room_id, filter.clone());

        if let Some(room) = self.rooms.room(room_id) {
            self.broadcaster
                .broadcast_room(room, &ServerEvent::VideoFilter { filter }, None);
        }
        self.broadcaster.broadcast_room_list(self.rooms.snapshot());
    }

    fn start_game(&mut self, connection_id: ConnectionId, room_id: &str, title: &str) {
        let Some(room) = joined_room(&self.rooms, connection_id, room_id) else {
            return;
        };
        let Some(init) = self.turns.start_game(room, title, &mut self.rng) else {
            return;
        };
        let Some(initial_turn) = init.initial_turn() else {
            return;
        };

        let event = ServerEvent::InitGame {
            title: init.title,
            explosion_ms: init.explosion_ms,
            initial_turn,
            turn_order: init.turn_order,
            phrases: init.phrases,
        };
        self.broadcaster.broadcast_room(room, &event, None);
    }

    fn advance_turn(&mut self, connection_id: ConnectionId, room_id: &str) {
        let Some(room) = joined_room(&self.rooms, connection_id, room_id) else {
            return;
        };
        if let Some(next) = self.turns.advance_turn(room, connection_id) {
            self.broadcaster.broadcast_room(
                room,
                &ServerEvent::TurnChange {
                    connection_id: next,
                },
                None,
            );
        }
    }

    fn reset_game(&mut self, connection_id: ConnectionId, room_id: &str) {
        let Some(room) = joined_room(&self.rooms, connection_id, room_id) else {
            return;
        };
        if self.turns.reset_game(room_id) {
            info!("Game in room {} reset", room_id);
        }
        self.broadcaster
            .broadcast_room(room, &ServerEvent::ResetGame, None);
    }
}

/// The room named by `room_id`, provided the connection is a member of it.
fn joined_room<'a>(
    rooms: &'a RoomStore,
    connection_id: ConnectionId,
    room_id: &str,
) -> Option<&'a Room> {
    match rooms.lookup_member(connection_id) {
        Some(member) if member.room_id == room_id => rooms.room(room_id),
        _ => {
            warn!(
                "Connection {} is not a member of room {}, ignoring",
                connection_id, room_id
            );
            None
        }
    }
}
