use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod codec;

pub use codec::{encoded_len, read_frame, write_frame, FrameError};

/// Largest frame the server accepts from a client.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;
/// Largest frame a client accepts from the server. Room lists grow with the
/// number of rooms, so this sits well above the inbound limit.
pub const MAX_SERVER_FRAME_LEN: usize = 16 * 1024 * 1024;

pub const MAX_ROOM_CAPACITY: u32 = 64;
pub const MAX_TITLE_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_CHAT_LEN: usize = 2 * 1024;
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024;

pub const MIN_GAME_PLAYERS: usize = 2;
pub const MIN_EXPLOSION_SECS: u64 = 30;
pub const MAX_EXPLOSION_SECS: u64 = 60;

/// Phrases handed to every player when an elimination round starts.
pub const PHRASES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog",
    "She sells seashells by the seashore",
    "Peter Piper picked a peck of pickled peppers",
    "How much wood would a woodchuck chuck",
    "Red lorry, yellow lorry",
    "Unique New York, you know you need unique New York",
    "Six slippery snails slid slowly seaward",
    "A proper copper coffee pot",
];

pub type ConnectionId = u32;
pub type RoomId = String;

/// Identity issued by the login flow and presented when joining a room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
}

impl User {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A user's presence inside exactly one room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub display_name: String,
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
}

impl Member {
    pub fn new(user: User, connection_id: ConnectionId, room_id: RoomId) -> Self {
        Self {
            user_id: user.user_id,
            display_name: user.display_name,
            connection_id,
            room_id,
        }
    }
}

/// Parameters a client supplies when creating a room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    pub title: String,
    pub capacity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub title: String,
    pub capacity: u32,
    /// Insertion order is significant: it seeds the turn order shuffle.
    pub members: Vec<Member>,
    pub is_locked: bool,
    pub filter: Option<String>,
}

impl Room {
    pub fn new(room_id: RoomId, spec: RoomSpec) -> Self {
        Self {
            room_id,
            title: spec.title,
            capacity: spec.capacity,
            members: Vec::new(),
            is_locked: false,
            filter: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity as usize
    }

    pub fn has_member(&self, connection_id: ConnectionId) -> bool {
        self.members
            .iter()
            .any(|member| member.connection_id == connection_id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection_id).collect()
    }
}

/// Rejection reasons for a join request, checked in declaration order.
#[derive(Debug, Error, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("room does not exist")]
    RoomNotFound,
    #[error("room is locked")]
    RoomLocked,
    #[error("room is full")]
    RoomFull,
}

/// An event that is structurally valid but is missing required content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("room capacity must be at least 1")]
    ZeroCapacity,
    #[error("room capacity {0} exceeds {}", MAX_ROOM_CAPACITY)]
    CapacityTooLarge(u32),
    #[error("field `{field}` is longer than {max} bytes")]
    TooLong { field: &'static str, max: usize },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientEvent {
    CreateRoom {
        spec: RoomSpec,
    },
    JoinRoom {
        room_id: RoomId,
        user: User,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendingSignal {
        target: ConnectionId,
        payload: Vec<u8>,
    },
    ReturningSignal {
        target: ConnectionId,
        payload: Vec<u8>,
    },
    Chat {
        text: String,
    },
    SetLock {
        room_id: RoomId,
        locked: bool,
    },
    SetFilter {
        room_id: RoomId,
        filter: Option<String>,
    },
    RequestRoomList,
    StartGame {
        room_id: RoomId,
        title: String,
    },
    ProceedGame {
        room_id: RoomId,
        status: Vec<u8>,
    },
    TurnChange {
        room_id: RoomId,
    },
    ResetGame {
        room_id: RoomId,
    },
    Disconnect,
}

impl ClientEvent {
    /// Checks the fields the coordinator relies on before the event reaches
    /// any state. Length limits keep every event the server fans out well
    /// inside a client's frame limit.
    pub fn validate(&self) -> Result<(), MalformedEvent> {
        match self {
            ClientEvent::CreateRoom { spec } => {
                require(&spec.title, "title", MAX_TITLE_LEN)?;
                if spec.capacity == 0 {
                    return Err(MalformedEvent::ZeroCapacity);
                }
                if spec.capacity > MAX_ROOM_CAPACITY {
                    return Err(MalformedEvent::CapacityTooLarge(spec.capacity));
                }
                Ok(())
            }
            ClientEvent::JoinRoom { room_id, user } => {
                require(room_id, "room_id", MAX_NAME_LEN)?;
                require(&user.user_id, "user_id", MAX_NAME_LEN)?;
                limit(user.display_name.len(), "display_name", MAX_NAME_LEN)
            }
            ClientEvent::Chat { text } => require(text, "text", MAX_CHAT_LEN),
            ClientEvent::StartGame { room_id, title } => {
                require(room_id, "room_id", MAX_NAME_LEN)?;
                require(title, "title", MAX_TITLE_LEN)
            }
            ClientEvent::SetFilter { room_id, filter } => {
                require(room_id, "room_id", MAX_NAME_LEN)?;
                let len = filter.as_deref().map_or(0, str::len);
                limit(len, "filter", MAX_NAME_LEN)
            }
            ClientEvent::ProceedGame { room_id, status } => {
                require(room_id, "room_id", MAX_NAME_LEN)?;
                limit(status.len(), "status", MAX_PAYLOAD_LEN)
            }
            ClientEvent::LeaveRoom { room_id }
            | ClientEvent::SetLock { room_id, .. }
            | ClientEvent::TurnChange { room_id }
            | ClientEvent::ResetGame { room_id } => require(room_id, "room_id", MAX_NAME_LEN),
            ClientEvent::SendingSignal { payload, .. }
            | ClientEvent::ReturningSignal { payload, .. } => {
                limit(payload.len(), "payload", MAX_PAYLOAD_LEN)
            }
            ClientEvent::RequestRoomList | ClientEvent::Disconnect => Ok(()),
        }
    }
}

fn require(value: &str, field: &'static str, max: usize) -> Result<(), MalformedEvent> {
    if value.trim().is_empty() {
        return Err(MalformedEvent::MissingField(field));
    }
    limit(value.len(), field, max)
}

fn limit(len: usize, field: &'static str, max: usize) -> Result<(), MalformedEvent> {
    if len > max {
        Err(MalformedEvent::TooLong { field, max })
    } else {
        Ok(())
    }
}

/// Who a relayed signal came from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Peer {
    Member(Member),
    Connection(ConnectionId),
}

impl Peer {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Peer::Member(member) => member.connection_id,
            Peer::Connection(id) => *id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    Welcome {
        connection_id: ConnectionId,
    },
    RoomCreated {
        room_id: RoomId,
    },
    JoinAccepted {
        room: Room,
    },
    JoinRejected {
        error: JoinError,
    },
    RoomList {
        rooms: Vec<Room>,
    },
    MemberJoined {
        member: Member,
    },
    MemberLeft {
        connection_id: ConnectionId,
    },
    SignalOffer {
        initiator: Peer,
        payload: Vec<u8>,
    },
    SignalAnswer {
        returner: Peer,
        payload: Vec<u8>,
    },
    Chat {
        from: Member,
        text: String,
    },
    LockingStatus {
        locked: bool,
    },
    VideoFilter {
        filter: Option<String>,
    },
    InitGame {
        title: String,
        explosion_ms: u64,
        initial_turn: ConnectionId,
        turn_order: Vec<ConnectionId>,
        phrases: Vec<String>,
    },
    ProceedGame {
        status: Vec<u8>,
    },
    TurnChange {
        connection_id: ConnectionId,
    },
    ResetGame,
}
