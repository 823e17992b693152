//! Line commands for the terminal client
//!
//! Lines starting with `/` are commands, anything else is chat. Commands that
//! act on a room use the room the session last joined.

use shared::{ClientEvent, ConnectionId, RoomId, RoomSpec, ServerEvent, User};
use thiserror::Error;

pub const HELP: &str = "\
/create <capacity> <title>   create a room
/join <room id>              join a room
/leave                       leave the current room
/list                        request the room list
/lock, /unlock               lock or unlock the current room
/filter <name>, /nofilter    set or clear the video filter
/start <title>               start a game
/proceed <status>            send game progress
/turn                        pass the turn on
/reset                       reset the game
/offer <connection> <data>   send a signaling offer
/answer <connection> <data>  answer a signaling offer
/quit                        disconnect
<text>                       chat";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("join a room first")]
    NotInRoom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(ClientEvent),
    Help,
    Quit,
    Nothing,
}

/// What the client knows about itself between events.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub connection_id: ConnectionId,
    pub room_id: Option<RoomId>,
}

impl Session {
    pub fn new(user: User, connection_id: ConnectionId) -> Self {
        Session {
            user,
            connection_id,
            room_id: None,
        }
    }

    /// Tracks room membership from server acknowledgements. A rejected join
    /// leaves the client in no room, since the server has already taken it
    /// out of any previous one.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::JoinAccepted { room } => self.room_id = Some(room.room_id.clone()),
            ServerEvent::JoinRejected { .. } => self.room_id = None,
            _ => {}
        }
    }

    /// Leaving is not acknowledged, so membership is dropped on send.
    pub fn sent(&mut self, event: &ClientEvent) {
        if let ClientEvent::LeaveRoom { .. } = event {
            self.room_id = None;
        }
    }

    fn current_room(&self) -> Result<RoomId, CommandError> {
        self.room_id.clone().ok_or(CommandError::NotInRoom)
    }

    pub fn parse(&self, line: &str) -> Result<Action, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Action::Nothing);
        }

        let Some(command) = line.strip_prefix('/') else {
            return Ok(Action::Send(ClientEvent::Chat {
                text: line.to_string(),
            }));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        let event = match name {
            "help" => return Ok(Action::Help),
            "quit" => return Ok(Action::Quit),
            "list" => ClientEvent::RequestRoomList,
            "create" => {
                const USAGE: &str = "/create <capacity> <title>";
                let (capacity, title) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage(USAGE))?;
                let capacity = capacity
                    .parse::<u32>()
                    .map_err(|_| CommandError::Usage(USAGE))?;
                ClientEvent::CreateRoom {
                    spec: RoomSpec {
                        title: title.trim().to_string(),
                        capacity,
                    },
                }
            }
            "join" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("/join <room id>"));
                }
                ClientEvent::JoinRoom {
                    room_id: rest.to_string(),
                    user: self.user.clone(),
                }
            }
            "leave" => ClientEvent::LeaveRoom {
                room_id: self.current_room()?,
            },
            "lock" | "unlock" => ClientEvent::SetLock {
                room_id: self.current_room()?,
                locked: name == "lock",
            },
            "filter" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("/filter <name>"));
                }
                ClientEvent::SetFilter {
                    room_id: self.current_room()?,
                    filter: Some(rest.to_string()),
                }
            }
            "nofilter" => ClientEvent::SetFilter {
                room_id: self.current_room()?,
                filter: None,
            },
            "start" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("/start <title>"));
                }
                ClientEvent::StartGame {
                    room_id: self.current_room()?,
                    title: rest.to_string(),
                }
            }
            "proceed" => ClientEvent::ProceedGame {
                room_id: self.current_room()?,
                status: rest.as_bytes().to_vec(),
            },
            "turn" => ClientEvent::TurnChange {
                room_id: self.current_room()?,
            },
            "reset" => ClientEvent::ResetGame {
                room_id: self.current_room()?,
            },
            "offer" | "answer" => {
                let usage = if name == "offer" {
                    "/offer <connection> <data>"
                } else {
                    "/answer <connection> <data>"
                };
                let (target, payload) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage(usage))?;
                let target = target
                    .parse::<ConnectionId>()
                    .map_err(|_| CommandError::Usage(usage))?;
                let payload = payload.trim().as_bytes().to_vec();
                if name == "offer" {
                    ClientEvent::SendingSignal { target, payload }
                } else {
                    ClientEvent::ReturningSignal { target, payload }
                }
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Action::Send(event))
    }
}

/// One line of output for an incoming event.
pub fn describe(event: &ServerEvent, session: &Session) -> String {
    match event {
        ServerEvent::Welcome { connection_id } => format!("* connected as {}", connection_id),
        ServerEvent::RoomCreated { room_id } => format!("* created room {}", room_id),
        ServerEvent::JoinAccepted { room } => format!(
            "* joined {:?} ({}/{}): {}",
            room.title,
            room.members.len(),
            room.capacity,
            room.members
                .iter()
                .map(|m| format!("{}#{}", m.display_name, m.connection_id))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ServerEvent::JoinRejected { error } => format!("! join failed: {}", error),
        ServerEvent::RoomList { rooms } => {
            let mut lines = vec![format!("* {} room(s)", rooms.len())];
            for room in rooms {
                lines.push(format!(
                    "  {} {:?} {}/{}{}",
                    room.room_id,
                    room.title,
                    room.members.len(),
                    room.capacity,
                    if room.is_locked { " locked" } else { "" }
                ));
            }
            lines.join("\n")
        }
        ServerEvent::MemberJoined { member } => format!(
            "* {}#{} joined",
            member.display_name, member.connection_id
        ),
        ServerEvent::MemberLeft { connection_id } => format!("* #{} left", connection_id),
        ServerEvent::SignalOffer { initiator, payload } => format!(
            "* offer from #{}: {}",
            initiator.connection_id(),
            String::from_utf8_lossy(payload)
        ),
        ServerEvent::SignalAnswer { returner, payload } => format!(
            "* answer from #{}: {}",
            returner.connection_id(),
            String::from_utf8_lossy(payload)
        ),
        ServerEvent::Chat { from, text } => format!("<{}> {}", from.display_name, text),
        ServerEvent::LockingStatus { locked } => {
            format!("* room {}", if *locked { "locked" } else { "unlocked" })
        }
        ServerEvent::VideoFilter { filter } => match filter {
            Some(name) => format!("* filter set to {}", name),
            None => "* filter cleared".to_string(),
        },
        ServerEvent::InitGame {
            title,
            explosion_ms,
            initial_turn,
            turn_order,
            phrases,
        } => format!(
            "* game {:?} started, order {:?}, first #{}, {}s on the clock, first phrase: {}",
            title,
            turn_order,
            initial_turn,
            explosion_ms / 1000,
            phrases.first().map(String::as_str).unwrap_or("-")
        ),
        ServerEvent::ProceedGame { status } => {
            format!("* progress: {}", String::from_utf8_lossy(status))
        }
        ServerEvent::TurnChange { connection_id } if *connection_id == session.connection_id => {
            "* your turn".to_string()
        }
        ServerEvent::TurnChange { connection_id } => format!("* turn passes to #{}", connection_id),
        ServerEvent::ResetGame => "* game reset".to_string(),
    }
}
