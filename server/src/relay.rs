//! Peer-connection signaling relay
//!
//! Offers and answers are forwarded byte-for-byte to the named connection.
//! Nothing here looks inside the payload.

use crate::broadcast::Broadcaster;
use shared::{ConnectionId, Peer, ServerEvent};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("signal target {0} is not connected")]
    UnknownTarget(ConnectionId),
}

pub fn relay_offer(
    broadcaster: &Broadcaster,
    initiator: Peer,
    target: ConnectionId,
    payload: Vec<u8>,
) -> Result<(), RelayError> {
    deliver(
        broadcaster,
        target,
        ServerEvent::SignalOffer { initiator, payload },
    )
}

pub fn relay_answer(
    broadcaster: &Broadcaster,
    returner: Peer,
    target: ConnectionId,
    payload: Vec<u8>,
) -> Result<(), RelayError> {
    deliver(
        broadcaster,
        target,
        ServerEvent::SignalAnswer { returner, payload },
    )
}

fn deliver(
    broadcaster: &Broadcaster,
    target: ConnectionId,
    event: ServerEvent,
) -> Result<(), RelayError> {
    if broadcaster.send_to(target, event) {
        Ok(())
    } else {
        Err(RelayError::UnknownTarget(target))
    }
}
