//! Turn engine for the elimination game
//!
//! Each room is either idle or running a round. Starting a round shuffles
//! the room's current members into a turn order; advancing walks that order
//! circularly, skipping anyone who has since left the room. The order is a
//! derived copy and is never edited when members leave, so stale entries are
//! expected and handled at lookup time. The engine also remembers who holds
//! the turn, so a holder who leaves can have the turn passed on for them.

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ConnectionId, Room, RoomId, PHRASES};
use std::collections::HashMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    Running,
}

/// Everything clients need to begin a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInit {
    pub title: String,
    pub explosion_ms: u64,
    pub turn_order: Vec<ConnectionId>,
    pub phrases: Vec<String>,
}

impl GameInit {
    pub fn initial_turn(&self) -> Option<ConnectionId> {
        self.turn_order.first().copied()
    }
}

#[derive(Debug)]
struct Round {
    order: Vec<ConnectionId>,
    holder: ConnectionId,
}

#[derive(Debug)]
pub struct TurnEngine {
    rounds: HashMap<RoomId, Round>,
    min_players: usize,
    explosion_secs: RangeInclusive<u64>,
}

impl TurnEngine {
    pub fn new(min_players: usize, explosion_secs: RangeInclusive<u64>) -> Self {
        Self {
            rounds: HashMap::new(),
            min_players,
            explosion_secs,
        }
    }

    pub fn phase(&self, room_id: &str) -> GamePhase {
        if self.rounds.contains_key(room_id) {
            GamePhase::Running
        } else {
            GamePhase::Idle
        }
    }

    pub fn turn_order(&self, room_id: &str) -> Option<&[ConnectionId]> {
        self.rounds.get(room_id).map(|round| round.order.as_slice())
    }

    /// Who currently holds the turn in a running round.
    pub fn holder(&self, room_id: &str) -> Option<ConnectionId> {
        self.rounds.get(room_id).map(|round| round.holder)
    }

    /// Shuffles the room's members into a new turn order and moves the room
    /// to `Running`. Rooms below the player minimum are left alone and
    /// `None` is returned; a stale start request is not an error.
    pub fn start_game<R: Rng>(
        &mut self,
        room: &Room,
        title: &str,
        rng: &mut R,
    ) -> Option<GameInit> {
        if room.members.len() < self.min_players {
            debug!(
                "Ignoring start in room {} with {} members",
                room.room_id,
                room.members.len()
            );
            return None;
        }

        let mut turn_order = room.connection_ids();
        turn_order.shuffle(rng);

        let explosion_ms = rng
            .gen_range(self.explosion_secs.clone())
            .saturating_mul(1000);
        info!(
            "Game {:?} started in room {} with {} players, explodes in {}ms",
            title,
            room.room_id,
            turn_order.len(),
            explosion_ms
        );

        let holder = *turn_order.first()?;
        self.rounds.insert(
            room.room_id.clone(),
            Round {
                order: turn_order.clone(),
                holder,
            },
        );

        Some(GameInit {
            title: title.to_string(),
            explosion_ms,
            turn_order,
            phrases: PHRASES.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Finds the next turn holder after `current` who is still in `room` and
    /// records them as the holder.
    ///
    /// If `current` is not in the order the scan starts from the front.
    /// Returns `None` when the room is idle or nobody in the order remains.
    pub fn advance_turn(&mut self, room: &Room, current: ConnectionId) -> Option<ConnectionId> {
        let round = self.rounds.get_mut(&room.room_id)?;
        let next = next_live(&round.order, current, |id| room.has_member(id));

        match next {
            Some(id) => {
                debug!("Turn in room {} passes from {} to {}", room.room_id, current, id);
                round.holder = id;
            }
            None => debug!("No live turn holder left in room {}", room.room_id),
        }
        next
    }

    /// Discards the turn order. Returns whether a round was running.
    pub fn reset_game(&mut self, room_id: &str) -> bool {
        self.rounds.remove(room_id).is_some()
    }
}

/// Circular scan starting just after `current`, visiting every slot once.
fn next_live<F>(order: &[ConnectionId], current: ConnectionId, is_live: F) -> Option<ConnectionId>
where
    F: Fn(ConnectionId) -> bool,
{
    let len = order.len();
    let start = order
        .iter()
        .position(|&id| id == current)
        .map_or(0, |index| index + 1);

    (0..len)
        .map(|offset| order[(start + offset) % len])
        .find(|&id| is_live(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{Member, RoomSpec, User};
    use std::collections::HashSet;

    fn room_with(connection_ids: &[ConnectionId]) -> Room {
        let mut room = Room::new(
            "room".to_string(),
            RoomSpec {
                title: "game night".to_string(),
                capacity: 8,
            },
        );
        for &id in connection_ids {
            room.members.push(Member::new(
                User::new(format!("user-{}", id), "player"),
                id,
                "room".to_string(),
            ));
        }
        room
    }

    fn engine() -> TurnEngine {
        TurnEngine::new(2, 30..=60)
    }

    #[test]
    fn test_start_requires_two_members() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(1);

        let room = room_with(&[1]);
        assert!(engine.start_game(&room, "elimination", &mut rng).is_none());
        assert_eq!(engine.phase("room"), GamePhase::Idle);
    }

    #[test]
    fn test_start_produces_permutation() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(7);
        let room = room_with(&[1, 2, 3, 4]);

        let init = engine.start_game(&room, "elimination", &mut rng).unwrap();

        let mut sorted = init.turn_order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4]);
        assert_eq!(init.initial_turn(), init.turn_order.first().copied());
        assert!((30_000..=60_000).contains(&init.explosion_ms));
        assert_eq!(init.explosion_ms % 1000, 0);
        assert_eq!(init.phrases.len(), PHRASES.len());
        assert_eq!(engine.phase("room"), GamePhase::Running);
        assert_eq!(engine.turn_order("room"), Some(init.turn_order.as_slice()));
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(3);
        let room = room_with(&[1, 2, 3]);
        let init = engine.start_game(&room, "elimination", &mut rng).unwrap();
        let order = init.turn_order;

        assert_eq!(engine.advance_turn(&room, order[0]), Some(order[1]));
        assert_eq!(engine.advance_turn(&room, order[1]), Some(order[2]));
        assert_eq!(engine.advance_turn(&room, order[2]), Some(order[0]));
    }

    #[test]
    fn test_advance_skips_departed_member() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(11);
        let room = room_with(&[1, 2]);
        engine.start_game(&room, "elimination", &mut rng).unwrap();

        // Member 1 leaves after the order was generated
        let shrunk = room_with(&[2]);
        assert_eq!(engine.advance_turn(&shrunk, 1), Some(2));
        assert_eq!(engine.advance_turn(&shrunk, 2), Some(2));
    }

    #[test]
    fn test_advance_with_nobody_left_is_noop() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(5);
        let room = room_with(&[1, 2]);
        engine.start_game(&room, "elimination", &mut rng).unwrap();

        let newcomers = room_with(&[9]);
        assert_eq!(engine.advance_turn(&newcomers, 1), None);
    }

    #[test]
    fn test_advance_when_idle_is_noop() {
        let mut engine = engine();
        let room = room_with(&[1, 2]);
        assert_eq!(engine.advance_turn(&room, 1), None);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(2);
        let room = room_with(&[1, 2]);
        engine.start_game(&room, "elimination", &mut rng).unwrap();

        assert!(engine.reset_game("room"));
        assert_eq!(engine.phase("room"), GamePhase::Idle);
        assert!(!engine.reset_game("room"));
        assert!(engine.advance_turn(&room, 1).is_none());
    }

    #[test]
    fn test_holder_follows_the_turn() {
        let mut engine = engine();
        let mut rng = StdRng::seed_from_u64(13);
        let room = room_with(&[1, 2, 3]);
        let init = engine.start_game(&room, "elimination", &mut rng).unwrap();
        let order = init.turn_order.clone();

        assert_eq!(engine.holder("room"), init.initial_turn());
        engine.advance_turn(&room, order[0]);
        assert_eq!(engine.holder("room"), Some(order[1]));

        engine.reset_game("room");
        assert_eq!(engine.holder("room"), None);
    }

    #[test]
    fn test_huge_explosion_range_saturates() {
        let mut engine = TurnEngine::new(2, u64::MAX..=u64::MAX);
        let mut rng = StdRng::seed_from_u64(4);
        let init = engine
            .start_game(&room_with(&[1, 2]), "elimination", &mut rng)
            .unwrap();
        assert_eq!(init.explosion_ms, u64::MAX);
    }

    #[test]
    fn test_next_live_unknown_current_starts_at_front() {
        let order = [4, 5, 6];
        assert_eq!(next_live(&order, 99, |_| true), Some(4));
        assert_eq!(next_live(&order, 99, |id| id == 6), Some(6));
        assert_eq!(next_live(&[], 1, |_| true), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: for any non-empty set of remaining members the scan
        /// terminates on one of them
        #[test]
        fn prop_advance_returns_live_member(
            seed in any::<u64>(),
            size in 2usize..10,
            keep_mask in any::<u16>(),
            current_index in 0usize..10
        ) {
            let ids: Vec<ConnectionId> = (1..=size as u32).collect();
            let kept: Vec<ConnectionId> = ids
                .iter()
                .copied()
                .filter(|id| keep_mask & (1 << id) != 0)
                .collect();
            prop_assume!(!kept.is_empty());

            let mut engine = engine();
            let mut rng = StdRng::seed_from_u64(seed);
            engine.start_game(&room_with(&ids), "elimination", &mut rng).unwrap();

            let current = ids[current_index % ids.len()];
            let remaining = room_with(&kept);
            let next = engine.advance_turn(&remaining, current).unwrap();

            let live: HashSet<ConnectionId> = kept.into_iter().collect();
            prop_assert!(live.contains(&next));
        }
    }
}
