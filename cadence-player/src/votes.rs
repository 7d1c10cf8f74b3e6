//! Vote ledger
//!
//! Generic threshold-voting primitive. Tallies are keyed by action kind plus
//! an optional sub-key (which queue position, which loop mode), so competing
//! proposals accumulate independently. The required threshold is recomputed
//! from the live listener count on every cast; listener counts drift between
//! calls and must never be cached.
//!
//! Privilege bypass is the caller's concern: a privileged principal never
//! reaches the ledger, because the required capability differs per action
//! (administrator vs. requester of the targeted item).

use cadence_common::{ActionKind, LoopMode, PrincipalId};
use std::collections::{HashMap, HashSet};

/// Narrows a vote to a specific target within an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKey {
    /// 1-based queue position (remove votes).
    Position(usize),
    /// Proposed loop mode (loop votes).
    Mode(LoopMode),
}

/// Outcome of casting a single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// This principal already voted for this exact key; tally unchanged.
    AlreadyVoted { count: usize, required: usize },
    /// Vote recorded, threshold not yet reached.
    Accepted { count: usize, required: usize },
    /// Threshold reached; the tally for this key has been reset and the
    /// caller must now apply the guarded action.
    Passed { count: usize, required: usize },
}

/// Pluggable vote-threshold formula, fed the eligible listener count.
pub type ThresholdFn = fn(usize) -> usize;

/// Default threshold: strict majority. One listener (or none, during a
/// listener-count race) still requires one vote.
pub fn simple_majority(listeners: usize) -> usize {
    listeners / 2 + 1
}

/// Per-tenant vote tallies. Ephemeral, in-memory only.
#[derive(Debug, Default)]
pub struct VoteLedger {
    ballots: HashMap<(ActionKind, Option<SubKey>), HashSet<PrincipalId>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast a vote. `listeners` is the current non-bot member count of the
    /// session's voice channel, sampled by the caller at call time.
    pub fn cast(
        &mut self,
        action: ActionKind,
        sub_key: Option<SubKey>,
        principal: PrincipalId,
        listeners: usize,
        threshold: ThresholdFn,
    ) -> VoteOutcome {
        let required = threshold(listeners);
        let voters = self.ballots.entry((action, sub_key)).or_default();

        if voters.contains(&principal) {
            return VoteOutcome::AlreadyVoted {
                count: voters.len(),
                required,
            };
        }

        voters.insert(principal);
        let count = voters.len();

        if count >= required {
            self.ballots.remove(&(action, sub_key));
            VoteOutcome::Passed { count, required }
        } else {
            VoteOutcome::Accepted { count, required }
        }
    }

    /// Drop every tally for an action, across all sub-keys.
    ///
    /// Used when the guarded resource changes identity underneath the tally:
    /// a successful remove shifts queue positions, a passed loop vote
    /// supersedes the competing modes.
    pub fn clear_action(&mut self, action: ActionKind) {
        self.ballots.retain(|(kind, _), _| *kind != action);
    }

    /// Drop the tallies that are scoped to the current track. Called when a
    /// new track starts: skip/pause/stop votes against the old track no
    /// longer apply.
    pub fn reset_track_votes(&mut self) {
        for action in [ActionKind::Skip, ActionKind::Pause, ActionKind::Stop] {
            self.clear_action(action);
        }
    }

    /// Drop everything. Used on stop/disconnect teardown.
    pub fn clear(&mut self) {
        self.ballots.clear();
    }

    #[cfg(test)]
    fn count(&self, action: ActionKind, sub_key: Option<SubKey>) -> usize {
        self.ballots
            .get(&(action, sub_key))
            .map_or(0, |voters| voters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(n: u64) -> PrincipalId {
        PrincipalId::new(n)
    }

    #[test]
    fn majority_threshold() {
        assert_eq!(simple_majority(0), 1);
        assert_eq!(simple_majority(1), 1);
        assert_eq!(simple_majority(2), 2);
        assert_eq!(simple_majority(3), 2);
        assert_eq!(simple_majority(5), 3);
        assert_eq!(simple_majority(10), 6);
    }

    #[test]
    fn duplicate_vote_does_not_increment() {
        let mut ledger = VoteLedger::new();

        let first = ledger.cast(ActionKind::Skip, None, principal(1), 5, simple_majority);
        assert_eq!(first, VoteOutcome::Accepted { count: 1, required: 3 });

        let second = ledger.cast(ActionKind::Skip, None, principal(1), 5, simple_majority);
        assert_eq!(second, VoteOutcome::AlreadyVoted { count: 1, required: 3 });
        assert_eq!(ledger.count(ActionKind::Skip, None), 1);
    }

    #[test]
    fn passing_resets_only_that_key() {
        let mut ledger = VoteLedger::new();
        ledger.cast(ActionKind::Stop, None, principal(9), 5, simple_majority);

        ledger.cast(ActionKind::Skip, None, principal(1), 5, simple_majority);
        ledger.cast(ActionKind::Skip, None, principal(2), 5, simple_majority);
        let third = ledger.cast(ActionKind::Skip, None, principal(3), 5, simple_majority);
        assert_eq!(third, VoteOutcome::Passed { count: 3, required: 3 });

        // Skip tally reset; stop tally untouched.
        assert_eq!(ledger.count(ActionKind::Skip, None), 0);
        assert_eq!(ledger.count(ActionKind::Stop, None), 1);
    }

    #[test]
    fn threshold_recomputed_per_cast() {
        let mut ledger = VoteLedger::new();

        // 5 listeners at first cast.
        let first = ledger.cast(ActionKind::Clear, None, principal(1), 5, simple_majority);
        assert_eq!(first, VoteOutcome::Accepted { count: 1, required: 3 });

        // Three listeners left; 2 remain, so the second vote passes.
        let second = ledger.cast(ActionKind::Clear, None, principal(2), 2, simple_majority);
        assert_eq!(second, VoteOutcome::Passed { count: 2, required: 2 });
    }

    #[test]
    fn single_listener_passes_immediately() {
        let mut ledger = VoteLedger::new();
        let outcome = ledger.cast(ActionKind::Disconnect, None, principal(1), 1, simple_majority);
        assert_eq!(outcome, VoteOutcome::Passed { count: 1, required: 1 });
    }

    #[test]
    fn sub_keys_tally_independently() {
        let mut ledger = VoteLedger::new();
        let song = Some(SubKey::Mode(LoopMode::Song));
        let queue = Some(SubKey::Mode(LoopMode::Queue));

        ledger.cast(ActionKind::Loop, song, principal(1), 5, simple_majority);
        ledger.cast(ActionKind::Loop, queue, principal(2), 5, simple_majority);

        assert_eq!(ledger.count(ActionKind::Loop, song), 1);
        assert_eq!(ledger.count(ActionKind::Loop, queue), 1);

        // The same principal may vote for a different mode.
        let outcome = ledger.cast(ActionKind::Loop, queue, principal(1), 5, simple_majority);
        assert_eq!(outcome, VoteOutcome::Accepted { count: 2, required: 3 });
    }

    #[test]
    fn clear_action_drops_all_sub_keys() {
        let mut ledger = VoteLedger::new();
        ledger.cast(
            ActionKind::Remove,
            Some(SubKey::Position(1)),
            principal(1),
            5,
            simple_majority,
        );
        ledger.cast(
            ActionKind::Remove,
            Some(SubKey::Position(4)),
            principal(2),
            5,
            simple_majority,
        );
        ledger.cast(ActionKind::Skip, None, principal(3), 5, simple_majority);

        ledger.clear_action(ActionKind::Remove);
        assert_eq!(ledger.count(ActionKind::Remove, Some(SubKey::Position(1))), 0);
        assert_eq!(ledger.count(ActionKind::Remove, Some(SubKey::Position(4))), 0);
        assert_eq!(ledger.count(ActionKind::Skip, None), 1);
    }

    #[test]
    fn reset_track_votes_spares_queue_scoped_tallies() {
        let mut ledger = VoteLedger::new();
        ledger.cast(ActionKind::Skip, None, principal(1), 5, simple_majority);
        ledger.cast(ActionKind::Pause, None, principal(2), 5, simple_majority);
        ledger.cast(ActionKind::Stop, None, principal(3), 5, simple_majority);
        ledger.cast(ActionKind::Shuffle, None, principal(4), 5, simple_majority);

        ledger.reset_track_votes();
        assert_eq!(ledger.count(ActionKind::Skip, None), 0);
        assert_eq!(ledger.count(ActionKind::Pause, None), 0);
        assert_eq!(ledger.count(ActionKind::Stop, None), 0);
        assert_eq!(ledger.count(ActionKind::Shuffle, None), 1);
    }
}
