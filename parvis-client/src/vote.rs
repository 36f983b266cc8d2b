use parvis_api::{UserId, VoteKind};

/// Tri-state vote flag pair and derived count for one comment or reply.
/// `upvoted` and `downvoted` are never true at the same time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VoteState {
    pub upvoted: bool,
    pub downvoted: bool,
    pub vote_count: i64,
}

impl VoteState {
    /// Recomputes the state from the server-held vote sets.
    pub fn from_sets(upvotes: &[UserId], downvotes: &[UserId], me: Option<&UserId>) -> VoteState {
        VoteState {
            upvoted: me.map_or(false, |me| upvotes.contains(me)),
            downvoted: me.map_or(false, |me| downvotes.contains(me)),
            vote_count: upvotes.len() as i64 - downvotes.len() as i64,
        }
    }

    /// Where one press of the `kind` button takes this state: pressing the
    /// flag already set clears it, pressing the opposite one switches sides
    /// and moves the count by two.
    pub fn toggled(self, kind: VoteKind) -> VoteState {
        match kind {
            VoteKind::Up if self.upvoted => VoteState {
                upvoted: false,
                downvoted: false,
                vote_count: self.vote_count - 1,
            },
            VoteKind::Up if self.downvoted => VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: self.vote_count + 2,
            },
            VoteKind::Up => VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: self.vote_count + 1,
            },
            VoteKind::Down if self.downvoted => VoteState {
                upvoted: false,
                downvoted: false,
                vote_count: self.vote_count + 1,
            },
            VoteKind::Down if self.upvoted => VoteState {
                upvoted: false,
                downvoted: true,
                vote_count: self.vote_count - 2,
            },
            VoteKind::Down => VoteState {
                upvoted: false,
                downvoted: true,
                vote_count: self.vote_count - 1,
            },
        }
    }
}

/// What became of a completion once handed back to its manager.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    Applied,
    /// A newer transition was committed while this one was in flight, the
    /// completion was discarded without touching anything.
    Stale,
}

/// Handle for an optimistic vote in flight: the exact state to restore on
/// rollback, and the sequence number that decides staleness.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PendingVote {
    pub(crate) snapshot: VoteState,
    pub(crate) seq: u64,
}

/// Vote state of one entity plus the bookkeeping needed to sort out
/// completions arriving out of order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VoteTracker {
    state: VoteState,
    latest: u64,
}

impl VoteTracker {
    pub fn new(state: VoteState) -> VoteTracker {
        VoteTracker { state, latest: 0 }
    }

    pub fn state(&self) -> VoteState {
        self.state
    }

    /// Applies the optimistic transition for one button press, synchronously,
    /// and returns the handle its completion will have to present.
    pub fn commit(&mut self, kind: VoteKind) -> PendingVote {
        let snapshot = self.state;
        self.state = self.state.toggled(kind);
        self.latest += 1;
        PendingVote {
            snapshot,
            seq: self.latest,
        }
    }

    /// Replaces the optimistic guess with what the server actually holds,
    /// unless a newer transition was committed since `pending`.
    pub fn reconcile(&mut self, pending: &PendingVote, authoritative: VoteState) -> Resolution {
        if pending.seq < self.latest {
            return Resolution::Stale;
        }
        self.state = authoritative;
        Resolution::Applied
    }

    /// Restores the exact pre-transition snapshot after a failed mutation,
    /// unless a newer transition was committed since `pending`.
    pub fn roll_back(&mut self, pending: &PendingVote) -> Resolution {
        if pending.seq < self.latest {
            return Resolution::Stale;
        }
        self.state = pending.snapshot;
        Resolution::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId(String::from(s))
    }

    fn state(upvoted: bool, downvoted: bool, vote_count: i64) -> VoteState {
        VoteState {
            upvoted,
            downvoted,
            vote_count,
        }
    }

    #[test]
    fn transition_table() {
        let neither = state(false, false, 5);
        let up = state(true, false, 5);
        let down = state(false, true, 5);

        assert_eq!(neither.toggled(VoteKind::Up), state(true, false, 6));
        assert_eq!(up.toggled(VoteKind::Up), state(false, false, 4));
        assert_eq!(down.toggled(VoteKind::Up), state(true, false, 7));
        assert_eq!(neither.toggled(VoteKind::Down), state(false, true, 4));
        assert_eq!(down.toggled(VoteKind::Down), state(false, false, 6));
        assert_eq!(up.toggled(VoteKind::Down), state(false, true, 3));
    }

    #[test]
    fn press_sequence_from_a_fresh_comment() {
        let mut s = VoteState::default();
        s = s.toggled(VoteKind::Up);
        assert_eq!(s, state(true, false, 1));
        s = s.toggled(VoteKind::Up);
        assert_eq!(s, state(false, false, 0));
        s = s.toggled(VoteKind::Down);
        assert_eq!(s, state(false, true, -1));
        s = s.toggled(VoteKind::Up);
        assert_eq!(s, state(true, false, 1));
    }

    #[test]
    fn from_sets_uses_membership_of_the_current_user() {
        let ups = vec![uid("u1"), uid("u2")];
        let downs = vec![uid("u3")];
        assert_eq!(
            VoteState::from_sets(&ups, &downs, Some(&uid("u1"))),
            state(true, false, 1)
        );
        assert_eq!(
            VoteState::from_sets(&ups, &downs, Some(&uid("u3"))),
            state(false, true, 1)
        );
        assert_eq!(
            VoteState::from_sets(&ups, &downs, None),
            state(false, false, 1)
        );
    }

    #[test]
    fn rollback_restores_the_snapshot_exactly() {
        let mut tracker = VoteTracker::new(state(false, true, -2));
        let before = tracker.state();
        let pending = tracker.commit(VoteKind::Up);
        assert_eq!(tracker.state(), state(true, false, 0));
        assert_eq!(tracker.roll_back(&pending), Resolution::Applied);
        assert_eq!(tracker.state(), before);
    }

    #[test]
    fn completions_of_superseded_transitions_are_discarded() {
        let mut tracker = VoteTracker::new(VoteState::default());
        let first = tracker.commit(VoteKind::Up);
        let second = tracker.commit(VoteKind::Down);
        // the response to the first press arrives after the second press
        assert_eq!(
            tracker.reconcile(&first, state(true, false, 1)),
            Resolution::Stale
        );
        assert_eq!(tracker.state(), state(false, true, -1));
        assert_eq!(tracker.roll_back(&first), Resolution::Stale);
        assert_eq!(
            tracker.reconcile(&second, state(false, true, -1)),
            Resolution::Applied
        );
        assert_eq!(tracker.state(), state(false, true, -1));
    }

    #[test]
    fn no_press_sequence_sets_both_flags() {
        bolero::check!()
            .with_type::<Vec<VoteKind>>()
            .for_each(|presses| {
                let mut s = VoteState::default();
                for kind in presses {
                    s = s.toggled(*kind);
                    assert!(!(s.upvoted && s.downvoted));
                    assert_eq!(s.vote_count, s.upvoted as i64 - s.downvoted as i64);
                }
            });
    }
}
