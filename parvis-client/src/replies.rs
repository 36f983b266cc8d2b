use std::collections::HashMap;

use parvis_api::{ReplyId, VoteKind};

use crate::{
    author::AuthorSnapshot,
    comment::Reply,
    vote::{Resolution, VoteState},
};

/// Handle for a reply submission in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingReply {
    pub(crate) id: ReplyId,
    pub(crate) seq: u64,
}

impl PendingReply {
    /// The placeholder's temporary id.
    pub fn id(&self) -> &ReplyId {
        &self.id
    }
}

/// Handle for a reply vote in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingReplyVote {
    pub(crate) reply: ReplyId,
    pub(crate) snapshot: VoteState,
    pub(crate) seq: u64,
}

impl PendingReplyVote {
    pub fn reply(&self) -> &ReplyId {
        &self.reply
    }
}

/// The ordered reply list of one comment, plus the draft being typed, the
/// expansion flag of the replies section, and the bookkeeping that keeps
/// out-of-order completions from clobbering newer state.
#[derive(Clone, Debug, Default)]
pub struct ReplyLedger {
    replies: Vec<Reply>,
    draft: String,
    expanded: bool,
    /// Bumped by every submission. Adopting an authoritative list on behalf
    /// of a submission is skipped when a newer one was committed meanwhile.
    list_seq: u64,
    /// Per-reply transition counters. Deliberately kept out of `Reply`: they
    /// must survive wholesale list replacement for the staleness check to
    /// stay monotonic per entity.
    vote_seqs: HashMap<ReplyId, u64>,
}

impl ReplyLedger {
    pub fn new(replies: Vec<Reply>) -> ReplyLedger {
        ReplyLedger {
            replies,
            draft: String::new(),
            expanded: false,
            list_seq: 0,
            vote_seqs: HashMap::new(),
        }
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn reply(&self, id: &ReplyId) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == *id)
    }

    /// Count of entries still waiting for their server acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.replies.iter().filter(|r| r.pending).count()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: String) {
        self.draft = draft;
    }

    /// Whether the replies section is unfolded. Submitting unfolds it so the
    /// new entry is actually visible.
    pub fn expanded(&self) -> bool {
        self.expanded
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    /// Appends the placeholder for a submission, consumes the draft and
    /// unfolds the section. `text` must already be trimmed and non-empty,
    /// the dispatcher checks that before asking for a placeholder.
    pub fn begin_reply(&mut self, text: String, author: AuthorSnapshot) -> PendingReply {
        let id = ReplyId::temp();
        self.replies.push(Reply {
            id: id.clone(),
            author,
            text,
            created_at: None,
            votes: VoteState::default(),
            pending: true,
        });
        self.draft.clear();
        self.expanded = true;
        self.list_seq += 1;
        PendingReply {
            id,
            seq: self.list_seq,
        }
    }

    /// Removes the placeholder of a failed submission. Keyed by the unique
    /// temporary id, so it cannot touch anything a newer action added.
    pub fn abort_reply(&mut self, pending: &PendingReply) {
        self.replies.retain(|r| r.id != pending.id);
        self.vote_seqs.remove(&pending.id);
    }

    /// Adopts the authoritative list fetched after a submission, unless a
    /// newer submission was committed while this one was in flight.
    pub fn reconcile_submission(
        &mut self,
        pending: &PendingReply,
        replies: Vec<Reply>,
    ) -> Resolution {
        if pending.seq < self.list_seq {
            return Resolution::Stale;
        }
        self.adopt(replies);
        Resolution::Applied
    }

    /// Adopts an authoritative list that arrived through some other path,
    /// typically riding along a comment-vote reconciliation.
    pub fn adopt(&mut self, replies: Vec<Reply>) {
        // placeholders never survive a wholesale replacement, their counters
        // are garbage from this point on
        self.vote_seqs.retain(|id, _| !id.is_temp());
        self.replies = replies;
    }

    /// Applies the optimistic transition for a vote on one reply. `None`
    /// when the reply is not in the list anymore, in which case nothing
    /// changed and nothing should be sent.
    pub fn commit_vote(&mut self, reply: &ReplyId, kind: VoteKind) -> Option<PendingReplyVote> {
        let entry = self.replies.iter_mut().find(|r| r.id == *reply)?;
        let snapshot = entry.votes;
        entry.votes = entry.votes.toggled(kind);
        let seq = self.vote_seqs.entry(reply.clone()).or_insert(0);
        *seq += 1;
        Some(PendingReplyVote {
            reply: reply.clone(),
            snapshot,
            seq: *seq,
        })
    }

    /// Replaces the voted reply with its authoritative version, leaving its
    /// siblings alone. The reply having disappeared from the list meanwhile
    /// is not an error, the replacement is just skipped.
    pub fn reconcile_vote(
        &mut self,
        pending: &PendingReplyVote,
        authoritative: Reply,
    ) -> Resolution {
        if self.vote_is_stale(pending) {
            return Resolution::Stale;
        }
        if let Some(entry) = self.replies.iter_mut().find(|r| r.id == pending.reply) {
            *entry = authoritative;
        }
        Resolution::Applied
    }

    /// Restores the voted reply's pre-transition vote state after a failed
    /// mutation, leaving its siblings alone.
    pub fn roll_back_vote(&mut self, pending: &PendingReplyVote) -> Resolution {
        if self.vote_is_stale(pending) {
            return Resolution::Stale;
        }
        if let Some(entry) = self.replies.iter_mut().find(|r| r.id == pending.reply) {
            entry.votes = pending.snapshot;
        }
        Resolution::Applied
    }

    fn vote_is_stale(&self, pending: &PendingReplyVote) -> bool {
        pending.seq < self.vote_seqs.get(&pending.reply).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, text: &str) -> Reply {
        Reply {
            id: ReplyId(String::from(id)),
            author: AuthorSnapshot::anonymous(),
            text: String::from(text),
            created_at: None,
            votes: VoteState::default(),
            pending: false,
        }
    }

    fn rid(id: &str) -> ReplyId {
        ReplyId(String::from(id))
    }

    #[test]
    fn placeholder_is_appended_then_replaced_by_the_authoritative_list() {
        let mut ledger = ReplyLedger::new(vec![reply("r_1", "first")]);
        ledger.set_draft(String::from("  hello  "));
        let pending = ledger.begin_reply(String::from("hello"), AuthorSnapshot::anonymous());
        assert_eq!(ledger.draft(), "");
        assert!(ledger.expanded());
        assert_eq!(ledger.replies().len(), 2);
        assert!(ledger.replies()[1].pending);
        assert!(ledger.replies()[1].id.is_temp());
        assert_eq!(ledger.pending_count(), 1);

        let fresh = vec![reply("r_1", "first"), reply("r_2", "hello")];
        assert_eq!(
            ledger.reconcile_submission(&pending, fresh),
            Resolution::Applied
        );
        assert_eq!(ledger.pending_count(), 0);
        assert!(ledger.replies().iter().all(|r| !r.id.is_temp()));
        assert_eq!(ledger.replies()[1].text, "hello");
    }

    #[test]
    fn aborting_a_submission_only_removes_its_own_placeholder() {
        let mut ledger = ReplyLedger::new(vec![]);
        let first = ledger.begin_reply(String::from("one"), AuthorSnapshot::anonymous());
        let second = ledger.begin_reply(String::from("two"), AuthorSnapshot::anonymous());
        ledger.abort_reply(&first);
        assert_eq!(ledger.replies().len(), 1);
        assert_eq!(ledger.replies()[0].text, "two");
        ledger.abort_reply(&second);
        assert!(ledger.replies().is_empty());
    }

    #[test]
    fn adoption_from_a_superseded_submission_is_discarded() {
        let mut ledger = ReplyLedger::new(vec![]);
        let first = ledger.begin_reply(String::from("one"), AuthorSnapshot::anonymous());
        let _second = ledger.begin_reply(String::from("two"), AuthorSnapshot::anonymous());
        // the server answered the first submission before the second
        assert_eq!(
            ledger.reconcile_submission(&first, vec![reply("r_1", "one")]),
            Resolution::Stale
        );
        assert_eq!(ledger.replies().len(), 2);
        assert_eq!(ledger.pending_count(), 2);
    }

    #[test]
    fn reply_votes_are_rolled_back_per_entity() {
        let mut ledger = ReplyLedger::new(vec![reply("r_1", "one"), reply("r_2", "two")]);
        let up_r2 = ledger.commit_vote(&rid("r_2"), VoteKind::Up).unwrap();
        let down_r1 = ledger.commit_vote(&rid("r_1"), VoteKind::Down).unwrap();
        assert_eq!(ledger.reply(&rid("r_2")).unwrap().votes.vote_count, 1);
        assert_eq!(ledger.roll_back_vote(&up_r2), Resolution::Applied);
        // r_2 is restored, r_1 stays optimistic
        assert_eq!(ledger.reply(&rid("r_2")).unwrap().votes, VoteState::default());
        assert_eq!(ledger.reply(&rid("r_1")).unwrap().votes.vote_count, -1);
        assert_eq!(ledger.roll_back_vote(&down_r1), Resolution::Applied);
        assert_eq!(ledger.reply(&rid("r_1")).unwrap().votes, VoteState::default());
    }

    #[test]
    fn vote_on_a_reply_that_is_gone_is_a_no_op() {
        let mut ledger = ReplyLedger::new(vec![]);
        assert!(ledger.commit_vote(&rid("r_404"), VoteKind::Up).is_none());
    }

    #[test]
    fn reply_vote_staleness_survives_list_replacement() {
        let mut ledger = ReplyLedger::new(vec![reply("r_1", "one")]);
        let first = ledger.commit_vote(&rid("r_1"), VoteKind::Up).unwrap();
        // a comment-vote reconciliation swaps the list while the vote is in
        // flight, then the user presses again
        ledger.adopt(vec![reply("r_1", "one")]);
        let second = ledger.commit_vote(&rid("r_1"), VoteKind::Up).unwrap();
        assert_eq!(ledger.roll_back_vote(&first), Resolution::Stale);
        assert_eq!(
            ledger.reconcile_vote(&second, reply("r_1", "one")),
            Resolution::Applied
        );
    }
}
