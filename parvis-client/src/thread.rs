use parvis_api::{CommentId, PostId, Time};

use crate::{
    author::AuthorSnapshot,
    comment::Comment,
    replies::ReplyLedger,
    vote::{VoteState, VoteTracker},
};

/// Everything one comment widget owns: the comment's display fields and vote
/// state, plus the reply list underneath it. All mutation goes through the
/// `votes` tracker and the `replies` ledger.
#[derive(Clone, Debug)]
pub struct CommentThread {
    pub post_id: PostId,
    pub id: CommentId,
    pub author: AuthorSnapshot,
    pub text: String,
    pub created_at: Option<Time>,
    pub votes: VoteTracker,
    pub replies: ReplyLedger,
}

impl CommentThread {
    /// Builds the widget state from a freshly mapped comment.
    pub fn new(post_id: PostId, comment: Comment) -> CommentThread {
        CommentThread {
            post_id,
            id: comment.id,
            author: comment.author,
            text: comment.text,
            created_at: comment.created_at,
            votes: VoteTracker::new(comment.votes),
            replies: ReplyLedger::new(comment.replies.unwrap_or_default()),
        }
    }

    pub fn vote_state(&self) -> VoteState {
        self.votes.state()
    }
}
