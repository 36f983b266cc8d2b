use parvis_api::{CommentId, ReplyId, Time};

use crate::{author::AuthorSnapshot, vote::VoteState};

/// A comment after normalization. Display code only ever sees this shape,
/// whatever the payload looked like.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub author: AuthorSnapshot,
    pub text: String,
    pub created_at: Option<Time>,
    pub votes: VoteState,
    /// `None` when the payload this was mapped from carried no replies array
    /// at all; reconciliation then leaves the local reply list alone.
    pub replies: Option<Vec<Reply>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    pub id: ReplyId,
    pub author: AuthorSnapshot,
    pub text: String,
    pub created_at: Option<Time>,
    pub votes: VoteState,
    /// Our own submission the server has not acknowledged yet.
    pub pending: bool,
}
