use async_trait::async_trait;

use crate::{AuthToken, CommentId, Error, PostData, PostId, ReplyId, VoteKind};

/// The part of the backend the comment widgets actually talk to.
///
/// Everything takes `&self` so that several calls can be in flight at the
/// same time through a single handle.
#[async_trait]
pub trait Remote {
    /// Fetches the whole post, comments included.
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error>;

    /// Toggles the current user's vote on a comment. The server treats a
    /// second identical vote as a removal.
    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error>;

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error>;

    /// Creates a reply under a comment. The created reply is not returned,
    /// the caller is expected to re-fetch the post to see it.
    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error>;
}
