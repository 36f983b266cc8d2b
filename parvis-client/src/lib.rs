mod author;
pub use author::{AuthorSnapshot, FALLBACK_AUTHOR_NAME};

mod comment;
pub use comment::{Comment, Reply};

mod dispatch;
pub use dispatch::Dispatcher;

mod fuzz;

mod http;
pub use http::HttpRemote;

pub mod reconcile;

mod replies;
pub use replies::{PendingReply, PendingReplyVote, ReplyLedger};

mod session;
pub use session::Session;

mod thread;
pub use thread::CommentThread;

mod vote;
pub use vote::{PendingVote, Resolution, VoteState, VoteTracker};

pub mod api {
    pub use parvis_api::*;
}
