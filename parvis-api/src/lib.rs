use chrono::Utc;

pub use uuid::{uuid, Uuid};

mod auth;
pub use auth::AuthToken;

mod comment;
pub use comment::{CommentData, CommentId, ReplyData, ReplyId};

mod error;
pub use error::Error;

mod post;
pub use post::{PostData, PostId};

mod remote;
pub use remote::Remote;

mod user;
pub use user::{UserData, UserId};

mod vote;
pub use vote::VoteKind;

pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");
