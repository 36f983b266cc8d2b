use crate::CommentId;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server answered {0}")]
    Server(http::StatusCode),

    #[error("Comment {0:?} is not in the post anymore")]
    NotFound(CommentId),
}
