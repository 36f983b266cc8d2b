#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
pub enum VoteKind {
    #[serde(rename = "upvote")]
    Up,
    #[serde(rename = "downvote")]
    Down,
}

impl VoteKind {
    /// Path segment the vote endpoints are reached under.
    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Up => "upvote",
            VoteKind::Down => "downvote",
        }
    }
}
