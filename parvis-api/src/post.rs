use crate::CommentData;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct PostId(pub String);

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostData {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    #[serde(default)]
    pub comments: Vec<CommentData>,
}
