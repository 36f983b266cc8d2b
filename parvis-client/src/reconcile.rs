use parvis_api::{
    AuthToken, CommentData, CommentId, Error, PostData, PostId, Remote, ReplyData, ReplyId, UserId,
};

use crate::{
    author::AuthorSnapshot,
    comment::{Comment, Reply},
    vote::VoteState,
};

/// A comment's id, whichever spelling the payload used.
pub fn comment_wire_id(raw: &CommentData) -> Option<&CommentId> {
    raw.mongo_id.as_ref().or(raw.id.as_ref())
}

/// A reply's id, whichever spelling the payload used.
pub fn reply_wire_id(raw: &ReplyData) -> Option<&ReplyId> {
    raw.mongo_id.as_ref().or(raw.id.as_ref())
}

/// Locates a comment in a fetched post, matching either id spelling.
pub fn find_comment<'a>(post: &'a PostData, id: &CommentId) -> Option<&'a CommentData> {
    post.comments.iter().find(|c| comment_wire_id(c) == Some(id))
}

/// Maps a raw reply into its normalized form. A reply the backend gave no id
/// at all can neither be voted on nor replaced, so it is dropped.
pub fn map_reply(raw: &ReplyData, me: Option<&UserId>) -> Option<Reply> {
    let id = match reply_wire_id(raw) {
        Some(id) => id.clone(),
        None => {
            tracing::warn!("dropping reply without any id field");
            return None;
        }
    };
    Some(Reply {
        id,
        author: AuthorSnapshot::from_sources(raw.user.as_ref(), raw.author.as_ref()),
        text: body_text(&raw.text, &raw.content),
        created_at: raw.created_at.or(raw.timestamp),
        votes: VoteState::from_sets(&raw.upvotes, &raw.downvotes, me),
        pending: false,
    })
}

/// Maps a raw comment and its replies into normalized form. `None` when the
/// payload carries no id at all.
pub fn map_comment(raw: &CommentData, me: Option<&UserId>) -> Option<Comment> {
    let id = comment_wire_id(raw)?.clone();
    Some(Comment {
        id,
        author: AuthorSnapshot::from_sources(raw.user.as_ref(), raw.author.as_ref()),
        text: body_text(&raw.text, &raw.content),
        created_at: raw.created_at.or(raw.timestamp),
        votes: VoteState::from_sets(&raw.upvotes, &raw.downvotes, me),
        replies: raw
            .replies
            .as_ref()
            .map(|replies| replies.iter().filter_map(|r| map_reply(r, me)).collect()),
    })
}

fn body_text(text: &Option<String>, content: &Option<String>) -> String {
    text.as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| content.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or("")
        .to_string()
}

/// Fetches the post and maps the one comment the caller cares about.
///
/// `NotFound` means the comment is gone from the post. Callers generally
/// want to keep whatever local state they have in that case rather than
/// clearing it.
pub async fn fetch_authoritative<R: Remote>(
    remote: &R,
    token: &AuthToken,
    post: &PostId,
    comment: &CommentId,
    me: Option<&UserId>,
) -> Result<Comment, Error> {
    let data = remote.fetch_post(token, post).await?;
    find_comment(&data, comment)
        .and_then(|raw| map_comment(raw, me))
        .ok_or_else(|| Error::NotFound(comment.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_post() -> PostData {
        serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "comments": [
                {
                    "_id": "c1",
                    "user": {
                        "_id": "u7",
                        "firstName": "Jean",
                        "lastName": "Valjean",
                        "profilePicture": "/img/jv.png",
                    },
                    "text": "premier",
                    "createdAt": "2023-03-01T10:00:00Z",
                    "upvotes": ["u1", "u7"],
                    "downvotes": ["u2"],
                    "replies": [
                        {
                            "id": "r1",
                            "author": {
                                "id": "u2",
                                "name": "Cosette",
                                "username": "cosette",
                                "avatar": "/img/c.png",
                            },
                            "content": "bien vu",
                            "timestamp": "2023-03-01T11:00:00Z",
                            "upvotes": [],
                            "downvotes": ["u1"],
                        },
                        { "text": "lost in migration" },
                    ],
                },
                { "id": "c2", "content": "second", "upvotes": [], "downvotes": [] },
            ],
        }))
        .unwrap()
    }

    fn cid(id: &str) -> CommentId {
        CommentId(String::from(id))
    }

    #[test]
    fn finds_comments_under_either_id_spelling() {
        let post = the_post();
        assert!(find_comment(&post, &cid("c1")).is_some());
        assert!(find_comment(&post, &cid("c2")).is_some());
        assert!(find_comment(&post, &cid("c3")).is_none());
    }

    #[test]
    fn maps_fields_through_the_fallback_chains() {
        let post = the_post();
        let me = UserId(String::from("u1"));

        let comment = map_comment(find_comment(&post, &cid("c1")).unwrap(), Some(&me)).unwrap();
        assert_eq!(comment.text, "premier");
        assert_eq!(comment.author.display_name, "Jean Valjean");
        assert_eq!(comment.author.avatar_url.as_deref(), Some("/img/jv.png"));
        assert!(comment.created_at.is_some());
        assert_eq!(
            comment.votes,
            VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: 1
            }
        );
        let replies = comment.replies.unwrap();
        // the id-less reply is dropped
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "bien vu");
        assert_eq!(replies[0].author.display_name, "Cosette");
        assert_eq!(replies[0].author.username.as_deref(), Some("cosette"));
        assert_eq!(
            replies[0].votes,
            VoteState {
                upvoted: false,
                downvoted: true,
                vote_count: -1
            }
        );
        assert!(!replies[0].pending);

        let second = map_comment(find_comment(&post, &cid("c2")).unwrap(), Some(&me)).unwrap();
        assert_eq!(second.text, "second");
        assert_eq!(second.author.display_name, "Vous");
        assert_eq!(second.created_at, None);
        assert_eq!(second.replies, None);
    }

    #[test]
    fn mapping_twice_gives_identical_entities() {
        let post = the_post();
        let me = UserId(String::from("u1"));
        let raw = find_comment(&post, &cid("c1")).unwrap();
        assert_eq!(map_comment(raw, Some(&me)), map_comment(raw, Some(&me)));
    }
}
