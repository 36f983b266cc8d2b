use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use parvis_api::{
    AuthToken, CommentData, CommentId, Error, PostData, PostId, Remote, ReplyData, ReplyId, Time,
    UserData, UserId, Uuid, VoteKind,
};

/// In-memory stand-in for the backend. Holds the server-side vote sets and
/// reply storage, and answers with the same Mongo-flavored payload shapes
/// the real one does.
///
/// Cloning hands out another handle onto the same state, so a test can keep
/// one while a dispatcher owns the other.
#[derive(Clone, Debug, Default)]
pub struct MockServer {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<UserId, UserData>,
    sessions: HashMap<AuthToken, UserId>,
    posts: BTreeMap<PostId, MockPost>,
    counter: u64,
}

#[derive(Debug, Default)]
struct MockPost {
    comments: Vec<MockComment>,
}

#[derive(Debug)]
struct MockComment {
    id: CommentId,
    author: UserId,
    text: String,
    created_at: Time,
    upvotes: Vec<UserId>,
    downvotes: Vec<UserId>,
    replies: Vec<MockReply>,
}

#[derive(Debug)]
struct MockReply {
    id: ReplyId,
    author: UserId,
    text: String,
    created_at: Time,
    upvotes: Vec<UserId>,
    downvotes: Vec<UserId>,
}

/// The server-side toggle: voting again removes the vote, voting the other
/// way first clears the opposite set.
fn toggle_vote(target: &mut Vec<UserId>, opposite: &mut Vec<UserId>, me: &UserId) {
    if let Some(at) = target.iter().position(|u| u == me) {
        target.remove(at);
    } else {
        opposite.retain(|u| u != me);
        target.push(me.clone());
    }
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }

    fn authenticate(&self, token: &AuthToken) -> Result<UserId, Error> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or(Error::Server(http::StatusCode::UNAUTHORIZED))
    }

    fn comment_mut(
        &mut self,
        post: &PostId,
        comment: &CommentId,
    ) -> Result<&mut MockComment, Error> {
        self.posts
            .get_mut(post)
            .ok_or(Error::Server(http::StatusCode::NOT_FOUND))?
            .comments
            .iter_mut()
            .find(|c| c.id == *comment)
            .ok_or(Error::Server(http::StatusCode::NOT_FOUND))
    }

    fn reply_payload(&self, reply: &MockReply) -> ReplyData {
        ReplyData {
            mongo_id: Some(reply.id.clone()),
            id: None,
            user: self.users.get(&reply.author).cloned(),
            author: None,
            text: Some(reply.text.clone()),
            content: None,
            created_at: Some(reply.created_at),
            timestamp: None,
            upvotes: reply.upvotes.clone(),
            downvotes: reply.downvotes.clone(),
        }
    }

    fn comment_payload(&self, comment: &MockComment) -> CommentData {
        CommentData {
            mongo_id: Some(comment.id.clone()),
            id: None,
            user: self.users.get(&comment.author).cloned(),
            author: None,
            text: Some(comment.text.clone()),
            content: None,
            created_at: Some(comment.created_at),
            timestamp: None,
            upvotes: comment.upvotes.clone(),
            downvotes: comment.downvotes.clone(),
            replies: Some(comment.replies.iter().map(|r| self.reply_payload(r)).collect()),
        }
    }

    fn post_payload(&self, id: &PostId, post: &MockPost) -> PostData {
        PostData {
            mongo_id: Some(id.clone()),
            id: None,
            comments: post.comments.iter().map(|c| self.comment_payload(c)).collect(),
        }
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add_user(&self, first_name: &str, last_name: &str, username: &str) -> UserId {
        let mut inner = self.lock();
        let id = UserId(inner.next_id("u"));
        inner.users.insert(
            id.clone(),
            UserData {
                mongo_id: Some(id.clone()),
                first_name: Some(String::from(first_name)),
                last_name: Some(String::from(last_name)),
                username: Some(String::from(username)),
                ..UserData::default()
            },
        );
        id
    }

    pub fn open_session(&self, user: &UserId) -> AuthToken {
        let mut inner = self.lock();
        assert!(
            inner.users.contains_key(user),
            "opening a session for unknown user {:?}",
            user
        );
        let token = AuthToken(Uuid::new_v4());
        inner.sessions.insert(token, user.clone());
        token
    }

    pub fn add_post(&self) -> PostId {
        let mut inner = self.lock();
        let id = PostId(inner.next_id("p"));
        inner.posts.insert(id.clone(), MockPost::default());
        id
    }

    pub fn add_comment(&self, post: &PostId, author: &UserId, text: &str) -> CommentId {
        let mut inner = self.lock();
        let id = CommentId(inner.next_id("c"));
        let entry = inner
            .posts
            .get_mut(post)
            .unwrap_or_else(|| panic!("adding a comment to unknown post {:?}", post));
        entry.comments.push(MockComment {
            id: id.clone(),
            author: author.clone(),
            text: String::from(text),
            created_at: Utc::now(),
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            replies: Vec::new(),
        });
        id
    }

    pub fn add_reply(
        &self,
        post: &PostId,
        comment: &CommentId,
        author: &UserId,
        text: &str,
    ) -> ReplyId {
        let mut inner = self.lock();
        let id = ReplyId(inner.next_id("r"));
        let entry = inner
            .comment_mut(post, comment)
            .unwrap_or_else(|_| panic!("adding a reply to unknown comment {:?}", comment));
        entry.replies.push(MockReply {
            id: id.clone(),
            author: author.clone(),
            text: String::from(text),
            created_at: Utc::now(),
            upvotes: Vec::new(),
            downvotes: Vec::new(),
        });
        id
    }

    /// Casts a vote directly into the server-side sets, bypassing the
    /// endpoints. For seeding initial states.
    pub fn cast_vote(&self, post: &PostId, comment: &CommentId, voter: &UserId, kind: VoteKind) {
        let mut inner = self.lock();
        let entry = inner
            .comment_mut(post, comment)
            .unwrap_or_else(|_| panic!("voting on unknown comment {:?}", comment));
        match kind {
            VoteKind::Up => toggle_vote(&mut entry.upvotes, &mut entry.downvotes, voter),
            VoteKind::Down => toggle_vote(&mut entry.downvotes, &mut entry.upvotes, voter),
        }
    }

    /// Deletes a comment out from under the clients, like a moderator would.
    pub fn delete_comment(&self, post: &PostId, comment: &CommentId) {
        let mut inner = self.lock();
        let entry = inner
            .posts
            .get_mut(post)
            .unwrap_or_else(|| panic!("deleting a comment from unknown post {:?}", post));
        entry.comments.retain(|c| c.id != *comment);
    }

    /// Return the stored profile of `user`.
    pub fn test_profile(&self, user: &UserId) -> UserData {
        self.lock()
            .users
            .get(user)
            .cloned()
            .unwrap_or_else(|| panic!("getting profile of unknown user {:?}", user))
    }

    /// Return the server-side (upvotes, downvotes) sets of a comment.
    pub fn test_vote_sets(&self, post: &PostId, comment: &CommentId) -> (Vec<UserId>, Vec<UserId>) {
        let mut inner = self.lock();
        let entry = inner
            .comment_mut(post, comment)
            .unwrap_or_else(|_| panic!("inspecting unknown comment {:?}", comment));
        (entry.upvotes.clone(), entry.downvotes.clone())
    }

    /// Return the server-side (upvotes, downvotes) sets of a reply.
    pub fn test_reply_vote_sets(
        &self,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
    ) -> (Vec<UserId>, Vec<UserId>) {
        let mut inner = self.lock();
        let entry = inner
            .comment_mut(post, comment)
            .unwrap_or_else(|_| panic!("inspecting unknown comment {:?}", comment));
        let reply = entry
            .replies
            .iter()
            .find(|r| r.id == *reply)
            .unwrap_or_else(|| panic!("inspecting unknown reply {:?}", reply));
        (reply.upvotes.clone(), reply.downvotes.clone())
    }

    /// Return the ids of a comment's replies, in storage order.
    pub fn test_reply_ids(&self, post: &PostId, comment: &CommentId) -> Vec<ReplyId> {
        let mut inner = self.lock();
        let entry = inner
            .comment_mut(post, comment)
            .unwrap_or_else(|_| panic!("inspecting unknown comment {:?}", comment));
        entry.replies.iter().map(|r| r.id.clone()).collect()
    }
}

#[async_trait]
impl Remote for MockServer {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        let inner = self.lock();
        inner.authenticate(token)?;
        let data = inner
            .posts
            .get(post)
            .ok_or(Error::Server(http::StatusCode::NOT_FOUND))?;
        Ok(inner.post_payload(post, data))
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let me = inner.authenticate(token)?;
        let entry = inner.comment_mut(post, comment)?;
        match kind {
            VoteKind::Up => toggle_vote(&mut entry.upvotes, &mut entry.downvotes, &me),
            VoteKind::Down => toggle_vote(&mut entry.downvotes, &mut entry.upvotes, &me),
        }
        Ok(())
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let me = inner.authenticate(token)?;
        let entry = inner
            .comment_mut(post, comment)?
            .replies
            .iter_mut()
            .find(|r| r.id == *reply)
            .ok_or(Error::Server(http::StatusCode::NOT_FOUND))?;
        match kind {
            VoteKind::Up => toggle_vote(&mut entry.upvotes, &mut entry.downvotes, &me),
            VoteKind::Down => toggle_vote(&mut entry.downvotes, &mut entry.upvotes, &me),
        }
        Ok(())
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let me = inner.authenticate(token)?;
        let id = ReplyId(inner.next_id("r"));
        let entry = inner.comment_mut(post, comment)?;
        entry.replies.push(MockReply {
            id,
            author: me,
            text: String::from(text),
            created_at: Utc::now(),
            upvotes: Vec::new(),
            downvotes: Vec::new(),
        });
        Ok(())
    }
}
