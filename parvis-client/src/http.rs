use async_trait::async_trait;
use parvis_api::{AuthToken, CommentId, Error, PostData, PostId, Remote, ReplyId, VoteKind};

/// `Remote` implementation talking to a live backend.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: reqwest::Client,
    host: String,
}

impl HttpRemote {
    /// `host` is the base the endpoint paths get appended to, of the form
    /// `http://localhost:5000/api`, without trailing slash.
    pub fn new(host: String) -> HttpRemote {
        HttpRemote {
            client: reqwest::Client::new(),
            host,
        }
    }
}

fn network_error(err: reqwest::Error) -> Error {
    Error::Network(err.to_string())
}

fn expect_success(resp: &reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Server(status))
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        let resp = self
            .client
            .get(format!("{}/posts/{}", self.host, post.0))
            .bearer_auth(token.0)
            .send()
            .await
            .map_err(network_error)?;
        expect_success(&resp)?;
        resp.json().await.map_err(network_error)
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let resp = self
            .client
            .post(format!(
                "{}/posts/{}/comments/{}/{}",
                self.host,
                post.0,
                comment.0,
                kind.as_str()
            ))
            .bearer_auth(token.0)
            .send()
            .await
            .map_err(network_error)?;
        expect_success(&resp)
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let resp = self
            .client
            .post(format!(
                "{}/posts/{}/comments/{}/replies/{}/{}",
                self.host,
                post.0,
                comment.0,
                reply.0,
                kind.as_str()
            ))
            .bearer_auth(token.0)
            .send()
            .await
            .map_err(network_error)?;
        expect_success(&resp)
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        let resp = self
            .client
            .post(format!(
                "{}/posts/{}/comments/{}/replies",
                self.host, post.0, comment.0
            ))
            .bearer_auth(token.0)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(network_error)?;
        expect_success(&resp)
    }
}
