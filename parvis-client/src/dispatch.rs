use std::cell::RefCell;

use parvis_api::{CommentId, Error, PostId, Remote, ReplyId, VoteKind};

use crate::{reconcile, session::Session, thread::CommentThread, vote::Resolution};

/// Runs the commit, mutate, then reconcile-or-roll-back cycle for user
/// actions.
///
/// One dispatcher serves one session. It can drive any number of threads
/// and have any number of actions in flight at once: methods borrow the
/// thread only between suspension points, never across one.
pub struct Dispatcher<R> {
    remote: R,
    session: Session,
}

impl<R: Remote> Dispatcher<R> {
    pub fn new(remote: R, session: Session) -> Dispatcher<R> {
        Dispatcher { remote, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fetches and maps a comment, ready to be driven through the other
    /// methods.
    pub async fn load_thread(
        &self,
        post: &PostId,
        comment: &CommentId,
    ) -> Result<CommentThread, Error> {
        let token = self.session.credential()?.clone();
        let fresh = reconcile::fetch_authoritative(
            &self.remote,
            &token,
            post,
            comment,
            self.session.user_id().as_ref(),
        )
        .await?;
        Ok(CommentThread::new(post.clone(), fresh))
    }

    /// One press of a vote button on the comment itself.
    ///
    /// The optimistic transition is visible before this returns control to
    /// the event loop. A reconciliation that cannot complete (the fetch
    /// failed, or the comment vanished from the post) keeps the optimistic
    /// state: the mutation itself went through, the guess is the best view
    /// available.
    pub async fn toggle_comment_vote(
        &self,
        thread: &RefCell<CommentThread>,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let token = self.session.credential()?.clone();
        let (post, comment, pending) = {
            let mut t = thread.borrow_mut();
            let pending = t.votes.commit(kind);
            (t.post_id.clone(), t.id.clone(), pending)
        };
        tracing::debug!("sending {} on comment {:?}", kind.as_str(), comment);

        if let Err(err) = self
            .remote
            .toggle_comment_vote(&token, &post, &comment, kind)
            .await
        {
            let mut t = thread.borrow_mut();
            if let Resolution::Stale = t.votes.roll_back(&pending) {
                tracing::warn!("discarding stale vote rollback on comment {:?}", comment);
            }
            return Err(err);
        }

        let me = self.session.user_id();
        match reconcile::fetch_authoritative(&self.remote, &token, &post, &comment, me.as_ref())
            .await
        {
            Ok(fresh) => {
                let mut t = thread.borrow_mut();
                match t.votes.reconcile(&pending, fresh.votes) {
                    Resolution::Applied => {
                        if let Some(replies) = fresh.replies {
                            t.replies.adopt(replies);
                        }
                    }
                    Resolution::Stale => {
                        tracing::warn!(
                            "discarding stale vote reconciliation on comment {:?}",
                            comment
                        );
                    }
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    "could not reconcile vote on comment {:?}, keeping optimistic state: {:?}",
                    comment,
                    err
                );
                Ok(())
            }
        }
    }

    /// One press of a vote button on a reply. Pressing on a reply that is
    /// not in the list anymore is a no-op.
    pub async fn toggle_reply_vote(
        &self,
        thread: &RefCell<CommentThread>,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let token = self.session.credential()?.clone();
        let (post, comment, pending) = {
            let mut t = thread.borrow_mut();
            let pending = match t.replies.commit_vote(reply, kind) {
                Some(pending) => pending,
                None => return Ok(()),
            };
            (t.post_id.clone(), t.id.clone(), pending)
        };
        tracing::debug!("sending {} on reply {:?}", kind.as_str(), reply);

        if let Err(err) = self
            .remote
            .toggle_reply_vote(&token, &post, &comment, reply, kind)
            .await
        {
            let mut t = thread.borrow_mut();
            if let Resolution::Stale = t.replies.roll_back_vote(&pending) {
                tracing::warn!("discarding stale vote rollback on reply {:?}", reply);
            }
            return Err(err);
        }

        let me = self.session.user_id();
        match reconcile::fetch_authoritative(&self.remote, &token, &post, &comment, me.as_ref())
            .await
        {
            Ok(fresh) => {
                let authoritative = fresh
                    .replies
                    .and_then(|replies| replies.into_iter().find(|r| r.id == *pending.reply()));
                let mut t = thread.borrow_mut();
                match authoritative {
                    Some(server_reply) => {
                        if let Resolution::Stale = t.replies.reconcile_vote(&pending, server_reply)
                        {
                            tracing::warn!(
                                "discarding stale vote reconciliation on reply {:?}",
                                reply
                            );
                        }
                    }
                    None => {
                        tracing::warn!(
                            "reply {:?} missing from the fetched snapshot, keeping optimistic state",
                            reply
                        );
                    }
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    "could not reconcile vote on reply {:?}, keeping optimistic state: {:?}",
                    reply,
                    err
                );
                Ok(())
            }
        }
    }

    /// Submits the ledger's draft as a new reply.
    ///
    /// A blank draft is a silent no-op. The placeholder is visible before
    /// the request leaves; it is removed again if the submission or its
    /// reconciliation fetch fails, and replaced by the authoritative list
    /// when everything goes through.
    pub async fn submit_reply(&self, thread: &RefCell<CommentThread>) -> Result<(), Error> {
        let (token, post, comment, text, pending) = {
            let mut t = thread.borrow_mut();
            let text = t.replies.draft().trim().to_string();
            if text.is_empty() {
                return Ok(());
            }
            let token = self.session.credential()?.clone();
            let pending = t
                .replies
                .begin_reply(text.clone(), self.session.author_snapshot());
            (token, t.post_id.clone(), t.id.clone(), text, pending)
        };
        tracing::debug!("submitting reply under comment {:?}", comment);

        if let Err(err) = self
            .remote
            .create_reply(&token, &post, &comment, &text)
            .await
        {
            thread.borrow_mut().replies.abort_reply(&pending);
            return Err(err);
        }

        let me = self.session.user_id();
        match reconcile::fetch_authoritative(&self.remote, &token, &post, &comment, me.as_ref())
            .await
        {
            Ok(fresh) => {
                let mut t = thread.borrow_mut();
                match fresh.replies {
                    Some(replies) => {
                        if let Resolution::Stale = t.replies.reconcile_submission(&pending, replies)
                        {
                            tracing::warn!(
                                "discarding stale reply adoption on comment {:?}",
                                comment
                            );
                        }
                    }
                    None => {
                        tracing::warn!(
                            "snapshot of comment {:?} came without replies, keeping placeholder",
                            comment
                        );
                    }
                }
                Ok(())
            }
            // the comment vanishing is not a submission failure, keep the
            // placeholder around
            Err(Error::NotFound(_)) => {
                tracing::warn!(
                    "comment {:?} gone from the fetched snapshot, keeping placeholder",
                    comment
                );
                Ok(())
            }
            Err(err) => {
                thread.borrow_mut().replies.abort_reply(&pending);
                Err(err)
            }
        }
    }
}
