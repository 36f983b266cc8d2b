#![cfg(test)]

use async_recursion::async_recursion;
use futures::channel::oneshot;
use parvis_api::{
    AuthToken, CommentId, Error, PostData, PostId, Remote, ReplyId, UserId, VoteKind,
};
use parvis_mock_server::MockServer;
use std::{
    cell::RefCell,
    cmp,
    collections::VecDeque,
    future::Future,
    ops::RangeTo,
    panic::AssertUnwindSafe,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crate::{CommentThread, Dispatcher, Session, VoteState};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

/// Runs one async test on a current-thread runtime, inside a LocalSet so
/// the test can spawn_local concurrent dispatcher calls.
fn run<F: Future<Output = ()>>(test: F) {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt::try_init();
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed initializing tokio runtime");
    tokio::task::LocalSet::new().block_on(&runtime, test);
}

/// Lets already-spawned tasks run up to their next suspension point.
async fn spin() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

struct Fixture {
    mock: MockServer,
    me: UserId,
    post: PostId,
    comment: CommentId,
}

fn seeded_mock() -> Fixture {
    let mock = MockServer::new();
    let me = mock.add_user("Ada", "Lovelace", "ada");
    let post = mock.add_post();
    let comment = mock.add_comment(&post, &me, "first!");
    Fixture {
        mock,
        me,
        post,
        comment,
    }
}

fn dispatcher_for<R: Remote>(mock: &MockServer, user: &UserId, remote: R) -> Dispatcher<R> {
    let token = mock.open_session(user);
    Dispatcher::new(remote, Session::logged_in(token, mock.test_profile(user)))
}

/// Remote that counts the requests that actually go out.
struct CountingRemote<R> {
    inner: R,
    requests: Arc<AtomicU64>,
}

impl<R> CountingRemote<R> {
    fn new(inner: R) -> (CountingRemote<R>, Arc<AtomicU64>) {
        let requests = Arc::new(AtomicU64::new(0));
        let counted = CountingRemote {
            inner,
            requests: requests.clone(),
        };
        (counted, requests)
    }
}

#[async_trait::async_trait]
impl<R: Remote + Send + Sync> Remote for CountingRemote<R> {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_post(token, post).await
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.toggle_comment_vote(token, post, comment, kind).await
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner
            .toggle_reply_vote(token, post, comment, reply, kind)
            .await
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.create_reply(token, post, comment, text).await
    }
}

/// How many of the next calls of each kind should answer with a plain 500.
#[derive(Default)]
struct Failures {
    fetches: u64,
    votes: u64,
    reply_votes: u64,
    creates: u64,
}

fn take_failure(slot: &mut u64) -> bool {
    if *slot > 0 {
        *slot -= 1;
        true
    } else {
        false
    }
}

fn rejection() -> Error {
    Error::Server(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
}

/// Remote that fails calls on demand, then behaves again.
struct FailRemote<R> {
    inner: R,
    failures: Arc<Mutex<Failures>>,
}

impl<R> FailRemote<R> {
    fn new(inner: R) -> (FailRemote<R>, Arc<Mutex<Failures>>) {
        let failures = Arc::new(Mutex::new(Failures::default()));
        let failing = FailRemote {
            inner,
            failures: failures.clone(),
        };
        (failing, failures)
    }
}

#[async_trait::async_trait]
impl<R: Remote + Send + Sync> Remote for FailRemote<R> {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        if take_failure(&mut self.failures.lock().unwrap().fetches) {
            return Err(rejection());
        }
        self.inner.fetch_post(token, post).await
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        if take_failure(&mut self.failures.lock().unwrap().votes) {
            return Err(rejection());
        }
        self.inner.toggle_comment_vote(token, post, comment, kind).await
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        if take_failure(&mut self.failures.lock().unwrap().reply_votes) {
            return Err(rejection());
        }
        self.inner
            .toggle_reply_vote(token, post, comment, reply, kind)
            .await
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        if take_failure(&mut self.failures.lock().unwrap().creates) {
            return Err(rejection());
        }
        self.inner.create_reply(token, post, comment, text).await
    }
}

/// Per-method queues of answers the test wants to hold back.
#[derive(Default)]
struct Gates {
    fetches: VecDeque<oneshot::Receiver<()>>,
    votes: VecDeque<oneshot::Receiver<()>>,
    creates: VecDeque<oneshot::Receiver<()>>,
}

fn hold(queue: &mut VecDeque<oneshot::Receiver<()>>) -> oneshot::Sender<()> {
    let (sender, receiver) = oneshot::channel();
    queue.push_back(receiver);
    sender
}

async fn pass(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}

/// Remote whose answers the test can delay to interleave completions. Calls
/// go through to the inner remote right away; if a gate was queued for that
/// method the answer only comes back once the test releases it. Gates apply
/// in call order.
struct GatedRemote<R> {
    inner: R,
    gates: Arc<Mutex<Gates>>,
}

impl<R> GatedRemote<R> {
    fn new(inner: R) -> (GatedRemote<R>, Arc<Mutex<Gates>>) {
        let gates = Arc::new(Mutex::new(Gates::default()));
        let gated = GatedRemote {
            inner,
            gates: gates.clone(),
        };
        (gated, gates)
    }
}

#[async_trait::async_trait]
impl<R: Remote + Send + Sync> Remote for GatedRemote<R> {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        let res = self.inner.fetch_post(token, post).await;
        let gate = self.gates.lock().unwrap().fetches.pop_front();
        pass(gate).await;
        res
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        let res = self
            .inner
            .toggle_comment_vote(token, post, comment, kind)
            .await;
        let gate = self.gates.lock().unwrap().votes.pop_front();
        pass(gate).await;
        res
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        self.inner
            .toggle_reply_vote(token, post, comment, reply, kind)
            .await
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        let res = self.inner.create_reply(token, post, comment, text).await;
        let gate = self.gates.lock().unwrap().creates.pop_front();
        pass(gate).await;
        res
    }
}

/// Remote that strips the reply lists out of every fetched post, answering
/// like an endpoint that does not include them at all.
struct StrippingRemote<R> {
    inner: R,
}

#[async_trait::async_trait]
impl<R: Remote + Send + Sync> Remote for StrippingRemote<R> {
    async fn fetch_post(&self, token: &AuthToken, post: &PostId) -> Result<PostData, Error> {
        let mut fetched = self.inner.fetch_post(token, post).await?;
        for comment in &mut fetched.comments {
            comment.replies = None;
        }
        Ok(fetched)
    }

    async fn toggle_comment_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        self.inner.toggle_comment_vote(token, post, comment, kind).await
    }

    async fn toggle_reply_vote(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        reply: &ReplyId,
        kind: VoteKind,
    ) -> Result<(), Error> {
        self.inner
            .toggle_reply_vote(token, post, comment, reply, kind)
            .await
    }

    async fn create_reply(
        &self,
        token: &AuthToken,
        post: &PostId,
        comment: &CommentId,
        text: &str,
    ) -> Result<(), Error> {
        self.inner.create_reply(token, post, comment, text).await
    }
}

#[test]
fn votes_round_trip_through_the_server() {
    run(async {
        let f = seeded_mock();
        let other = f.mock.add_user("Grace", "Hopper", "grace");
        f.mock.cast_vote(&f.post, &f.comment, &other, VoteKind::Up);

        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        assert_eq!(
            thread.borrow().vote_state(),
            VoteState {
                upvoted: false,
                downvoted: false,
                vote_count: 1
            }
        );

        dispatcher
            .toggle_comment_vote(&thread, VoteKind::Up)
            .await
            .unwrap();
        assert_eq!(
            thread.borrow().vote_state(),
            VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: 2
            }
        );
        let (ups, downs) = f.mock.test_vote_sets(&f.post, &f.comment);
        assert_eq!(ups.len(), 2);
        assert!(downs.is_empty());

        dispatcher
            .toggle_comment_vote(&thread, VoteKind::Down)
            .await
            .unwrap();
        assert_eq!(
            thread.borrow().vote_state(),
            VoteState {
                upvoted: false,
                downvoted: true,
                vote_count: 0
            }
        );
        let (ups, downs) = f.mock.test_vote_sets(&f.post, &f.comment);
        assert_eq!(ups, vec![other]);
        assert_eq!(downs, vec![f.me.clone()]);
    });
}

#[test]
fn reloading_gives_the_same_thread_twice() {
    run(async {
        let f = seeded_mock();
        let other = f.mock.add_user("Grace", "Hopper", "grace");
        f.mock.add_reply(&f.post, &f.comment, &other, "indeed");

        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let a = dispatcher.load_thread(&f.post, &f.comment).await.unwrap();
        let b = dispatcher.load_thread(&f.post, &f.comment).await.unwrap();
        assert_eq!(a.author, b.author);
        assert_eq!(a.text, b.text);
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(a.vote_state(), b.vote_state());
        assert_eq!(a.replies.replies(), b.replies.replies());
    });
}

#[test]
fn anonymous_presses_cost_nothing() {
    run(async {
        let f = seeded_mock();
        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        let before = thread.borrow().vote_state();

        let (remote, sent) = CountingRemote::new(f.mock.clone());
        let anonymous = Dispatcher::new(remote, Session::anonymous());
        assert_eq!(
            anonymous.toggle_comment_vote(&thread, VoteKind::Up).await,
            Err(Error::AuthRequired)
        );
        assert_eq!(thread.borrow().vote_state(), before);

        thread
            .borrow_mut()
            .replies
            .set_draft(String::from("hello"));
        assert_eq!(
            anonymous.submit_reply(&thread).await,
            Err(Error::AuthRequired)
        );
        let t = thread.borrow();
        assert_eq!(t.replies.draft(), "hello");
        assert!(t.replies.replies().is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn server_rejections_roll_votes_back() {
    run(async {
        let f = seeded_mock();
        let (remote, failures) = FailRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        let before = thread.borrow().vote_state();

        failures.lock().unwrap().votes = 1;
        assert_eq!(
            dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await,
            Err(rejection())
        );
        assert_eq!(thread.borrow().vote_state(), before);
        let (ups, downs) = f.mock.test_vote_sets(&f.post, &f.comment);
        assert!(ups.is_empty());
        assert!(downs.is_empty());

        // the remote behaves again, the next press goes through
        dispatcher
            .toggle_comment_vote(&thread, VoteKind::Up)
            .await
            .unwrap();
        assert!(thread.borrow().vote_state().upvoted);
    });
}

#[test]
fn votes_on_deleted_comments_roll_back() {
    run(async {
        let f = seeded_mock();
        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        let before = thread.borrow().vote_state();

        f.mock.delete_comment(&f.post, &f.comment);
        assert_eq!(
            dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await,
            Err(Error::Server(reqwest::StatusCode::NOT_FOUND))
        );
        assert_eq!(thread.borrow().vote_state(), before);
    });
}

#[test]
fn deletion_after_the_vote_keeps_the_optimistic_state() {
    run(async {
        let f = seeded_mock();
        let (remote, gates) = GatedRemote::new(f.mock.clone());
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));

        let release = hold(&mut gates.lock().unwrap().votes);
        let press = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await }
        });
        spin().await;

        // the vote went through, now the comment disappears before the
        // reconciliation snapshot is even requested
        f.mock.delete_comment(&f.post, &f.comment);
        release.send(()).unwrap();
        press.await.unwrap().unwrap();

        assert_eq!(
            thread.borrow().vote_state(),
            VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: 1
            }
        );
    });
}

#[test]
fn fetch_failures_after_votes_keep_the_optimistic_state() {
    run(async {
        let f = seeded_mock();
        let (remote, failures) = FailRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());

        // the mutation lands, only the snapshot fetch fails; the press still
        // reports success and the guess stays on screen
        failures.lock().unwrap().fetches = 1;
        dispatcher
            .toggle_comment_vote(&thread, VoteKind::Up)
            .await
            .unwrap();
        assert_eq!(
            thread.borrow().vote_state(),
            VoteState {
                upvoted: true,
                downvoted: false,
                vote_count: 1
            }
        );
        let (ups, downs) = f.mock.test_vote_sets(&f.post, &f.comment);
        assert_eq!(ups, vec![f.me.clone()]);
        assert!(downs.is_empty());
    });
}

#[test]
fn stale_vote_completions_are_discarded() {
    run(async {
        let f = seeded_mock();
        let (remote, gates) = GatedRemote::new(f.mock.clone());
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));

        // the first press gets its snapshot answered right away, but the
        // answer sits in flight until released
        let release = hold(&mut gates.lock().unwrap().fetches);
        let first = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await }
        });
        spin().await;

        // the second press runs start to finish and reconciles: both votes
        // toggled, the comment is back to no votes at all
        let second = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await }
        });
        spin().await;
        second.await.unwrap().unwrap();
        assert_eq!(thread.borrow().vote_state(), VoteState::default());

        // the first snapshot still carries the upvote; applying it now would
        // resurrect a state the user has already left
        release.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(thread.borrow().vote_state(), VoteState::default());
    });
}

#[test]
fn slow_failures_cannot_clobber_newer_presses() {
    run(async {
        let f = seeded_mock();
        let (failing, failures) = FailRemote::new(f.mock.clone());
        let (remote, gates) = GatedRemote::new(failing);
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));

        // the first press fails server-side, slowly
        failures.lock().unwrap().votes = 1;
        let release = hold(&mut gates.lock().unwrap().votes);
        let first = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.toggle_comment_vote(&thread, VoteKind::Up).await }
        });
        spin().await;

        // meanwhile the user switches to a downvote, which goes through
        let second = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.toggle_comment_vote(&thread, VoteKind::Down).await }
        });
        spin().await;
        second.await.unwrap().unwrap();
        let after_second = VoteState {
            upvoted: false,
            downvoted: true,
            vote_count: -1,
        };
        assert_eq!(thread.borrow().vote_state(), after_second);

        // the late failure reports the error but must not restore the
        // snapshot it took before the downvote
        release.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Err(rejection()));
        assert_eq!(thread.borrow().vote_state(), after_second);
    });
}

#[test]
fn replies_round_trip_through_the_server() {
    run(async {
        let f = seeded_mock();
        let (remote, gates) = GatedRemote::new(f.mock.clone());
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));
        thread
            .borrow_mut()
            .replies
            .set_draft(String::from("  well said  "));

        let release = hold(&mut gates.lock().unwrap().creates);
        let submission = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.submit_reply(&thread).await }
        });
        spin().await;

        // while the submission is in flight the placeholder is already there
        {
            let t = thread.borrow();
            assert_eq!(t.replies.pending_count(), 1);
            let placeholder = &t.replies.replies()[0];
            assert!(placeholder.pending);
            assert!(placeholder.id.is_temp());
            assert_eq!(placeholder.text, "well said");
            assert_eq!(placeholder.author.display_name, "Ada Lovelace");
            assert_eq!(placeholder.created_at, None);
            assert_eq!(t.replies.draft(), "");
            assert!(t.replies.expanded());
        }

        release.send(()).unwrap();
        submission.await.unwrap().unwrap();

        let t = thread.borrow();
        assert_eq!(t.replies.pending_count(), 0);
        assert_eq!(t.replies.replies().len(), 1);
        let adopted = &t.replies.replies()[0];
        assert!(!adopted.pending);
        assert!(!adopted.id.is_temp());
        assert_eq!(adopted.text, "well said");
        assert!(adopted.created_at.is_some());
        assert_eq!(
            f.mock.test_reply_ids(&f.post, &f.comment),
            vec![adopted.id.clone()]
        );
    });
}

#[test]
fn empty_drafts_are_not_submitted() {
    run(async {
        let f = seeded_mock();
        let (remote, sent) = CountingRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        let after_load = sent.load(Ordering::SeqCst);

        thread
            .borrow_mut()
            .replies
            .set_draft(String::from("   \n "));
        dispatcher.submit_reply(&thread).await.unwrap();

        let t = thread.borrow();
        assert_eq!(t.replies.draft(), "   \n ");
        assert!(t.replies.replies().is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), after_load);
    });
}

#[test]
fn failed_submissions_take_the_placeholder_back_out() {
    run(async {
        let f = seeded_mock();
        let (remote, failures) = FailRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());

        thread
            .borrow_mut()
            .replies
            .set_draft(String::from("hello"));
        failures.lock().unwrap().creates = 1;
        assert_eq!(dispatcher.submit_reply(&thread).await, Err(rejection()));

        let t = thread.borrow();
        assert!(t.replies.replies().is_empty());
        assert_eq!(t.replies.pending_count(), 0);
        // the draft was cleared optimistically and does not come back
        assert_eq!(t.replies.draft(), "");
        assert!(f.mock.test_reply_ids(&f.post, &f.comment).is_empty());
    });
}

#[test]
fn fetch_failures_after_submission_abort_the_placeholder() {
    run(async {
        let f = seeded_mock();
        let (remote, failures) = FailRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());

        thread
            .borrow_mut()
            .replies
            .set_draft(String::from("hello"));
        failures.lock().unwrap().fetches = 1;
        assert_eq!(dispatcher.submit_reply(&thread).await, Err(rejection()));
        assert!(thread.borrow().replies.replies().is_empty());

        // the reply did land server-side, the next reload shows it
        let reloaded = dispatcher.load_thread(&f.post, &f.comment).await.unwrap();
        assert_eq!(reloaded.replies.replies().len(), 1);
        assert_eq!(reloaded.replies.replies()[0].text, "hello");
    });
}

#[test]
fn deletion_after_the_submission_keeps_the_placeholder() {
    run(async {
        let f = seeded_mock();
        let (remote, gates) = GatedRemote::new(f.mock.clone());
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));
        thread.borrow_mut().replies.set_draft(String::from("hello"));

        let release = hold(&mut gates.lock().unwrap().creates);
        let submission = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.submit_reply(&thread).await }
        });
        spin().await;

        // the reply was written, now the whole comment disappears before the
        // reconciliation snapshot is requested
        f.mock.delete_comment(&f.post, &f.comment);
        release.send(()).unwrap();
        submission.await.unwrap().unwrap();

        // the submission itself went through, so the placeholder stays put
        let t = thread.borrow();
        assert_eq!(t.replies.replies().len(), 1);
        let placeholder = &t.replies.replies()[0];
        assert!(placeholder.pending);
        assert!(placeholder.id.is_temp());
        assert_eq!(placeholder.text, "hello");
        assert_eq!(t.replies.pending_count(), 1);
    });
}

#[test]
fn snapshots_without_reply_lists_keep_the_placeholder() {
    run(async {
        let f = seeded_mock();
        let remote = StrippingRemote {
            inner: f.mock.clone(),
        };
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());

        thread.borrow_mut().replies.set_draft(String::from("hello"));
        dispatcher.submit_reply(&thread).await.unwrap();

        // the reply landed server-side, but the snapshot carried no list to
        // adopt in its place
        assert_eq!(f.mock.test_reply_ids(&f.post, &f.comment).len(), 1);
        let t = thread.borrow();
        assert_eq!(t.replies.replies().len(), 1);
        let placeholder = &t.replies.replies()[0];
        assert!(placeholder.pending);
        assert!(placeholder.id.is_temp());
        assert_eq!(placeholder.text, "hello");
    });
}

#[test]
fn stale_submission_completions_are_discarded() {
    run(async {
        let f = seeded_mock();
        let (remote, gates) = GatedRemote::new(f.mock.clone());
        let dispatcher = Rc::new(dispatcher_for(&f.mock, &f.me, remote));
        let thread = Rc::new(RefCell::new(
            dispatcher.load_thread(&f.post, &f.comment).await.unwrap(),
        ));

        // the first submission gets its snapshot answered right away, but
        // the answer sits in flight until released
        thread.borrow_mut().replies.set_draft(String::from("one"));
        let release = hold(&mut gates.lock().unwrap().fetches);
        let first = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.submit_reply(&thread).await }
        });
        spin().await;

        // the second submission runs start to finish and adopts a list
        // carrying both replies
        thread.borrow_mut().replies.set_draft(String::from("two"));
        let second = tokio::task::spawn_local({
            let dispatcher = dispatcher.clone();
            let thread = thread.clone();
            async move { dispatcher.submit_reply(&thread).await }
        });
        spin().await;
        second.await.unwrap().unwrap();
        assert_eq!(thread.borrow().replies.replies().len(), 2);

        // the held snapshot only knows the first reply; adopting it now
        // would drop the second one from the screen
        release.send(()).unwrap();
        first.await.unwrap().unwrap();

        let t = thread.borrow();
        assert_eq!(t.replies.pending_count(), 0);
        let texts: Vec<&str> = t.replies.replies().iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        let ids: Vec<ReplyId> = t.replies.replies().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, f.mock.test_reply_ids(&f.post, &f.comment));
    });
}

#[test]
fn reply_votes_round_trip_through_the_server() {
    run(async {
        let f = seeded_mock();
        let other = f.mock.add_user("Grace", "Hopper", "grace");
        let reply = f.mock.add_reply(&f.post, &f.comment, &other, "indeed");

        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());

        dispatcher
            .toggle_reply_vote(&thread, &reply, VoteKind::Up)
            .await
            .unwrap();
        {
            let t = thread.borrow();
            let voted = t.replies.reply(&reply).unwrap();
            assert_eq!(
                voted.votes,
                VoteState {
                    upvoted: true,
                    downvoted: false,
                    vote_count: 1
                }
            );
        }
        let (ups, downs) = f.mock.test_reply_vote_sets(&f.post, &f.comment, &reply);
        assert_eq!(ups, vec![f.me.clone()]);
        assert!(downs.is_empty());
    });
}

#[test]
fn votes_on_absent_replies_are_ignored() {
    run(async {
        let f = seeded_mock();
        let (remote, sent) = CountingRemote::new(f.mock.clone());
        let dispatcher = dispatcher_for(&f.mock, &f.me, remote);
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        let after_load = sent.load(Ordering::SeqCst);

        dispatcher
            .toggle_reply_vote(&thread, &ReplyId(String::from("r_999")), VoteKind::Up)
            .await
            .unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), after_load);
    });
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CommentVote(VoteKind),
    ReplyVote {
        rid: usize,
        kind: VoteKind,
    },
    SetDraft(
        #[generator(bolero::generator::gen_with::<String>().len(0..50usize))] String,
    ),
    SubmitReply,
    Reload,
}

struct DispatcherFuzzer {
    mock: MockServer,
    dispatcher: Dispatcher<MockServer>,
    me: UserId,
    post: PostId,
    comment: CommentId,
    thread: RefCell<CommentThread>,
}

impl DispatcherFuzzer {
    async fn new() -> DispatcherFuzzer {
        let f = seeded_mock();
        let other = f.mock.add_user("Grace", "Hopper", "grace");
        f.mock.cast_vote(&f.post, &f.comment, &other, VoteKind::Down);
        f.mock.add_reply(&f.post, &f.comment, &other, "me first");
        let dispatcher = dispatcher_for(&f.mock, &f.me, f.mock.clone());
        let thread = RefCell::new(dispatcher.load_thread(&f.post, &f.comment).await.unwrap());
        DispatcherFuzzer {
            mock: f.mock,
            dispatcher,
            me: f.me,
            post: f.post,
            comment: f.comment,
            thread,
        }
    }

    #[async_recursion(?Send)]
    async fn execute_fuzz_op(&self, op: FuzzOp) {
        match op {
            FuzzOp::CommentVote(kind) => {
                self.dispatcher
                    .toggle_comment_vote(&self.thread, kind)
                    .await
                    .unwrap();
            }
            FuzzOp::ReplyVote { rid, kind } => {
                let target = {
                    let t = self.thread.borrow();
                    let replies = t.replies.replies();
                    resize_int(rid, ..replies.len()).map(|at| replies[at].id.clone())
                };
                match target {
                    Some(reply) => {
                        self.dispatcher
                            .toggle_reply_vote(&self.thread, &reply, kind)
                            .await
                            .unwrap();
                    }
                    None => {
                        // no replies to vote on yet: write one, then retry
                        self.execute_fuzz_op(FuzzOp::SetDraft(String::from("content")))
                            .await;
                        self.execute_fuzz_op(FuzzOp::SubmitReply).await;
                        self.execute_fuzz_op(FuzzOp::ReplyVote { rid, kind }).await;
                    }
                }
            }
            FuzzOp::SetDraft(text) => {
                self.thread.borrow_mut().replies.set_draft(text);
            }
            FuzzOp::SubmitReply => {
                self.dispatcher.submit_reply(&self.thread).await.unwrap();
            }
            FuzzOp::Reload => {
                let fresh = self
                    .dispatcher
                    .load_thread(&self.post, &self.comment)
                    .await
                    .unwrap();
                *self.thread.borrow_mut() = fresh;
            }
        }
        self.check_against_server();
    }

    /// Ops run one at a time to completion, so between two of them the
    /// thread has nothing in flight and must agree with the server.
    fn check_against_server(&self) {
        let t = self.thread.borrow();
        let votes = t.vote_state();
        assert!(!(votes.upvoted && votes.downvoted));
        let (ups, downs) = self.mock.test_vote_sets(&self.post, &self.comment);
        assert_eq!(votes.vote_count, ups.len() as i64 - downs.len() as i64);
        assert_eq!(votes.upvoted, ups.contains(&self.me));
        assert_eq!(votes.downvoted, downs.contains(&self.me));

        assert_eq!(t.replies.pending_count(), 0);
        let local: Vec<ReplyId> = t.replies.replies().iter().map(|r| r.id.clone()).collect();
        assert_eq!(local, self.mock.test_reply_ids(&self.post, &self.comment));
        for reply in t.replies.replies() {
            assert!(!reply.id.is_temp());
            assert!(!(reply.votes.upvoted && reply.votes.downvoted));
        }
    }
}

do_tokio_test!(
    fuzz_dispatcher_against_mock,
    Vec<FuzzOp>,
    |ops: Vec<FuzzOp>| async move {
        let fuzzer = DispatcherFuzzer::new().await;
        for op in ops {
            fuzzer.execute_fuzz_op(op).await;
        }
    }
);
