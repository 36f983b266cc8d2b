use anyhow::Context;
use std::cell::RefCell;

use parvis_api::{AuthToken, CommentId, PostId, ReplyId, UserData, UserId, Uuid, VoteKind};
use parvis_client::{CommentThread, Dispatcher, HttpRemote, Session};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    /// Id of the user the session token belongs to
    #[structopt(short, long)]
    user: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Show a comment thread
    Show {
        /// Id of the post the comment lives on
        post: String,

        /// Id of the comment
        comment: String,
    },

    /// Toggle a vote on a comment, or on one of its replies
    Vote {
        /// Id of the post the comment lives on
        post: String,

        /// Id of the comment
        comment: String,

        /// Vote on this reply instead of the comment itself
        #[structopt(long)]
        reply: Option<String>,

        /// Downvote instead of upvoting
        #[structopt(long)]
        down: bool,
    },

    /// Submit a reply under a comment
    Reply {
        /// Id of the post the comment lives on
        post: String,

        /// Id of the comment
        comment: String,

        /// Text of the reply
        text: String,
    },
}

fn session_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("SESSION_TOKEN").context("retrieving SESSION_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing SESSION_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

fn print_thread(thread: &CommentThread) {
    let votes = thread.vote_state();
    println!(
        "{} [{:+}] {}: {}",
        thread.id.0, votes.vote_count, thread.author.display_name, thread.text
    );
    for reply in thread.replies.replies() {
        println!(
            "    {} [{:+}] {}: {}",
            reply.id.0, reply.votes.vote_count, reply.author.display_name, reply.text
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let session = Session::logged_in(
        session_token()?,
        UserData {
            mongo_id: Some(UserId(opt.user)),
            ..UserData::default()
        },
    );
    let dispatcher = Dispatcher::new(HttpRemote::new(opt.host), session);

    match opt.cmd {
        Command::Show { post, comment } => {
            let thread = dispatcher
                .load_thread(&PostId(post), &CommentId(comment))
                .await
                .context("fetching the comment thread")?;
            print_thread(&thread);
        }
        Command::Vote {
            post,
            comment,
            reply,
            down,
        } => {
            let kind = if down { VoteKind::Down } else { VoteKind::Up };
            let thread = dispatcher
                .load_thread(&PostId(post), &CommentId(comment))
                .await
                .context("fetching the comment thread")?;
            let thread = RefCell::new(thread);
            match reply {
                Some(reply) => {
                    dispatcher
                        .toggle_reply_vote(&thread, &ReplyId(reply), kind)
                        .await
                        .context("toggling the reply vote")?;
                }
                None => {
                    dispatcher
                        .toggle_comment_vote(&thread, kind)
                        .await
                        .context("toggling the comment vote")?;
                }
            }
            print_thread(&thread.borrow());
        }
        Command::Reply {
            post,
            comment,
            text,
        } => {
            let thread = dispatcher
                .load_thread(&PostId(post), &CommentId(comment))
                .await
                .context("fetching the comment thread")?;
            let thread = RefCell::new(thread);
            thread.borrow_mut().replies.set_draft(text);
            dispatcher
                .submit_reply(&thread)
                .await
                .context("submitting the reply")?;
            print_thread(&thread.borrow());
        }
    }

    Ok(())
}
