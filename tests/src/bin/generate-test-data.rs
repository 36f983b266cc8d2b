use chrono::Duration;
use parvis_api::{
    CommentData, CommentId, PostData, PostId, ReplyData, ReplyId, Time, UserData, UserId,
};
use rand::Rng;
use uuid::Uuid;

const NUM_USERS: usize = 8;
const NUM_POSTS: usize = 5;
const MAX_COMMENTS_PER_POST: usize = 6;
const MAX_REPLIES_PER_COMMENT: usize = 4;

const TEXT_WORD_COUNT: usize = 18;
const MAX_AGE_MINUTES: i64 = 60 * 24 * 30;

fn gen_text(rng: &mut impl Rng) -> String {
    lipsum::lipsum_words(rng.gen_range(3..TEXT_WORD_COUNT))
}

fn gen_stamp(rng: &mut impl Rng) -> Time {
    chrono::Utc::now() - Duration::minutes(rng.gen_range(0..MAX_AGE_MINUTES))
}

// The backend interleaves several field spellings for the same thing, so
// the generated users cover all the combinations clients must cope with.
fn gen_user(rng: &mut impl Rng) -> UserData {
    let id = UserId(Uuid::new_v4().to_string());
    let mut user = UserData::default();
    match rng.gen_bool(0.8) {
        true => user.mongo_id = Some(id),
        false => user.id = Some(id),
    }
    match rng.gen_range(0..3) {
        0 => {
            user.first_name = Some(lipsum::lipsum_words(1));
            user.last_name = Some(lipsum::lipsum_words(1));
        }
        1 => user.name = Some(lipsum::lipsum_words(2)),
        _ => (),
    }
    match rng.gen_range(0..3) {
        0 => user.username = Some(lipsum::lipsum_words(1)),
        1 => user.handle = Some(lipsum::lipsum_words(1)),
        _ => (),
    }
    match rng.gen_range(0..3) {
        0 => user.profile_picture = Some(format!("https://cdn.example/{}.png", Uuid::new_v4())),
        1 => user.avatar = Some(format!("https://cdn.example/{}.png", Uuid::new_v4())),
        _ => (),
    }
    user
}

fn user_id(user: &UserData) -> UserId {
    user.mongo_id
        .clone()
        .or_else(|| user.id.clone())
        .expect("generated users always carry an id")
}

fn pick_voters(rng: &mut impl Rng, pool: &[UserId]) -> (Vec<UserId>, Vec<UserId>) {
    let mut upvotes = Vec::new();
    let mut downvotes = Vec::new();
    for user in pool {
        match rng.gen_range(0..4) {
            0 => upvotes.push(user.clone()),
            1 => downvotes.push(user.clone()),
            _ => (),
        }
    }
    (upvotes, downvotes)
}

fn gen_reply(rng: &mut impl Rng, users: &[UserData], voters: &[UserId]) -> ReplyData {
    let author = users[rng.gen_range(0..users.len())].clone();
    let (upvotes, downvotes) = pick_voters(rng, voters);
    let mut reply = ReplyData {
        upvotes,
        downvotes,
        ..ReplyData::default()
    };
    let id = ReplyId(Uuid::new_v4().to_string());
    match rng.gen_bool(0.8) {
        true => {
            reply.mongo_id = Some(id);
            reply.user = Some(author);
            reply.text = Some(gen_text(rng));
            reply.created_at = Some(gen_stamp(rng));
        }
        false => {
            reply.id = Some(id);
            reply.author = Some(author);
            reply.content = Some(gen_text(rng));
            reply.timestamp = Some(gen_stamp(rng));
        }
    }
    reply
}

fn gen_comment(rng: &mut impl Rng, users: &[UserData], voters: &[UserId]) -> CommentData {
    let author = users[rng.gen_range(0..users.len())].clone();
    let (upvotes, downvotes) = pick_voters(rng, voters);
    let mut comment = CommentData {
        upvotes,
        downvotes,
        ..CommentData::default()
    };
    let id = CommentId(Uuid::new_v4().to_string());
    match rng.gen_bool(0.8) {
        true => {
            comment.mongo_id = Some(id);
            comment.user = Some(author);
            comment.text = Some(gen_text(rng));
            comment.created_at = Some(gen_stamp(rng));
        }
        false => {
            comment.id = Some(id);
            comment.author = Some(author);
            comment.content = Some(gen_text(rng));
            comment.timestamp = Some(gen_stamp(rng));
        }
    }
    // some endpoints leave the replies array out entirely
    comment.replies = match rng.gen_bool(0.75) {
        true => Some(
            (0..rng.gen_range(0..MAX_REPLIES_PER_COMMENT))
                .map(|_| gen_reply(rng, users, voters))
                .collect(),
        ),
        false => None,
    };
    comment
}

fn main() {
    let mut rng = rand::thread_rng();

    // Generate the user pool
    let users: Vec<UserData> = (0..NUM_USERS).map(|_| gen_user(&mut rng)).collect();
    let voters: Vec<UserId> = users.iter().map(user_id).collect();

    // Generate posts with their comment trees
    let posts: Vec<PostData> = (0..NUM_POSTS)
        .map(|_| {
            let id = PostId(Uuid::new_v4().to_string());
            let mut post = PostData::default();
            match rng.gen_bool(0.8) {
                true => post.mongo_id = Some(id),
                false => post.id = Some(id),
            }
            post.comments = (0..rng.gen_range(1..MAX_COMMENTS_PER_POST))
                .map(|_| gen_comment(&mut rng, &users, &voters))
                .collect();
            post
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&posts).expect("serializing fixture posts")
    );
}
