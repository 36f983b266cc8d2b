use parvis_api::{UserData, UserId};

/// What an entity shows as its author when the payload gives us nothing
/// usable. The app is French-facing, the literal is part of the contract.
pub const FALLBACK_AUTHOR_NAME: &str = "Vous";

/// Display identity of a comment or reply author, resolved once at mapping
/// time so nothing downstream ever has to look at the raw payload shapes
/// again.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorSnapshot {
    pub id: Option<UserId>,
    pub display_name: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthorSnapshot {
    pub fn anonymous() -> AuthorSnapshot {
        AuthorSnapshot {
            id: None,
            display_name: String::from(FALLBACK_AUTHOR_NAME),
            username: None,
            avatar_url: None,
        }
    }

    /// Resolves the duck-typed author of a payload. The `user` record wins
    /// over `author` when both are present, then within the chosen record
    /// each field falls back through the spellings the backend historically
    /// used, first non-empty one wins.
    pub fn from_sources(user: Option<&UserData>, author: Option<&UserData>) -> AuthorSnapshot {
        let source = match user.or(author) {
            Some(source) => source,
            None => return AuthorSnapshot::anonymous(),
        };
        let display_name = match (filled(&source.first_name), filled(&source.last_name)) {
            (None, None) => filled(&source.name)
                .unwrap_or(FALLBACK_AUTHOR_NAME)
                .to_string(),
            (first, last) => first.into_iter().chain(last).collect::<Vec<_>>().join(" "),
        };
        AuthorSnapshot {
            id: source.mongo_id.clone().or_else(|| source.id.clone()),
            display_name,
            username: filled(&source.username)
                .or_else(|| filled(&source.handle))
                .map(String::from),
            avatar_url: filled(&source.profile_picture)
                .or_else(|| filled(&source.avatar))
                .map(String::from),
        }
    }
}

/// `Some` only for present and non-empty fields. The backend's other
/// clients treat empty strings as absent, so the fallback chains must too.
fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(v: serde_json::Value) -> UserData {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn user_record_wins_over_author_record() {
        let user_rec = user(serde_json::json!({ "firstName": "Ada", "lastName": "Lovelace" }));
        let author_rec = user(serde_json::json!({ "name": "Babbage" }));
        let snapshot = AuthorSnapshot::from_sources(Some(&user_rec), Some(&author_rec));
        assert_eq!(snapshot.display_name, "Ada Lovelace");
        let snapshot = AuthorSnapshot::from_sources(None, Some(&author_rec));
        assert_eq!(snapshot.display_name, "Babbage");
    }

    #[test]
    fn display_name_falls_back_in_order() {
        let cases = [
            (serde_json::json!({ "firstName": "Ada" }), "Ada"),
            (serde_json::json!({ "lastName": "Lovelace" }), "Lovelace"),
            (serde_json::json!({ "firstName": "", "name": "Grace" }), "Grace"),
            (serde_json::json!({ "name": "" }), "Vous"),
            (serde_json::json!({}), "Vous"),
        ];
        for (payload, expected) in cases {
            let snapshot = AuthorSnapshot::from_sources(Some(&user(payload)), None);
            assert_eq!(snapshot.display_name, expected);
        }
        assert_eq!(AuthorSnapshot::from_sources(None, None).display_name, "Vous");
    }

    #[test]
    fn empty_strings_never_win_a_fallback() {
        let u = user(serde_json::json!({
            "profilePicture": "",
            "avatar": "/img/a.png",
            "username": "",
            "handle": "ada",
        }));
        let snapshot = AuthorSnapshot::from_sources(Some(&u), None);
        assert_eq!(snapshot.avatar_url.as_deref(), Some("/img/a.png"));
        assert_eq!(snapshot.username.as_deref(), Some("ada"));
    }

    #[test]
    fn id_prefers_the_mongo_spelling() {
        let u = user(serde_json::json!({ "_id": "u1", "id": "u2" }));
        let snapshot = AuthorSnapshot::from_sources(Some(&u), None);
        assert_eq!(snapshot.id, Some(UserId(String::from("u1"))));
    }
}
