use parvis_api::{AuthToken, Error, UserData, UserId};

use crate::author::AuthorSnapshot;

/// Who is using the app, if anyone. Handed to the dispatcher at construction
/// so nothing in the core ever reads ambient storage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    pub token: Option<AuthToken>,
    pub user: Option<UserData>,
}

impl Session {
    pub fn logged_in(token: AuthToken, user: UserData) -> Session {
        Session {
            token: Some(token),
            user: Some(user),
        }
    }

    pub fn anonymous() -> Session {
        Session {
            token: None,
            user: None,
        }
    }

    /// The token to authenticate requests with. `AuthRequired` when the user
    /// never logged in; checking this before any optimistic transition keeps
    /// the failure at zero network cost.
    pub fn credential(&self) -> Result<&AuthToken, Error> {
        self.token.as_ref().ok_or(Error::AuthRequired)
    }

    /// The current user's id, through the same id fallback chain the
    /// payloads use.
    pub fn user_id(&self) -> Option<UserId> {
        let user = self.user.as_ref()?;
        user.mongo_id.clone().or_else(|| user.id.clone())
    }

    /// What the current user looks like as the author of a reply the server
    /// has not acknowledged yet.
    pub fn author_snapshot(&self) -> AuthorSnapshot {
        AuthorSnapshot::from_sources(self.user.as_ref(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sessions_have_no_credential() {
        assert_eq!(Session::anonymous().credential(), Err(Error::AuthRequired));
        let session = Session::logged_in(AuthToken::stub(), UserData::default());
        assert_eq!(session.credential(), Ok(&AuthToken::stub()));
    }

    #[test]
    fn author_snapshot_comes_from_the_profile() {
        let user: UserData = serde_json::from_value(serde_json::json!({
            "_id": "u1",
            "firstName": "Jean",
            "lastName": "Valjean",
        }))
        .unwrap();
        let session = Session::logged_in(AuthToken::stub(), user);
        assert_eq!(session.user_id(), Some(UserId(String::from("u1"))));
        let snapshot = session.author_snapshot();
        assert_eq!(snapshot.display_name, "Jean Valjean");
        assert_eq!(snapshot.id, Some(UserId(String::from("u1"))));

        assert_eq!(Session::anonymous().author_snapshot().display_name, "Vous");
        assert_eq!(Session::anonymous().user_id(), None);
    }
}
