//! Tokens and profile claims, and how they live in a session.

use chrono::{DateTime, Utc};
use frontgate_session::Session;
use serde::{Deserialize, Serialize};

/// Session keys written by the authentication flow.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const ID_TOKEN: &str = "id_token";
    pub const SESSION_STATE: &str = "session_state";
    pub const SUBJECT: &str = "subject";
    pub const EMAIL: &str = "email";
    pub const FAMILY_NAME: &str = "family_name";
    pub const GIVEN_NAME: &str = "given_name";
    pub const NAME: &str = "name";
    pub const PREFERRED_USERNAME: &str = "preferred_username";

    /// Keys holding tokens.
    pub const TOKENS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, ID_TOKEN, SESSION_STATE];

    /// Keys holding profile claims.
    pub const PROFILE: [&str; 6] = [
        SUBJECT,
        EMAIL,
        FAMILY_NAME,
        GIVEN_NAME,
        NAME,
        PREFERRED_USERNAME,
    ];
}

/// Tokens issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// The provider's `session_state`, when it sends one.
    pub session_state: Option<String>,
}

impl TokenSet {
    #[must_use]
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            refresh_token: None,
            id_token: None,
            session_state: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }

    #[must_use]
    pub fn with_session_state(mut self, session_state: Option<String>) -> Self {
        self.session_state = session_state;
        self
    }

    /// Reads the tokens stored in a session, if it holds an access token.
    #[must_use]
    pub fn from_session(session: &Session) -> Option<Self> {
        let access_token = session.get_str(keys::ACCESS_TOKEN)?.to_string();
        Some(Self {
            access_token,
            refresh_token: session.get_str(keys::REFRESH_TOKEN).map(str::to_string),
            id_token: session.get_str(keys::ID_TOKEN).map(str::to_string),
            session_state: session.get_str(keys::SESSION_STATE).map(str::to_string),
        })
    }

    /// Writes the tokens into a session.
    ///
    /// Absent optional tokens keep whatever the session already holds, so a
    /// refresh response without a new refresh token keeps the old one.
    pub fn write_to(&self, session: &mut Session) {
        session.put(keys::ACCESS_TOKEN, self.access_token.as_str());
        if let Some(refresh_token) = &self.refresh_token {
            session.put(keys::REFRESH_TOKEN, refresh_token.as_str());
        }
        if let Some(id_token) = &self.id_token {
            session.put(keys::ID_TOKEN, id_token.as_str());
        }
        if let Some(session_state) = &self.session_state {
            session.put(keys::SESSION_STATE, session_state.as_str());
        }
    }
}

/// Profile claims kept in the session after login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn new(subject: String) -> Self {
        Self {
            subject,
            ..Self::default()
        }
    }

    /// Reads the profile stored in a session.
    #[must_use]
    pub fn from_session(session: &Session) -> Option<Self> {
        let read = |key: &str| session.get_str(key).map(str::to_string);
        Some(Self {
            subject: read(keys::SUBJECT)?,
            email: read(keys::EMAIL),
            family_name: read(keys::FAMILY_NAME),
            given_name: read(keys::GIVEN_NAME),
            name: read(keys::NAME),
            preferred_username: read(keys::PREFERRED_USERNAME),
        })
    }

    /// Writes the claims into a session, removing claims the provider no
    /// longer sends.
    pub fn write_to(&self, session: &mut Session) {
        session.put(keys::SUBJECT, self.subject.as_str());
        let optional = [
            (keys::EMAIL, &self.email),
            (keys::FAMILY_NAME, &self.family_name),
            (keys::GIVEN_NAME, &self.given_name),
            (keys::NAME, &self.name),
            (keys::PREFERRED_USERNAME, &self.preferred_username),
        ];
        for (key, value) in optional {
            match value {
                Some(value) => {
                    session.put(key, value.as_str());
                }
                None => {
                    session.delete(key);
                }
            }
        }
    }
}

/// Outcome of presenting an access token to the introspection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Introspection {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Introspection {
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            expires_at: None,
        }
    }

    /// Returns true if the token is active and not past its expiry.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.active && self.expires_at.is_none_or(|exp| exp > Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_set_round_trips_through_session() {
        let tokens = TokenSet::new("at".to_string())
            .with_refresh_token(Some("rt".to_string()))
            .with_id_token(Some("it".to_string()))
            .with_session_state(Some("ss".to_string()));
        let mut session = Session::fresh();
        tokens.write_to(&mut session);

        assert_eq!(TokenSet::from_session(&session), Some(tokens));
    }

    #[test]
    fn refresh_without_new_refresh_token_keeps_old_one() {
        let mut session = Session::fresh();
        TokenSet::new("at1".to_string())
            .with_refresh_token(Some("rt1".to_string()))
            .write_to(&mut session);

        TokenSet::new("at2".to_string()).write_to(&mut session);

        assert_eq!(session.get_str(keys::ACCESS_TOKEN), Some("at2"));
        assert_eq!(session.get_str(keys::REFRESH_TOKEN), Some("rt1"));
    }

    #[test]
    fn no_tokens_without_access_token() {
        let mut session = Session::fresh();
        session.put(keys::REFRESH_TOKEN, "rt");
        assert_eq!(TokenSet::from_session(&session), None);
    }

    #[test]
    fn profile_write_drops_stale_claims() {
        let mut session = Session::fresh();
        let mut profile = UserProfile::new("sub-1".to_string());
        profile.email = Some("alice@example.com".to_string());
        profile.name = Some("Alice".to_string());
        profile.write_to(&mut session);

        let mut updated = UserProfile::new("sub-1".to_string());
        updated.name = Some("Alice A.".to_string());
        updated.write_to(&mut session);

        assert!(!session.contains(keys::EMAIL));
        assert_eq!(UserProfile::from_session(&session), Some(updated));
    }

    #[test]
    fn profile_serializes_without_absent_claims() {
        let mut profile = UserProfile::new("sub-1".to_string());
        profile.given_name = Some("Alice".to_string());
        let json = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"subject": "sub-1", "given_name": "Alice"})
        );
    }

    #[test]
    fn introspection_usability() {
        assert!(!Introspection::inactive().is_usable());
        assert!(
            Introspection {
                active: true,
                expires_at: None
            }
            .is_usable()
        );
        assert!(
            !Introspection {
                active: true,
                expires_at: Some(Utc::now() - Duration::seconds(1))
            }
            .is_usable()
        );
    }
}
