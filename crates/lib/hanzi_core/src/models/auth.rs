//! Identity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// An authenticated session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// True once the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_at,
            user: User {
                id: "u1".into(),
                email: "a@b.c".into(),
            },
        }
    }

    #[test]
    fn debug_output_hides_tokens() {
        let s = session(Utc::now());
        let printed = format!("{s:?}");
        assert!(printed.contains("u1"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn expiry_is_checked_against_now() {
        assert!(session(Utc::now() - chrono::Duration::seconds(1)).is_expired());
        assert!(!session(Utc::now() + chrono::Duration::hours(1)).is_expired());
    }
}
