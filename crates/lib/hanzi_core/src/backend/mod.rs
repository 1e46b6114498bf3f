//! Backend seams.
//!
//! The client never talks to a service directly: repositories and the session
//! manager go through the traits below. Two implementations ship with the
//! crate:
//!
//! - [`supabase::SupabaseBackend`]: the hosted backend-as-a-service over REST
//!   (identity under `/auth/v1`, tables under `/rest/v1`, objects under `/storage/v1`).
//! - [`memory::MemoryBackend`]: an in-process stand-in with the same
//!   scoping rules, used by tests and offline runs.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Image, NewWord, Session, User, Word, WordFilter, WordPatch};

/// Credentials and profile data for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

/// Result of a sign-up. The provider may withhold the session until the
/// address is confirmed.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<Session>,
}

/// Identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Password sign-in. Bad credentials are [`Error::Auth`](crate::Error::Auth).
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome>;

    /// Revokes the session server-side.
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// Resolves the user behind an access token.
    async fn get_user(&self, access_token: &str) -> Result<User>;

    /// Exchanges a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<Session>;

    /// Sends a password-recovery email.
    async fn recover(&self, email: &str) -> Result<()>;
}

/// The `words` table. Every call is scoped to the session's user.
#[async_trait]
pub trait WordStore: Send + Sync {
    /// Newest first.
    async fn select_words(&self, session: &Session, filter: &WordFilter) -> Result<Vec<Word>>;

    async fn insert_word(&self, session: &Session, word: &NewWord) -> Result<Word>;

    /// Unknown or foreign ids are a [`Error::Store`](crate::Error::Store).
    async fn update_word(&self, session: &Session, id: &str, patch: &WordPatch) -> Result<Word>;

    /// Unknown or foreign ids are a [`Error::Store`](crate::Error::Store).
    async fn delete_word(&self, session: &Session, id: &str) -> Result<()>;
}

/// The `vocab_images` table.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Newest first.
    async fn select_images(&self, session: &Session) -> Result<Vec<Image>>;

    async fn insert_image(&self, session: &Session, image_url: &str) -> Result<Image>;

    async fn delete_image(&self, session: &Session, id: &str) -> Result<()>;
}

/// Binary object storage for a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` at `path`. With `upsert` an existing object is replaced.
    async fn upload(
        &self,
        session: &Session,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()>;

    /// Publicly resolvable URL for `path`.
    fn public_url(&self, path: &str) -> String;

    async fn remove(&self, session: &Session, path: &str) -> Result<()>;
}
