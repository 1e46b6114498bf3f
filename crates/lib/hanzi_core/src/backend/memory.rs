use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AuthProvider, ImageStore, ObjectStore, SignUp, SignUpOutcome, WordStore};
use crate::error::{Error, Result};
use crate::models::{Image, NewWord, Session, User, Word, WordFilter, WordPatch};

/// Lifetime of sessions minted by the in-memory provider.
const SESSION_TTL_SECS: i64 = 3600;

/// Minimum password length enforced on sign-up.
const MIN_PASSWORD_LEN: usize = 6;

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct State {
    /// email → (password, user)
    accounts: HashMap<String, (String, User)>,
    /// access token → user id
    access_tokens: HashMap<String, String>,
    /// refresh token → user id
    refresh_tokens: HashMap<String, String>,
    words: Vec<Word>,
    images: Vec<Image>,
    objects: HashMap<String, StoredObject>,
    recovery_requests: Vec<String>,
    last_created_at: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing creation timestamps so ordering is total.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }

    fn mint_session(&mut self, user: User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens
            .insert(access_token.clone(), user.id.clone());
        self.refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());
        Session {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(SESSION_TTL_SECS),
            user,
        }
    }

    fn user_by_id(&self, id: &str) -> Option<User> {
        self.accounts
            .values()
            .find(|(_, u)| u.id == id)
            .map(|(_, u)| u.clone())
    }

    /// The user id behind a session, as row-level security would see it.
    fn caller(&self, session: &Session) -> Result<String> {
        self.access_tokens
            .get(&session.access_token)
            .cloned()
            .ok_or(Error::Unauthenticated)
    }
}

/// In-process backend for tests and offline runs.
///
/// Applies the same user scoping as the hosted backend: rows are only visible
/// to, and mutable by, the user whose session created them.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    public_base: Arc<str>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            public_base: Arc::from("memory://vocab-images"),
        }
    }

    /// Registers an account directly, bypassing the sign-up flow.
    pub async fn add_account(&self, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        self.state
            .lock()
            .await
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        user
    }

    /// A stored object, if present.
    pub async fn object(&self, path: &str) -> Option<StoredObject> {
        self.state.lock().await.objects.get(path).cloned()
    }

    pub async fn object_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.lock().await.objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Addresses that asked for a password reset, oldest first.
    pub async fn recovery_requests(&self) -> Vec<String> {
        self.state.lock().await.recovery_requests.clone()
    }

    /// Invalidates every access token, as an expiry on the server would.
    pub async fn revoke_access_tokens(&self) {
        self.state.lock().await.access_tokens.clear();
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state.lock().await;
        let user = match state.accounts.get(email) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => return Err(Error::Auth("Invalid login credentials".into())),
        };
        Ok(state.mint_session(user))
    }

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome> {
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Auth(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&request.email) {
            return Err(Error::Auth("User already registered".into()));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: request.email.clone(),
        };
        state.accounts.insert(
            request.email.clone(),
            (request.password.clone(), user.clone()),
        );
        let session = state.mint_session(user.clone());
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_tokens.remove(&session.access_token);
        state.refresh_tokens.remove(&session.refresh_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let state = self.state.lock().await;
        state
            .access_tokens
            .get(access_token)
            .and_then(|id| state.user_by_id(id))
            .ok_or(Error::Unauthenticated)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let mut state = self.state.lock().await;
        let user_id = state.refresh_tokens.remove(refresh_token);
        let user = user_id
            .and_then(|id| state.user_by_id(&id))
            .ok_or_else(|| Error::Auth("Invalid Refresh Token".into()))?;
        Ok(state.mint_session(user))
    }

    async fn recover(&self, email: &str) -> Result<()> {
        // Unknown addresses succeed too, so account existence is not revealed.
        self.state
            .lock()
            .await
            .recovery_requests
            .push(email.to_string());
        Ok(())
    }
}

#[async_trait]
impl WordStore for MemoryBackend {
    async fn select_words(&self, session: &Session, filter: &WordFilter) -> Result<Vec<Word>> {
        let state = self.state.lock().await;
        let uid = state.caller(session)?;
        let mut words: Vec<Word> = state
            .words
            .iter()
            .filter(|w| w.user_id == uid && filter.matches(w))
            .cloned()
            .collect();
        words.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(words)
    }

    async fn insert_word(&self, session: &Session, word: &NewWord) -> Result<Word> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        let row = Word {
            id: Uuid::new_v4().to_string(),
            user_id: uid,
            hanzi: word.hanzi.clone(),
            pinyin: word.pinyin.clone(),
            meaning_th: word.meaning_th.clone(),
            hsk_level: word.hsk_level,
            image_url: word.image_url.clone(),
            created_at: state.next_created_at(),
        };
        state.words.push(row.clone());
        Ok(row)
    }

    async fn update_word(&self, session: &Session, id: &str, patch: &WordPatch) -> Result<Word> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        let word = state
            .words
            .iter_mut()
            .find(|w| w.id == id && w.user_id == uid)
            .ok_or_else(|| Error::Store(format!("word {id} not found")))?;
        patch.apply(word);
        Ok(word.clone())
    }

    async fn delete_word(&self, session: &Session, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        let before = state.words.len();
        state.words.retain(|w| !(w.id == id && w.user_id == uid));
        if state.words.len() == before {
            return Err(Error::Store(format!("word {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageStore for MemoryBackend {
    async fn select_images(&self, session: &Session) -> Result<Vec<Image>> {
        let state = self.state.lock().await;
        let uid = state.caller(session)?;
        let mut images: Vec<Image> = state
            .images
            .iter()
            .filter(|i| i.user_id == uid)
            .cloned()
            .collect();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(images)
    }

    async fn insert_image(&self, session: &Session, image_url: &str) -> Result<Image> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        let row = Image {
            id: Uuid::new_v4().to_string(),
            user_id: uid,
            image_url: image_url.to_string(),
            created_at: state.next_created_at(),
        };
        state.images.push(row.clone());
        Ok(row)
    }

    async fn delete_image(&self, session: &Session, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        let before = state.images.len();
        state.images.retain(|i| !(i.id == id && i.user_id == uid));
        if state.images.len() == before {
            return Err(Error::Store(format!("image {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        session: &Session,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let uid = state.caller(session)?;
        if !path.starts_with(&format!("{uid}/")) {
            return Err(Error::Store(format!(
                "path {path} is outside the caller's folder"
            )));
        }
        if !upsert && state.objects.contains_key(path) {
            return Err(Error::Store(format!("object {path} already exists")));
        }
        state.objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }

    async fn remove(&self, session: &Session, path: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.caller(session)?;
        state.objects.remove(path);
        Ok(())
    }
}
