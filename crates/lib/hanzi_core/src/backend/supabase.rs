//! Hosted backend over REST.
//!
//! Speaks three dialects on one base URL:
//!
//! | Concern        | Prefix         | Notes                                            |
//! |----------------|----------------|--------------------------------------------------|
//! | Identity       | `/auth/v1`     | password grant, refresh grant, signup, recover   |
//! | Relational     | `/rest/v1`     | `eq.`/`ilike.` filters, `Prefer: return=representation` |
//! | Object storage | `/storage/v1`  | `x-upsert` uploads, public URLs, prefix deletes  |
//!
//! Every request carries the project's anon key as `apikey`; requests made on
//! behalf of a user carry the session's access token as a bearer token so the
//! backend's row-level security applies.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{AuthProvider, ImageStore, ObjectStore, SignUp, SignUpOutcome, WordStore};
use crate::config::{AppConfig, endpoint};
use crate::error::{Error, Result};
use crate::models::{Image, NewWord, Session, User, Word, WordFilter, WordPatch};

/// Per-request deadline for backend calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const WORDS_TABLE: &str = "words";
const IMAGES_TABLE: &str = "vocab_images";

/// REST client for the hosted backend.
#[derive(Clone, Debug)]
pub struct SupabaseBackend {
    client: Client,
    base: Url,
    anon_key: String,
    bucket: String,
}

impl SupabaseBackend {
    pub fn new(base: Url, anon_key: impl Into<String>, bucket: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base,
            anon_key: anon_key.into(),
            bucket: bucket.into(),
        })
    }

    /// Builds a backend from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let base = config
            .backend_url
            .clone()
            .ok_or_else(|| Error::Config("SUPABASE_URL is not configured".into()))?;
        let anon_key = config
            .backend_anon_key
            .clone()
            .ok_or_else(|| Error::Config("SUPABASE_ANON_KEY is not configured".into()))?;
        Self::new(base, anon_key, config.image_bucket.clone())
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base, path)
    }

    /// Attaches `apikey` and the bearer token (the anon key when no session).
    fn authorize(&self, req: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(self.anon_key.as_str()))
    }

    fn table(&self, table: &str) -> String {
        self.url(&format!("rest/v1/{table}"))
    }

    fn object_path(&self, path: &str) -> String {
        self.url(&format!("storage/v1/object/{}/{}", self.bucket, path))
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<SignUpData<'a>>,
}

#[derive(Serialize)]
struct SignUpData<'a> {
    username: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Signup answers with a token response when confirmation is off, or the bare
/// user when an email confirmation is pending.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

#[derive(Serialize)]
struct WordInsert<'a> {
    #[serde(flatten)]
    word: &'a NewWord,
    user_id: &'a str,
}

#[derive(Serialize)]
struct ImageInsert<'a> {
    user_id: &'a str,
    image_url: &'a str,
}

#[derive(Serialize)]
struct RemoveObjects<'a> {
    prefixes: [&'a str; 1],
}

/// Error bodies differ per service; take the first descriptive field present.
#[derive(Deserialize, Default)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

// =============================================================================
// Response handling
// =============================================================================

/// Which service answered, for error classification.
#[derive(Clone, Copy)]
enum Service {
    Auth,
    Rest,
    Storage,
}

async fn failure(service: Service, resp: Response) -> Error {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::message)
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                text
            }
        });
    debug!(status = status.as_u16(), %message, "backend request failed");

    match (service, status) {
        (Service::Auth, _) => Error::Auth(message),
        (_, StatusCode::UNAUTHORIZED) => Error::Unauthenticated,
        _ => Error::Store(message),
    }
}

async fn expect_json<T: DeserializeOwned>(service: Service, resp: Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(failure(service, resp).await);
    }
    Ok(resp.json::<T>().await?)
}

async fn expect_ok(service: Service, resp: Response) -> Result<()> {
    if !resp.status().is_success() {
        return Err(failure(service, resp).await);
    }
    Ok(())
}

/// First row of a `return=representation` answer, or a not-found store error.
fn single<T>(rows: Vec<T>, what: &str, id: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::Store(format!("{what} {id} not found")))
}

/// `ilike` pattern for a literal substring.
///
/// The server turns every `*` into `%`, so a literal `*` cannot be escaped; it
/// is sent as `_` and callers narrow the rows with [`WordFilter::matches`].
fn ilike_contains(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "_");
    format!("ilike.*{escaped}*")
}

// =============================================================================
// Identity
// =============================================================================

#[async_trait]
impl AuthProvider for SupabaseBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let req = self
            .client
            .post(self.url("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password });
        let resp = self.authorize(req, None).send().await?;
        let token: TokenResponse = expect_json(Service::Auth, resp).await?;
        Ok(token.into_session())
    }

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome> {
        let body = SignUpRequest {
            email: &request.email,
            password: &request.password,
            data: request
                .username
                .as_deref()
                .map(|username| SignUpData { username }),
        };
        let req = self.client.post(self.url("auth/v1/signup")).json(&body);
        let resp = self.authorize(req, None).send().await?;
        let outcome = match expect_json::<SignUpResponse>(Service::Auth, resp).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            SignUpResponse::User(user) => SignUpOutcome {
                user,
                session: None,
            },
        };
        Ok(outcome)
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let req = self.client.post(self.url("auth/v1/logout"));
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        expect_ok(Service::Auth, resp).await
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let req = self.client.get(self.url("auth/v1/user"));
        let resp = self.authorize(req, Some(access_token)).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthenticated);
        }
        expect_json(Service::Auth, resp).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let req = self
            .client
            .post(self.url("auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token });
        let resp = self.authorize(req, None).send().await?;
        let token: TokenResponse = expect_json(Service::Auth, resp).await?;
        Ok(token.into_session())
    }

    async fn recover(&self, email: &str) -> Result<()> {
        let req = self
            .client
            .post(self.url("auth/v1/recover"))
            .json(&RecoverRequest { email });
        let resp = self.authorize(req, None).send().await?;
        expect_ok(Service::Auth, resp).await
    }
}

// =============================================================================
// Tables
// =============================================================================

#[async_trait]
impl WordStore for SupabaseBackend {
    async fn select_words(&self, session: &Session, filter: &WordFilter) -> Result<Vec<Word>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", session.user.id)),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(q) = filter.effective_query() {
            params.push(("hanzi", ilike_contains(q)));
        }
        let req = self.client.get(self.table(WORDS_TABLE)).query(&params);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let mut words: Vec<Word> = expect_json(Service::Rest, resp).await?;
        if filter.effective_query().is_some_and(|q| q.contains('*')) {
            words.retain(|w| filter.matches(w));
        }
        Ok(words)
    }

    async fn insert_word(&self, session: &Session, word: &NewWord) -> Result<Word> {
        let row = WordInsert {
            word,
            user_id: &session.user.id,
        };
        let req = self
            .client
            .post(self.table(WORDS_TABLE))
            .header("Prefer", "return=representation")
            .json(&[row]);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let rows: Vec<Word> = expect_json(Service::Rest, resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Store("insert returned no row".into()))
    }

    async fn update_word(&self, session: &Session, id: &str, patch: &WordPatch) -> Result<Word> {
        let req = self
            .client
            .patch(self.table(WORDS_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let rows: Vec<Word> = expect_json(Service::Rest, resp).await?;
        single(rows, "word", id)
    }

    async fn delete_word(&self, session: &Session, id: &str) -> Result<()> {
        let req = self
            .client
            .delete(self.table(WORDS_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let rows: Vec<Word> = expect_json(Service::Rest, resp).await?;
        single(rows, "word", id).map(|_| ())
    }
}

#[async_trait]
impl ImageStore for SupabaseBackend {
    async fn select_images(&self, session: &Session) -> Result<Vec<Image>> {
        let req = self.client.get(self.table(IMAGES_TABLE)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", session.user.id)),
            ("order", "created_at.desc".to_string()),
        ]);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        expect_json(Service::Rest, resp).await
    }

    async fn insert_image(&self, session: &Session, image_url: &str) -> Result<Image> {
        let row = ImageInsert {
            user_id: &session.user.id,
            image_url,
        };
        let req = self
            .client
            .post(self.table(IMAGES_TABLE))
            .header("Prefer", "return=representation")
            .json(&[row]);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let rows: Vec<Image> = expect_json(Service::Rest, resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Store("insert returned no row".into()))
    }

    async fn delete_image(&self, session: &Session, id: &str) -> Result<()> {
        let req = self
            .client
            .delete(self.table(IMAGES_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        let rows: Vec<Image> = expect_json(Service::Rest, resp).await?;
        single(rows, "image", id).map(|_| ())
    }
}

// =============================================================================
// Object storage
// =============================================================================

#[async_trait]
impl ObjectStore for SupabaseBackend {
    async fn upload(
        &self,
        session: &Session,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        debug!(path, size = bytes.len(), content_type, "uploading object");
        let req = self
            .client
            .post(self.object_path(path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes);
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        expect_ok(Service::Storage, resp).await
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&format!("storage/v1/object/public/{}/{}", self.bucket, path))
    }

    async fn remove(&self, session: &Session, path: &str) -> Result<()> {
        let req = self
            .client
            .delete(self.url(&format!("storage/v1/object/{}", self.bucket)))
            .json(&RemoveObjects { prefixes: [path] });
        let resp = self
            .authorize(req, Some(&session.access_token))
            .send()
            .await?;
        if let Err(e) = expect_ok(Service::Storage, resp).await {
            warn!(path, error = %e, "object removal rejected");
            return Err(e);
        }
        Ok(())
    }
}
