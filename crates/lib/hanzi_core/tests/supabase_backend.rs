//! Wire contract of the hosted backend client, checked against a fake server.

mod common;

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use hanzi_core::Error;
use hanzi_core::backend::supabase::SupabaseBackend;
use hanzi_core::backend::{AuthProvider, ObjectStore, WordStore};
use hanzi_core::models::{NewWord, WordFilter};
use serde_json::{Value, json};

#[derive(Default)]
struct Seen {
    word_queries: Vec<Vec<(String, String)>>,
    inserted: Vec<Value>,
    uploads: Vec<(String, String, String, usize)>,
    removed: Vec<Value>,
    authorization: Vec<String>,
}

type Shared = Arc<Mutex<Seen>>;

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn word_row(id: &str, hanzi: &str) -> Value {
    json!({
        "id": id,
        "user_id": "u1",
        "hanzi": hanzi,
        "pinyin": null,
        "meaning_th": "เรียน",
        "hsk_level": 1,
        "image_url": null,
        "created_at": "2024-05-01T10:00:00+00:00"
    })
}

async fn token(
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(header(&headers, "apikey"), "anon-key");
    let grant = params
        .iter()
        .find(|(k, _)| k == "grant_type")
        .map(|(_, v)| v.as_str());
    let ok = match grant {
        Some("password") => body["password"] == "password1",
        Some("refresh_token") => body["refresh_token"] == "r1",
        _ => false,
    };
    if !ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {"id": "u1", "email": "mali@example.com"}
        })),
    )
}

fn router(seen: Shared) -> Router {
    Router::new()
        .route("/auth/v1/token", post(token))
        .route(
            "/rest/v1/words",
            get(
                |State(seen): State<Shared>,
                 headers: HeaderMap,
                 Query(params): Query<Vec<(String, String)>>| async move {
                    let single_char = params.iter().any(|(k, v)| k == "hanzi" && v == "ilike.*A_B*");
                    let mut seen = seen.lock().unwrap();
                    seen.authorization.push(header(&headers, "authorization"));
                    seen.word_queries.push(params);
                    if single_char {
                        // What `_` matches server-side: any one character.
                        return Json(json!([word_row("w5", "AxB"), word_row("w4", "a*b")]));
                    }
                    Json(json!([word_row("w2", "你好"), word_row("w1", "学习")]))
                },
            )
            .post(
                |State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(header(&headers, "prefer"), "return=representation");
                    let row = body[0].clone();
                    seen.lock().unwrap().inserted.push(row.clone());
                    if row["meaning_th"] == "reject" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"code": "23514", "message": "check constraint violated"})),
                        );
                    }
                    (StatusCode::CREATED, Json(json!([word_row("w3", row["hanzi"].as_str().unwrap_or_default())])))
                },
            ),
        )
        .route(
            "/storage/v1/object/{bucket}/{*path}",
            post(
                |State(seen): State<Shared>,
                 Path((bucket, path)): Path<(String, String)>,
                 headers: HeaderMap,
                 body: Bytes| async move {
                    assert_eq!(bucket, "vocab-images");
                    seen.lock().unwrap().uploads.push((
                        path.clone(),
                        header(&headers, "content-type"),
                        header(&headers, "x-upsert"),
                        body.len(),
                    ));
                    Json(json!({"Key": format!("{bucket}/{path}")}))
                },
            ),
        )
        .route(
            "/storage/v1/object/{bucket}",
            axum::routing::delete(|State(seen): State<Shared>, Json(body): Json<Value>| async move {
                seen.lock().unwrap().removed.push(body);
                Json(json!([]))
            }),
        )
        .with_state(seen)
}

async fn backend() -> (SupabaseBackend, Shared) {
    let seen = Shared::default();
    let base = common::serve(router(seen.clone())).await;
    (
        SupabaseBackend::new(base, "anon-key", "vocab-images").unwrap(),
        seen,
    )
}

#[tokio::test]
async fn password_sign_in_yields_a_session() {
    let (backend, _) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();
    assert_eq!(session.user.id, "u1");
    assert_eq!(session.access_token, "a1");
    assert!(!session.is_expired());
}

#[tokio::test]
async fn bad_credentials_are_an_auth_error_with_the_servers_message() {
    let (backend, _) = backend().await;
    let err = backend.sign_in("mali@example.com", "nope").await.unwrap_err();
    assert!(matches!(err, Error::Auth(m) if m == "Invalid login credentials"));
}

#[tokio::test]
async fn refresh_uses_the_refresh_grant() {
    let (backend, _) = backend().await;
    assert!(backend.refresh("r1").await.is_ok());
    assert!(matches!(backend.refresh("stale").await, Err(Error::Auth(_))));
}

#[tokio::test]
async fn word_listing_is_scoped_ordered_and_filtered() {
    let (backend, seen) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();

    let words = backend
        .select_words(&session, &WordFilter::query(" 学 "))
        .await
        .unwrap();
    assert_eq!(words.len(), 2);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.authorization, vec!["Bearer a1"]);
    let params = &seen.word_queries[0];
    let has = |k: &str, v: &str| params.iter().any(|(pk, pv)| pk == k && pv == v);
    assert!(has("user_id", "eq.u1"));
    assert!(has("order", "created_at.desc"));
    assert!(has("hanzi", "ilike.*学*"));
}

#[tokio::test]
async fn insert_sends_owner_and_omits_absent_fields() {
    let (backend, seen) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();

    let word = backend
        .insert_word(&session, &NewWord::new("猫", "แมว"))
        .await
        .unwrap();
    assert_eq!(word.id, "w3");

    let inserted = seen.lock().unwrap().inserted[0].clone();
    assert_eq!(inserted, json!({"hanzi": "猫", "meaning_th": "แมว", "user_id": "u1"}));
}

#[tokio::test]
async fn rejected_insert_is_a_store_error() {
    let (backend, _) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();
    let err = backend
        .insert_word(&session, &NewWord::new("猫", "reject"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(m) if m == "check constraint violated"));
}

#[tokio::test]
async fn upload_and_remove_objects() {
    let (backend, seen) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();

    backend
        .upload(&session, "u1/1700000000000.png", vec![1, 2, 3], "image/png", true)
        .await
        .unwrap();
    backend.remove(&session, "u1/1700000000000.png").await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.uploads,
        vec![(
            "u1/1700000000000.png".to_string(),
            "image/png".to_string(),
            "true".to_string(),
            3
        )]
    );
    assert_eq!(seen.removed, vec![json!({"prefixes": ["u1/1700000000000.png"]})]);
    assert!(
        backend
            .public_url("u1/1700000000000.png")
            .ends_with("/storage/v1/object/public/vocab-images/u1/1700000000000.png")
    );
}

#[tokio::test]
async fn literal_asterisk_in_query_matches_only_itself() {
    let (backend, _) = backend().await;
    let session = backend.sign_in("mali@example.com", "password1").await.unwrap();

    let words = backend
        .select_words(&session, &WordFilter::query("A*B"))
        .await
        .unwrap();
    let ids: Vec<_> = words.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["w4"]);
}
