//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use hanzi_core::auth::SessionManager;
use hanzi_core::backend::memory::MemoryBackend;
use hanzi_core::config::parse_base_url;
use url::Url;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    parse_base_url(&format!("http://{addr}")).expect("base url")
}

/// A URL on which nothing is listening.
pub async fn dead_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    parse_base_url(&format!("http://{addr}")).expect("base url")
}

/// In-memory backend with one signed-in user.
pub async fn signed_in() -> (MemoryBackend, Arc<SessionManager>) {
    let backend = MemoryBackend::new();
    let session = sign_in_on(&backend).await;
    (backend, session)
}

/// Registers a user on `backend` and signs them in.
pub async fn sign_in_on(backend: &MemoryBackend) -> Arc<SessionManager> {
    backend.add_account("mali@example.com", "password1").await;
    let session = Arc::new(SessionManager::in_memory(Arc::new(backend.clone())));
    session
        .sign_in("mali@example.com", "password1")
        .await
        .expect("sign in");
    session
}
