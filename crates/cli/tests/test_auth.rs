//! Tests for `plansync auth --token` against a local HTTP endpoint

use plansync_cli::commands::auth::run_set_token;
use plansync_cli::context::Context;
use plansync_cli::session::FileSession;
use plansync_core::PlansyncConfig;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `response` to every connection and returns the base URL.
async fn serve(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

fn context(url: String, dir: &std::path::Path) -> Context {
    let mut config = PlansyncConfig::default();
    config.backend.url = url;
    config.backend.timeout_secs = 5;
    Context::new(config, Arc::new(FileSession::in_dir(dir))).unwrap()
}

#[tokio::test]
async fn rejected_token_fails_and_stores_nothing() {
    let url = serve("HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(url, tmp.path());

    let err = run_set_token(&ctx, "bad-token").await.unwrap_err();

    assert!(err.to_string().contains("did not accept"));
    assert!(ctx.session.load().is_none());
}

#[tokio::test]
async fn auth_endpoint_error_is_reported() {
    let url = serve(
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\noops",
    )
    .await;
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(url, tmp.path());

    let err = run_set_token(&ctx, "token").await.unwrap_err();

    assert!(err.to_string().contains("HTTP 500"));
    assert!(ctx.session.load().is_none());
}
