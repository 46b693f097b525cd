// tests/callback_server_tests.rs

use std::time::Duration;

use gitvault_core::auth::callback_server::start_callback_server;

#[tokio::test]
async fn callback_delivers_code_and_state() {
    let (port, done_rx, shutdown_tx) = start_callback_server(0).await.unwrap();
    assert_ne!(port, 0);

    let url = format!("http://127.0.0.1:{}/?code=abc123&state=xyz", port);
    let response = reqwest::get(&url).await.unwrap();
    assert!(response.status().is_success());
    let body = response.text().await.unwrap();
    assert!(body.contains("Authentication Successful"));

    let result = tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.code.as_deref(), Some("abc123"));
    assert_eq!(result.state.as_deref(), Some("xyz"));
    assert!(result.error.is_none());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn callback_delivers_denial_errors() {
    let (port, done_rx, shutdown_tx) = start_callback_server(0).await.unwrap();

    let url = format!(
        "http://127.0.0.1:{}/?error=access_denied&error_description=user+said+no",
        port
    );
    let response = reqwest::get(&url).await.unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("Authentication Failed"));

    let result = tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.error.as_deref(), Some("access_denied"));
    assert!(result.code.is_none());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn two_servers_bind_distinct_ephemeral_ports() {
    let (port_a, _rx_a, shutdown_a) = start_callback_server(0).await.unwrap();
    let (port_b, _rx_b, shutdown_b) = start_callback_server(0).await.unwrap();
    assert_ne!(port_a, port_b);
    let _ = shutdown_a.send(());
    let _ = shutdown_b.send(());
}
