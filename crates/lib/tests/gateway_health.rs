//! Integration test: start the gateway on a free port, hit the health routes and the
//! verification handshake. Does not require Gemini or WhatsApp credentials.
//! The server task is left running when the test ends.

use balas::config::Config;
use balas::gateway;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn wait_until_up(client: &reqwest::Client, url: &str) {
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return,
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not return 200 within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn gateway_health_and_handshake() {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    // unique secret so a VERIFY_TOKEN in the environment cannot make the handshake pass
    let secret = format!("secret-{}", uuid::Uuid::new_v4());
    config.whatsapp.verify_token = Some(secret.clone());
    let env_secret = std::env::var("VERIFY_TOKEN").ok().filter(|s| !s.trim().is_empty());
    let expected_secret = env_secret.map(|s| s.trim().to_string()).unwrap_or(secret);

    let gateway_handle = tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    wait_until_up(&client, &format!("{}/", base)).await;

    let root = client.get(format!("{}/", base)).send().await.expect("GET /");
    assert_eq!(root.status(), 200);
    assert_eq!(root.text().await.expect("body"), "OK");

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("GET /health")
        .json()
        .await
        .expect("parse JSON");
    assert_eq!(health, serde_json::json!({ "ok": true }));

    let ok = client
        .get(format!("{}/webhook", base))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", expected_secret.as_str()),
            ("hub.challenge", "1158201444"),
        ])
        .send()
        .await
        .expect("GET /webhook");
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.expect("body"), "1158201444");

    let bare = client
        .get(format!("{}/webhook", base))
        .query(&[
            ("mode", "subscribe"),
            ("verify_token", expected_secret.as_str()),
            ("challenge", "42"),
        ])
        .send()
        .await
        .expect("GET /webhook");
    assert_eq!(bare.text().await.expect("body"), "42");

    let wrong = client
        .get(format!("{}/webhook", base))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "not-the-secret"),
            ("hub.challenge", "1158201444"),
        ])
        .send()
        .await
        .expect("GET /webhook");
    assert_eq!(wrong.status(), 403);

    let wrong_mode = client
        .get(format!("{}/webhook", base))
        .query(&[
            ("hub.mode", "unsubscribe"),
            ("hub.verify_token", expected_secret.as_str()),
            ("hub.challenge", "1158201444"),
        ])
        .send()
        .await
        .expect("GET /webhook");
    assert_eq!(wrong_mode.status(), 403);

    // no messages and garbage bodies are still acknowledged
    let empty = client
        .post(format!("{}/webhook", base))
        .json(&serde_json::json!({ "entry": [] }))
        .send()
        .await
        .expect("POST /webhook");
    assert_eq!(empty.status(), 200);
    let garbage = client
        .post(format!("{}/webhook", base))
        .body("not json")
        .send()
        .await
        .expect("POST /webhook");
    assert_eq!(garbage.status(), 200);

    gateway_handle.abort();
}
