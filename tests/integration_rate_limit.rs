use axum::http::StatusCode;
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_rate_limit_isolation() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 2;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let user_a = "1.1.1.1";
    let user_b = "2.2.2.2";

    for i in 1..=2 {
        let resp = app
            .client
            .get(format!("{}/v1/rooms", app.server_url))
            .bearer_auth(&token)
            .header("X-Forwarded-For", user_a)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "Request {i} for User A should succeed");
    }

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", user_a)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "User A should now be blocked");

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", user_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "User B should be unaffected");
}

#[tokio::test]
async fn test_create_tier_is_stricter_than_standard() {
    let mut config = common::get_test_config();
    config.rate_limit.create_per_second = 1;
    config.rate_limit.create_burst = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let resp = app.open_room(&token, &serde_json::json!({ "counterpart_id": Uuid::new_v4() })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.open_room(&token, &serde_json::json!({ "counterpart_id": Uuid::new_v4() })).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after = resp.headers().get("retry-after");
    assert!(retry_after.is_some(), "Retry-After header should be present");

    // The standard tier keeps its own bucket
    for _ in 0..5 {
        let resp = app.client.get(format!("{}/v1/rooms", app.server_url)).bearer_auth(&token).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "Standard tier should not be affected by create exhaustion");
    }
}

#[tokio::test]
async fn test_rate_limit_proxy_chain() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 2;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let chain = "9.9.9.9, 1.1.1.1, 2.2.2.2";

    for _ in 0..2 {
        let resp = app
            .client
            .get(format!("{}/v1/rooms", app.server_url))
            .bearer_auth(&token)
            .header("X-Forwarded-For", chain)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", "different.spoof, 2.2.2.2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should block based on the rightmost untrusted IP");
}

#[tokio::test]
async fn test_rate_limit_concurrency() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 2;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let mut tasks = vec![];
    let client = Client::new();

    for i in 0..20 {
        let url = app.server_url.clone();
        let c = client.clone();
        let t = token.clone();
        tasks.push(tokio::spawn(async move {
            let ip = format!("10.10.10.{i}");
            c.get(format!("{url}/v1/rooms")).bearer_auth(&t).header("X-Forwarded-For", ip).send().await.unwrap()
        }));
    }

    for res in join_all(tasks).await {
        let resp = res.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "All concurrent unique IPs should succeed");
    }
}

#[tokio::test]
async fn test_rate_limit_fallback_to_peer_ip() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 2;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    for _ in 0..2 {
        let resp = app.client.get(format!("{}/v1/rooms", app.server_url)).bearer_auth(&token).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = app.client.get(format!("{}/v1/rooms", app.server_url)).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should have fallen back to local peer IP and blocked");
}

#[tokio::test]
async fn test_rate_limit_spoofing_protection() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let spoofed_ip = "1.2.3.4";
    let real_attacker_ip = "5.6.7.8";

    let _ = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", format!("{spoofed_ip}, {real_attacker_ip}"))
        .send()
        .await
        .unwrap();

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", format!("9.9.9.9, {real_attacker_ip}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should block based on real IP, ignoring the spoofed part");

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", spoofed_ip)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "The spoofed IP itself should not be affected");
}

#[tokio::test]
async fn test_rate_limit_recovery() {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = 1;
    config.rate_limit.burst = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let token = app.mint_token(Uuid::new_v4());

    let ip = "5.5.5.5";

    let _ = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", ip)
        .send()
        .await
        .unwrap();

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", ip)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should be blocked initially");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let resp = app
        .client
        .get(format!("{}/v1/rooms", app.server_url))
        .bearer_auth(&token)
        .header("X-Forwarded-For", ip)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "Should be unblocked after wait");
}
