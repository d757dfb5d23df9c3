#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]

mod common;

use common::TestApp;
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn test_unread_counts_track_each_side() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_token = app.mint_token(alice);
    let bob_token = app.mint_token(bob);
    let room_id = app.open_room_with(&alice_token, bob).await;

    app.send_text(&alice_token, room_id, "one").await;
    app.send_text(&alice_token, room_id, "two").await;

    // Own messages never count against the sender
    let rooms = app.list_rooms(&alice_token).await;
    assert_eq!(rooms[0]["unread_count"], 0);

    let rooms = app.list_rooms(&bob_token).await;
    assert_eq!(rooms[0]["unread_count"], 2);

    app.send_text(&bob_token, room_id, "three").await;
    let rooms = app.list_rooms(&alice_token).await;
    assert_eq!(rooms[0]["unread_count"], 1);
    let rooms = app.list_rooms(&bob_token).await;
    assert_eq!(rooms[0]["unread_count"], 2);
}

#[tokio::test]
async fn test_mark_read_flips_counterpart_messages_once() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_token = app.mint_token(alice);
    let bob_token = app.mint_token(bob);
    let room_id = app.open_room_with(&alice_token, bob).await;

    app.send_text(&alice_token, room_id, "one").await;
    app.send_text(&alice_token, room_id, "two").await;
    app.send_text(&bob_token, room_id, "reply").await;

    let marked = app.mark_read(&bob_token, room_id).await;
    assert_eq!(marked["marked"], 2);

    // Idempotent: nothing left to flip
    let marked = app.mark_read(&bob_token, room_id).await;
    assert_eq!(marked["marked"], 0);

    let rooms = app.list_rooms(&bob_token).await;
    assert_eq!(rooms[0]["unread_count"], 0);

    // Bob's read receipt does not touch Alice's side
    let rooms = app.list_rooms(&alice_token).await;
    assert_eq!(rooms[0]["unread_count"], 1);

    // History shows the flipped flags
    let messages: Vec<Value> = app.list_messages(&bob_token, room_id, "").await.json().await.unwrap();
    assert!(messages.iter().filter(|m| m["sender_id"] == alice.to_string()).all(|m| m["is_read"] == true));
    assert!(messages.iter().filter(|m| m["sender_id"] == bob.to_string()).all(|m| m["is_read"] == false));
}

#[tokio::test]
async fn test_mark_read_is_participants_only() {
    let app = TestApp::spawn().await;
    let alice_token = app.mint_token(Uuid::new_v4());
    let room_id = app.open_room_with(&alice_token, Uuid::new_v4()).await;

    let stranger_token = app.mint_token(Uuid::new_v4());
    let resp = app
        .client
        .patch(format!("{}/v1/rooms/{room_id}/read", app.server_url))
        .bearer_auth(&stranger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .patch(format!("{}/v1/rooms/999999/read", app.server_url))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_detail_unread_matches_list_unread() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_token = app.mint_token(alice);
    let bob_token = app.mint_token(bob);
    let room_id = app.open_room_with(&alice_token, bob).await;

    for i in 0..3 {
        app.send_text(&alice_token, room_id, &format!("ping {i}")).await;
    }

    let detail: Value = app
        .client
        .get(format!("{}/v1/rooms/{room_id}", app.server_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["unread_count"], 3);

    let rooms = app.list_rooms(&bob_token).await;
    assert_eq!(rooms[0]["unread_count"], detail["unread_count"]);
}
