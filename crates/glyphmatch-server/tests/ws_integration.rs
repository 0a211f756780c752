mod common;

use serde_json::json;

use common::{
    TestServer, await_signal, create_room, fetch_snapshot, invoke, join_room, player_json,
    read_response, read_signal, rules_json, wait_for_room_gone, wait_for_snapshot, ws_connect,
};

#[tokio::test]
async fn create_room_returns_generated_code() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(4, 21), None).await;
    assert_eq!(room_id.len(), 6);
    assert!(room_id.chars().all(|c| c.is_ascii_alphanumeric()));

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["hostId"], "p1");
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn custom_room_id_conflict_is_rejected() {
    let server = TestServer::new().await;
    let mut first = ws_connect(&server.ws_url()).await;
    let mut second = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut first, "p1", "Alice", rules_json(4, 21), Some("FRIENDS")).await;
    assert_eq!(room_id, "FRIENDS");

    invoke(
        &mut second,
        "CreateRoom",
        vec![player_json("p2", "Bob"), rules_json(4, 21), json!("FRIENDS")],
    )
    .await;
    let response = read_response(&mut second).await;
    assert_eq!(response["error"], "RoomIdInUse");

    // The first room is untouched
    let snapshot = fetch_snapshot(&server.base_url(), "FRIENDS").await;
    assert_eq!(snapshot["hostId"], "p1");
}

#[tokio::test]
async fn join_notifies_peers_with_update() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(4, 21), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;

    assert_eq!(read_signal(&mut host).await, "Update");
    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn join_unknown_room_creates_it_with_joiner_as_host() {
    let server = TestServer::new().await;
    let mut client = ws_connect(&server.ws_url()).await;

    join_room(&mut client, "p1", "Alice", "NOSUCH").await;

    let snapshot = fetch_snapshot(&server.base_url(), "NOSUCH").await;
    assert_eq!(snapshot["hostId"], "p1");
    assert_eq!(snapshot["inProgress"], false);
}

#[tokio::test]
async fn malformed_frames_get_invalid_data_and_connection_survives() {
    let server = TestServer::new().await;
    let mut client = ws_connect(&server.ws_url()).await;

    for bad in [
        "not json at all",
        r#"{"message":"invoke","args":["NoSuchCommand"]}"#,
        r#"{"message":"invoke","args":["ContinueRound"]}"#,
        r#"{"message":"other","args":[]}"#,
    ] {
        use futures::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client
            .send(Message::Text(bad.to_string().into()))
            .await
            .unwrap();
        let response = read_response(&mut client).await;
        assert_eq!(response["error"], "InvalidData", "for frame: {bad}");
    }

    // The connection still works after every rejected frame
    let room_id = create_room(&mut client, "p1", "Alice", rules_json(4, 21), None).await;
    assert_eq!(room_id.len(), 6);
}

#[tokio::test]
async fn invalid_player_payload_rejected() {
    let server = TestServer::new().await;
    let mut client = ws_connect(&server.ws_url()).await;

    invoke(
        &mut client,
        "CreateRoom",
        vec![player_json("", "NoId"), rules_json(4, 21), json!(null)],
    )
    .await;
    let response = read_response(&mut client).await;
    assert_eq!(response["error"], "InvalidUserData");
}

#[tokio::test]
async fn start_game_notifies_room_and_deals_cards() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(2, 10), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;

    invoke(&mut host, "StartGame", vec![]).await;
    await_signal(&mut host, "Started").await;
    await_signal(&mut peer, "Started").await;

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["inProgress"], true);
    assert!(!snapshot["currentCard"].is_null(), "master card exposed");
    for player in snapshot["players"].as_array().unwrap() {
        assert!(!player["currentCard"].is_null(), "player dealt a card");
    }
}

#[tokio::test]
async fn non_host_cannot_start_the_game() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(2, 10), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;

    invoke(&mut peer, "StartGame", vec![]).await;
    let response = read_response(&mut peer).await;
    assert_eq!(response["error"], "NotAHost");

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["inProgress"], false);
}

#[tokio::test]
async fn leave_room_updates_peers() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(4, 21), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;
    assert_eq!(read_signal(&mut host).await, "Update");

    invoke(&mut peer, "LeaveRoom", vec![]).await;
    assert_eq!(read_signal(&mut host).await, "Update");

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["players"][0]["id"], "p1");
}

#[tokio::test]
async fn closing_last_connection_removes_the_room() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(4, 21), None).await;
    drop(host);

    wait_for_room_gone(&server.base_url(), &room_id).await;
}

#[tokio::test]
async fn raising_player_cap_promotes_spectator() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(1, 10), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["spectators"].as_array().unwrap().len(), 1);

    invoke(
        &mut host,
        "UpdateGameRules",
        vec![rules_json(2, 10), json!(room_id.clone())],
    )
    .await;

    let snapshot = wait_for_snapshot(&server.base_url(), &room_id, |s| {
        s["gameRules"]["maxPlayers"] == 2
    })
    .await;
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["spectators"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn update_player_renames_and_notifies() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(4, 21), None).await;
    invoke(
        &mut host,
        "UpdatePlayerData",
        vec![player_json("p1", "Alicia"), json!(room_id.clone())],
    )
    .await;
    assert_eq!(read_signal(&mut host).await, "Update");

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["players"][0]["username"], "Alicia");
}

#[tokio::test]
async fn end_game_returns_room_to_lobby() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let mut peer = ws_connect(&server.ws_url()).await;

    let room_id = create_room(&mut host, "p1", "Alice", rules_json(2, 10), None).await;
    join_room(&mut peer, "p2", "Bob", &room_id).await;
    invoke(&mut host, "StartGame", vec![]).await;
    await_signal(&mut peer, "Started").await;

    // Non-host first: rejected
    invoke(&mut peer, "EndGame", vec![]).await;
    let response = read_response(&mut peer).await;
    assert_eq!(response["error"], "NotAHost");

    invoke(&mut host, "EndGame", vec![]).await;
    await_signal(&mut peer, "Update").await;

    let snapshot = fetch_snapshot(&server.base_url(), &room_id).await;
    assert_eq!(snapshot["inProgress"], false);
    assert_eq!(snapshot["inSummary"], false);
    for player in snapshot["players"].as_array().unwrap() {
        assert_eq!(player["score"], 0);
        assert!(player["currentCard"].is_null());
    }
}
