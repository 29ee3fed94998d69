//! Connection lifecycle: handshake, heartbeats, caps, and recovery.

mod support;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use beacon_core::config::realtime::RealtimeConfig;
use beacon_database::stores::{ConnectionStore, PresenceStore};
use beacon_entity::presence::PresenceStatus;
use beacon_realtime::CloseReason;
use beacon_realtime::bridge::MemoryBridge;
use beacon_realtime::message::{ErrorCode, PROTOCOL_VERSION, ServerMessage};

use support::{
    admin, build_engine, connect, drain, engine, engine_with_config, stores, user, wait_for_event,
};

#[tokio::test]
async fn authenticated_accept_announces_presence_then_handshakes() {
    let stores = stores();
    let engine = engine(&stores);
    let alice = user();

    let (handle, mut rx) = engine
        .manager()
        .accept(Some(alice.clone()), None, None)
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        ServerMessage::PresenceChanged { user_id, status: PresenceStatus::Online, .. }
            if *user_id == alice.user_id
    ));
    match &events[1] {
        ServerMessage::Connected {
            socket_id,
            protocol_version,
            ..
        } => {
            assert_eq!(*socket_id, handle.id);
            assert_eq!(protocol_version, PROTOCOL_VERSION);
        }
        other => panic!("expected connected, got {other:?}"),
    }
    assert!(matches!(
        &events[2],
        ServerMessage::Authenticated { user_id, session_id: None }
            if *user_id == alice.user_id
    ));
}

#[tokio::test]
async fn anonymous_accept_handshakes_without_identity_events() {
    let stores = stores();
    let engine = engine(&stores);

    let (_handle, mut rx) = engine.manager().accept(None, None, None).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerMessage::Connected { .. }));
}

#[tokio::test]
async fn ping_is_answered_with_a_pong_echoing_the_timestamp() {
    let stores = stores();
    let engine = engine(&stores);
    let (handle, mut rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(handle.id, r#"{"op":"ping","timestamp":1234}"#)
        .await;

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [ServerMessage::Pong { timestamp: 1234 }]
    ));
}

#[tokio::test]
async fn ping_with_an_id_gets_both_a_pong_and_an_ack() {
    let stores = stores();
    let engine = engine(&stores);
    let (handle, mut rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(handle.id, r#"{"id":7,"op":"ping"}"#)
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ServerMessage::Pong { .. }));
    assert!(matches!(
        &events[1],
        ServerMessage::Ack {
            id: 7,
            success: true,
            ..
        }
    ));
}

#[tokio::test]
async fn ping_latency_lands_on_the_connection_row() {
    let stores = stores();
    let engine = engine(&stores);
    let (handle, _rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(handle.id, r#"{"op":"ping","latency_ms":42}"#)
        .await;

    let row = stores.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(row.latency_ms, Some(42));
    assert!(row.last_pong_at.is_some());
}

#[tokio::test]
async fn unparseable_frames_get_an_error_event() {
    let stores = stores();
    let engine = engine(&stores);
    let (handle, mut rx) = connect(engine.manager(), None).await;

    engine.manager().handle_frame(handle.id, "not json").await;
    engine
        .manager()
        .handle_frame(handle.id, r#"{"op":"admin:shutdown"}"#)
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    for event in &events {
        match event {
            ServerMessage::Error { code, message, .. } => {
                assert_eq!(*code, ErrorCode::InternalError);
                assert!(message.starts_with("Unparseable frame"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn acks_carry_the_request_id_they_answer() {
    let stores = stores();
    let engine = engine(&stores);
    let (boss, mut boss_rx) = connect(engine.manager(), Some(admin())).await;
    let (member, mut member_rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"id":5,"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"id":6,"op":"room:join","room_name":"missing"}"#)
        .await;

    match drain(&mut boss_rx).as_slice() {
        [ServerMessage::Ack {
            id: 5,
            success: true,
            data: Some(data),
            ..
        }] => {
            assert_eq!(data["room_name"], "ops");
            assert_eq!(data["member_count"], 1);
        }
        other => panic!("expected join ack, got {other:?}"),
    }
    match drain(&mut member_rx).as_slice() {
        [ServerMessage::Ack {
            id: 6,
            success: false,
            error: Some(error),
            ..
        }] => assert_eq!(error.code, ErrorCode::RoomNotFound),
        other => panic!("expected failed ack, got {other:?}"),
    }
}

#[tokio::test]
async fn connection_cap_evicts_the_oldest_local_connection() {
    let stores = stores();
    let engine = engine_with_config(
        &stores,
        RealtimeConfig {
            max_connections_per_user: 1,
            ..Default::default()
        },
    );
    let alice = user();

    let (first, mut first_rx) = connect(engine.manager(), Some(alice.clone())).await;
    let (second, _second_rx) = connect(engine.manager(), Some(alice.clone())).await;

    assert!(!first.is_alive());
    assert!(second.is_alive());

    let events = drain(&mut first_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ServerMessage::Error { code: ErrorCode::InternalError, message, .. }
            if message.contains("Connection limit reached")
    ));

    let live = stores.find_live_by_user(alice.user_id).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, second.id);

    let event = wait_for_event(&stores, "connection.closed").await;
    assert_eq!(event.payload.unwrap()["reason"], "connection_limit");
}

#[tokio::test]
async fn close_is_idempotent_and_broadcasts_offline_once() {
    let stores = stores();
    let engine = engine(&stores);
    let (_bob, mut bob_rx) = connect(engine.manager(), Some(user())).await;
    let alice = user();
    let (handle, _rx) = connect(engine.manager(), Some(alice.clone())).await;
    drain(&mut bob_rx);

    engine
        .manager()
        .close(handle.id, CloseReason::ClientDisconnect)
        .await
        .unwrap();
    engine
        .manager()
        .close(handle.id, CloseReason::ClientDisconnect)
        .await
        .unwrap();

    let events = drain(&mut bob_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ServerMessage::PresenceChanged { user_id, status: PresenceStatus::Offline, .. }
            if *user_id == alice.user_id
    ));

    let row = stores.get(alice.user_id).await.unwrap().unwrap();
    assert_eq!(row.connections_count, 0);
    assert_eq!(row.status, PresenceStatus::Offline);
}

#[tokio::test]
async fn restart_reaps_rows_the_crashed_instance_left_behind() {
    let stores = stores();
    let instance_id = Uuid::new_v4();
    let crashed = build_engine(
        &stores,
        Arc::new(MemoryBridge::new(64)),
        RealtimeConfig::default(),
        instance_id,
    );
    let alice = user();
    let bob = user();
    let (_a, _a_rx) = connect(crashed.manager(), Some(alice.clone())).await;
    let (_b, _b_rx) = connect(crashed.manager(), Some(bob.clone())).await;
    assert_eq!(stores.count_live().await.unwrap(), 2);

    let replacement = build_engine(
        &stores,
        Arc::new(MemoryBridge::new(64)),
        RealtimeConfig::default(),
        instance_id,
    );
    let reaped = replacement.manager().recover_crashed().await.unwrap();

    assert_eq!(reaped, 2);
    assert_eq!(stores.count_live().await.unwrap(), 0);
    for user_id in [alice.user_id, bob.user_id] {
        let row = stores.get(user_id).await.unwrap().unwrap();
        assert_eq!(row.status, PresenceStatus::Offline);
        assert_eq!(row.connections_count, 0);
    }
    wait_for_event(&stores, "connection.reaped").await;
}

#[tokio::test]
async fn stale_connections_are_reaped_on_heartbeat_timeout() {
    let stores = stores();
    let engine = engine_with_config(
        &stores,
        RealtimeConfig {
            heartbeat_timeout_seconds: 0,
            reaper_interval_seconds: 1,
            ..Default::default()
        },
    );
    engine.start().await.unwrap();
    let (handle, _rx) = connect(engine.manager(), Some(user())).await;

    tokio::time::sleep(Duration::from_millis(1400)).await;

    assert!(!handle.is_alive());
    let row = stores.find_by_id(handle.id).await.unwrap().unwrap();
    assert!(!row.is_live());
    wait_for_event(&stores, "connection.timeout").await;
}
