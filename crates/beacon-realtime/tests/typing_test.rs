//! Typing indicators: full-list broadcasts and self-expiry.

mod support;

use beacon_core::config::realtime::RealtimeConfig;
use beacon_database::stores::TypingStore;
use beacon_realtime::message::{ErrorCode, ServerMessage};

use support::{admin, connect, drain, engine, engine_with_config, stores, user};

#[tokio::test]
async fn typing_start_notifies_everyone_but_the_typist() {
    let stores = stores();
    let engine = engine(&stores);
    let (boss, mut boss_rx) = connect(engine.manager(), Some(admin())).await;
    let alice = user();
    let (member, mut member_rx) = connect(engine.manager(), Some(alice.clone())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    drain(&mut boss_rx);
    drain(&mut member_rx);

    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"typing:start","room_name":"ops"}"#)
        .await;

    match drain(&mut boss_rx).as_slice() {
        [ServerMessage::TypingEvent {
            room_name,
            thread_id: None,
            users,
        }] => {
            assert_eq!(room_name, "ops");
            assert_eq!(users.len(), 1);
            assert_eq!(users[0].user_id, alice.user_id);
        }
        other => panic!("expected typing:event, got {other:?}"),
    }
    assert!(drain(&mut member_rx).is_empty());
}

#[tokio::test]
async fn typist_lists_grow_in_start_order_and_shrink_on_stop() {
    let stores = stores();
    let engine = engine(&stores);
    let chief = admin();
    let (boss, mut boss_rx) = connect(engine.manager(), Some(chief.clone())).await;
    let alice = user();
    let (member, mut member_rx) = connect(engine.manager(), Some(alice.clone())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    drain(&mut boss_rx);
    drain(&mut member_rx);

    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"typing:start","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"typing:start","room_name":"ops"}"#)
        .await;

    // The second start shows the member both typists, oldest first.
    match drain(&mut member_rx).as_slice() {
        [ServerMessage::TypingEvent { users, .. }] => {
            assert_eq!(users.len(), 2);
            assert_eq!(users[0].user_id, alice.user_id);
            assert_eq!(users[1].user_id, chief.user_id);
        }
        other => panic!("expected typing:event, got {other:?}"),
    }

    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"typing:stop","room_name":"ops"}"#)
        .await;

    // Events to the boss: the member's start, then the post-stop list.
    match drain(&mut boss_rx).as_slice() {
        [
            ServerMessage::TypingEvent { users: first, .. },
            ServerMessage::TypingEvent { users: second, .. },
        ] => {
            assert_eq!(first.len(), 1);
            assert_eq!(second.len(), 1);
            assert_eq!(second[0].user_id, chief.user_id);
        }
        other => panic!("expected two typing events, got {other:?}"),
    }
}

#[tokio::test]
async fn stopping_an_indicator_that_never_started_is_silent() {
    let stores = stores();
    let engine = engine(&stores);
    let (boss, mut boss_rx) = connect(engine.manager(), Some(admin())).await;
    let (member, mut member_rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    drain(&mut boss_rx);
    drain(&mut member_rx);

    engine
        .manager()
        .handle_frame(member.id, r#"{"id":9,"op":"typing:stop","room_name":"ops"}"#)
        .await;

    assert!(drain(&mut boss_rx).is_empty());
    assert!(matches!(
        drain(&mut member_rx).as_slice(),
        [ServerMessage::Ack {
            id: 9,
            success: true,
            ..
        }]
    ));
}

#[tokio::test]
async fn threads_scope_their_own_typist_lists() {
    let stores = stores();
    let engine = engine(&stores);
    let (boss, mut boss_rx) = connect(engine.manager(), Some(admin())).await;
    let alice = user();
    let (member, mut member_rx) = connect(engine.manager(), Some(alice.clone())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    drain(&mut boss_rx);
    drain(&mut member_rx);

    engine
        .manager()
        .handle_frame(
            member.id,
            r#"{"op":"typing:start","room_name":"ops","thread_id":"8c2f6c35-8a93-4b69-ac6e-6f25e05a8be7"}"#,
        )
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"typing:start","room_name":"ops"}"#)
        .await;

    match drain(&mut boss_rx).as_slice() {
        [
            ServerMessage::TypingEvent {
                thread_id: Some(_),
                users: threaded,
                ..
            },
            ServerMessage::TypingEvent {
                thread_id: None,
                users: room_level,
                ..
            },
        ] => {
            assert_eq!(threaded.len(), 1);
            assert_eq!(room_level.len(), 1);
        }
        other => panic!("expected scoped typing events, got {other:?}"),
    }
}

#[tokio::test]
async fn typing_requires_auth_and_a_real_room() {
    let stores = stores();
    let engine = engine(&stores);
    let (anon, mut anon_rx) = connect(engine.manager(), None).await;
    let (member, mut member_rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(anon.id, r#"{"id":1,"op":"typing:start","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"id":2,"op":"typing:start","room_name":"nowhere"}"#)
        .await;

    match drain(&mut anon_rx).as_slice() {
        [ServerMessage::Ack {
            success: false,
            error: Some(error),
            ..
        }] => assert_eq!(error.code, ErrorCode::AuthRequired),
        other => panic!("expected failed ack, got {other:?}"),
    }
    match drain(&mut member_rx).as_slice() {
        [ServerMessage::Ack {
            success: false,
            error: Some(error),
            ..
        }] => assert_eq!(error.code, ErrorCode::RoomNotFound),
        other => panic!("expected failed ack, got {other:?}"),
    }
}

#[tokio::test]
async fn indicators_expire_without_an_explicit_stop() {
    let stores = stores();
    let engine = engine_with_config(
        &stores,
        RealtimeConfig {
            typing_ttl_seconds: 0,
            ..Default::default()
        },
    );
    let (boss, mut boss_rx) = connect(engine.manager(), Some(admin())).await;
    let (member, _member_rx) = connect(engine.manager(), Some(user())).await;

    engine
        .manager()
        .handle_frame(boss.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"room:join","room_name":"ops"}"#)
        .await;
    drain(&mut boss_rx);

    engine
        .manager()
        .handle_frame(member.id, r#"{"op":"typing:start","room_name":"ops"}"#)
        .await;

    // A zero TTL lapses immediately, so the broadcast list is already empty.
    match drain(&mut boss_rx).as_slice() {
        [ServerMessage::TypingEvent { users, .. }] => assert!(users.is_empty()),
        other => panic!("expected typing:event, got {other:?}"),
    }
    assert_eq!(stores.sweep().await.unwrap(), 1);
}
