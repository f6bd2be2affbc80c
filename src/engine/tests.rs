//! Tests for the sync engine, driven through a console keypad

use super::*;
use crate::color::Color;
use crate::device::{ButtonKind, ConsoleKeypad, DeviceCommand};
use crate::keys::{KeyIndex, KeyState, KEY_COUNT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

fn key(index: usize) -> KeyIndex {
    KeyIndex::new(index).unwrap()
}

/// Spawn an engine on a console keypad and consume the initial resync
async fn setup() -> (Arc<ConsoleKeypad>, EngineHandle) {
    let keypad = Arc::new(ConsoleKeypad::quiet("test-keypad"));
    let handle = SyncEngine::spawn(keypad.clone(), EngineSettings::default())
        .await
        .unwrap();

    let initial = keypad.wait_for_commands(KEY_COUNT).await;
    assert_eq!(initial.len(), KEY_COUNT);
    assert!(initial
        .iter()
        .all(|c| matches!(c, DeviceCommand::SetLightOff { .. })));

    (keypad, handle)
}

/// Round-trip through the actor so every earlier request has been pushed
async fn settle(handle: &EngineHandle) -> Vec<KeyState> {
    handle.snapshot().await
}

fn expected_push(index: usize, state: &KeyState) -> DeviceCommand {
    if state.on {
        DeviceCommand::SetLight { key: key(index), color: state.color }
    } else {
        DeviceCommand::SetLightOff { key: key(index) }
    }
}

#[tokio::test]
async fn test_initial_state() {
    let (_keypad, handle) = setup().await;

    let snapshot = settle(&handle).await;
    assert_eq!(snapshot.len(), KEY_COUNT);
    assert!(snapshot.iter().all(|s| *s == KeyState::default()));
    assert!(!handle.is_identifying().await);
}

#[tokio::test]
async fn test_read_after_write() {
    let (_keypad, handle) = setup().await;

    handle.set_light(key(7), LightUpdate::Value(25.0));
    let state = handle.key_state(key(7)).await.unwrap();

    assert_eq!(state.color.value(), 25.0);
    assert!(!state.on);
}

#[tokio::test]
async fn test_push_follows_on_flag() {
    let (keypad, handle) = setup().await;

    handle.set_light(key(0), LightUpdate::Hue(240.0));
    handle.set_light(key(0), LightUpdate::On(true));
    settle(&handle).await;

    assert_eq!(
        keypad.take_commands(),
        vec![
            DeviceCommand::SetLightOff { key: key(0) },
            DeviceCommand::SetLight { key: key(0), color: Color::new(240.0, 100.0, 100.0) },
        ]
    );
}

#[tokio::test]
async fn test_idempotent_push() {
    let (keypad, handle) = setup().await;

    handle.set_light(key(2), LightUpdate::On(true));
    settle(&handle).await;
    let first = keypad.take_commands();

    handle.set_light(key(2), LightUpdate::On(true));
    settle(&handle).await;
    let second = keypad.take_commands();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_on_off_retains_color() {
    let (keypad, handle) = setup().await;

    for index in 0..KEY_COUNT {
        let hue = index as f32 * 30.0;
        handle.set_light(key(index), LightUpdate::Hue(hue));
        handle.set_light(key(index), LightUpdate::Saturation(30.0));
        handle.set_light(key(index), LightUpdate::Value(40.0));
        handle.set_light(key(index), LightUpdate::On(true));
        handle.set_light(key(index), LightUpdate::On(false));
        handle.set_light(key(index), LightUpdate::On(true));
    }

    let snapshot = settle(&handle).await;
    for (index, state) in snapshot.iter().enumerate() {
        assert!(state.on);
        assert_eq!(state.color, Color::new(index as f32 * 30.0, 30.0, 40.0));
    }

    let commands = keypad.take_commands();
    assert_eq!(commands.len(), KEY_COUNT * 6);
    for (index, pushes) in commands.chunks(6).enumerate() {
        assert_eq!(pushes[4], DeviceCommand::SetLightOff { key: key(index) });
        assert_eq!(pushes[5], expected_push(index, &snapshot[index]));
    }
}

#[tokio::test]
async fn test_last_write_wins() {
    let (keypad, handle) = setup().await;

    handle.set_light(key(5), LightUpdate::On(true));
    settle(&handle).await;
    keypad.take_commands();

    handle.set_light(key(5), LightUpdate::Hue(10.0));
    handle.set_light(key(5), LightUpdate::Hue(250.0));

    let state = handle.key_state(key(5)).await.unwrap();
    assert_eq!(state.color.hue(), 250.0);

    let commands = keypad.take_commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[1],
        DeviceCommand::SetLight { key: key(5), color: Color::new(250.0, 100.0, 100.0) }
    );
}

#[tokio::test]
async fn test_out_of_range_channels_are_clamped() {
    let (_keypad, handle) = setup().await;

    handle.set_light(key(1), LightUpdate::Hue(720.0));
    handle.set_light(key(1), LightUpdate::Saturation(-10.0));

    let state = handle.key_state(key(1)).await.unwrap();
    assert_eq!(state.color.hue(), 360.0);
    assert_eq!(state.color.saturation(), 0.0);
}

#[tokio::test]
async fn test_event_translation() {
    let (keypad, handle) = setup().await;
    let mut rx = handle.subscribe();

    keypad.press(0, ButtonKind::Single).await.unwrap();
    keypad.press(0, ButtonKind::Double).await.unwrap();
    keypad.press(0, ButtonKind::Long).await.unwrap();

    let mut codes = Vec::new();
    for _ in 0..3 {
        let notification = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(notification.key, key(0));
        codes.push(notification.event.code());
    }
    assert_eq!(codes, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_out_of_range_buttons_are_discarded() {
    let (keypad, handle) = setup().await;
    let mut rx = handle.subscribe();

    keypad.press(-1, ButtonKind::Single).await.unwrap();
    keypad.press(12, ButtonKind::Long).await.unwrap();
    keypad.press(3, ButtonKind::Double).await.unwrap();

    // The first notification is the in-range press: the others produced none
    let notification = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(
        notification,
        ButtonNotification { key: key(3), event: SwitchEvent::DoublePress }
    );
    assert!(rx.try_recv().is_err());

    // Buttons never touch light state
    let snapshot = settle(&handle).await;
    assert!(snapshot.iter().all(|s| *s == KeyState::default()));
    assert!(keypad.commands().is_empty());
}

#[tokio::test]
async fn test_presses_keep_order_per_key() {
    let (keypad, handle) = setup().await;
    let mut rx = handle.subscribe();

    let kinds = [ButtonKind::Long, ButtonKind::Single, ButtonKind::Double, ButtonKind::Single];
    for kind in kinds {
        keypad.press(9, kind).await.unwrap();
    }

    for kind in kinds {
        let notification = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(notification.event, SwitchEvent::from(kind));
    }
}

#[tokio::test]
async fn test_burst_of_presses_reaches_idle_subscriber() {
    let (keypad, handle) = setup().await;
    let mut rx = handle.subscribe();

    // Nobody reads while the burst is forwarded
    for i in 0..300 {
        keypad.press(i % 12, ButtonKind::Single).await.unwrap();
    }
    settle(&handle).await;

    let mut received = Vec::new();
    while received.len() < 300 {
        let notification = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        received.push(notification.key.get());
    }

    let expected: Vec<usize> = (0..300).map(|i| i % 12).collect();
    assert_eq!(received, expected);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_full_resync_on_connect() {
    let (keypad, handle) = setup().await;

    handle.set_light(key(0), LightUpdate::On(true));
    handle.set_light(key(4), LightUpdate::Hue(90.0));
    handle.set_light(key(4), LightUpdate::On(true));
    handle.set_light(key(11), LightUpdate::Value(10.0));
    handle.set_light(key(11), LightUpdate::On(true));
    handle.set_light(key(11), LightUpdate::On(false));
    let snapshot = settle(&handle).await;
    keypad.take_commands();

    keypad.reconnect().await.unwrap();
    let resync = timeout(Duration::from_secs(1), keypad.wait_for_commands(KEY_COUNT))
        .await
        .unwrap();

    assert_eq!(resync.len(), KEY_COUNT);
    for (index, command) in resync.iter().enumerate() {
        assert_eq!(*command, expected_push(index, &snapshot[index]));
    }

    settle(&handle).await;
    assert!(keypad.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_identify_restores_state() {
    let (keypad, handle) = setup().await;
    let stored = Color::new(120.0, 100.0, 50.0);

    handle.set_light(key(0), LightUpdate::Hue(120.0));
    handle.set_light(key(0), LightUpdate::Value(50.0));
    handle.set_light(key(0), LightUpdate::On(true));
    let before = settle(&handle).await;
    keypad.take_commands();

    let started = Instant::now();
    handle.identify();

    let overlay = keypad.wait_for_commands(KEY_COUNT).await;
    assert_eq!(overlay.len(), KEY_COUNT);
    for (index, command) in overlay.iter().enumerate() {
        assert_eq!(*command, DeviceCommand::SetLight { key: key(index), color: Color::ATTENTION });
    }

    assert!(handle.is_identifying().await);
    assert_eq!(handle.key_state(key(0)).await.unwrap().color, stored);

    let restore = keypad.wait_for_commands(KEY_COUNT).await;
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert!(!handle.is_identifying().await);
    assert_eq!(handle.key_state(key(0)).await.unwrap().color, stored);
    assert_eq!(settle(&handle).await, before);

    // Restore is the same sequence a reconnect produces
    keypad.reconnect().await.unwrap();
    let resync = keypad.wait_for_commands(KEY_COUNT).await;
    assert_eq!(restore, resync);
    assert_eq!(
        restore[0],
        DeviceCommand::SetLight { key: key(0), color: stored }
    );
}

#[tokio::test(start_paused = true)]
async fn test_light_control_during_identify_is_deferred() {
    let (keypad, handle) = setup().await;

    handle.identify();
    keypad.wait_for_commands(KEY_COUNT).await;

    handle.set_light(key(6), LightUpdate::On(true));
    handle.set_light(key(6), LightUpdate::Hue(300.0));

    // Committed immediately, not pushed
    let state = handle.key_state(key(6)).await.unwrap();
    assert!(state.on);
    assert_eq!(state.color.hue(), 300.0);
    assert!(keypad.commands().is_empty());

    let restore = keypad.wait_for_commands(KEY_COUNT).await;
    assert_eq!(restore.len(), KEY_COUNT);
    assert_eq!(
        restore[6],
        DeviceCommand::SetLight { key: key(6), color: Color::new(300.0, 100.0, 100.0) }
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_identify_restarts_timer() {
    let (keypad, handle) = setup().await;

    handle.identify();
    keypad.wait_for_commands(KEY_COUNT).await;

    tokio::time::advance(Duration::from_millis(2000)).await;
    let restarted = Instant::now();
    handle.identify();
    let overlay = keypad.wait_for_commands(KEY_COUNT).await;
    assert!(overlay
        .iter()
        .all(|c| matches!(c, DeviceCommand::SetLight { color, .. } if *color == Color::ATTENTION)));

    // Past the first deadline, still identifying
    tokio::time::advance(Duration::from_millis(1500)).await;
    assert!(handle.is_identifying().await);
    assert!(keypad.commands().is_empty());

    keypad.wait_for_commands(KEY_COUNT).await;
    assert!(restarted.elapsed() >= Duration::from_millis(3000));
    assert!(!handle.is_identifying().await);
}

#[tokio::test(start_paused = true)]
async fn test_connect_during_identify_keeps_overlay() {
    let (keypad, handle) = setup().await;

    handle.identify();
    keypad.wait_for_commands(KEY_COUNT).await;

    keypad.reconnect().await.unwrap();
    let overlay = keypad.wait_for_commands(KEY_COUNT).await;
    assert!(overlay
        .iter()
        .all(|c| matches!(c, DeviceCommand::SetLight { color, .. } if *color == Color::ATTENTION)));
    assert!(handle.is_identifying().await);

    let restore = keypad.wait_for_commands(KEY_COUNT).await;
    assert!(restore
        .iter()
        .all(|c| matches!(c, DeviceCommand::SetLightOff { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_restore() {
    let (keypad, handle) = setup().await;

    handle.identify();
    keypad.wait_for_commands(KEY_COUNT).await;

    handle.shutdown();
    while handle.is_alive() {
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(keypad.commands().is_empty());

    // The device link was stopped with the engine
    assert!(keypad.press(0, ButtonKind::Single).await.is_err());
}

#[tokio::test]
async fn test_engine_stops_when_handles_dropped() {
    let keypad = Arc::new(ConsoleKeypad::quiet("test-keypad"));
    let handle = SyncEngine::spawn(keypad.clone(), EngineSettings::default())
        .await
        .unwrap();
    keypad.wait_for_commands(KEY_COUNT).await;

    let mut rx = handle.subscribe();
    drop(handle);

    // Subscriptions end once the loop exits
    let closed = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert!(closed.is_none());
}
