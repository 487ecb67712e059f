//! Session lifecycle: new game, play, exit, restart.

mod common;

use std::time::{Duration, Instant};

use nh_bridge::engine::LoopExit;
use nh_bridge::host::HostEvent;
use nh_bridge::queue::WAIT_SLICE;
use nh_bridge::{ExitReason, SessionEnd, SessionFlags};
use serial_test::serial;

use common::harness;

/// Two wait slices plus room for the unwind and the join.
const EXIT_BOUND: Duration = WAIT_SLICE.saturating_mul(5);

#[test]
#[serial]
fn test_new_game_reaches_key_wait() {
    let mut h = harness();
    h.start();
    let shared = h.shared();

    assert_eq!(shared.game_ready_count(), 1);
    assert!(shared.map().painted() > 0);
    assert!(shared.messages().contains("welcome to NetHack!"));

    let snap = shared.snapshot.read();
    assert_eq!(snap.turn_number, 1);
    assert_eq!(snap.player_hp, snap.player_hp_max);
    assert_eq!(snap.dungeon_level, 1);
    assert!(snap.stairs_up.is_set());
    assert!(snap.stairs_down.is_set());
    assert!(snap.fountain.is_set());

    let events = h.bridge.pump_events();
    assert_eq!(events.iter().filter(|e| **e == HostEvent::GameReady).count(), 1);
    assert!(events.contains(&HostEvent::TurnComplete { moves: 1 }));

    assert_eq!(h.stop(), SessionEnd::Exited(ExitReason::Exited(0)));
}

#[test]
#[serial]
fn test_moves_advance_turns_and_walls_block() {
    let mut h = harness();
    h.start();

    h.send("h");
    let p = h.probe.projection();
    assert_eq!((p.x, p.y, p.moves), (11, 5, 2));

    // (10, 5) is the west wall.
    h.send("h");
    let p = h.probe.projection();
    assert_eq!((p.x, p.moves), (11, 2));
    assert_eq!(h.shared().snapshot.read().turn_number, 2);

    h.send("s");
    assert_eq!(h.probe.projection().moves, 3);
    h.stop();
}

#[test]
#[serial]
fn test_game_ready_fires_once_per_session() {
    let mut h = harness();
    h.start();
    h.send_each("ss.");
    assert_eq!(h.shared().game_ready_count(), 1);
    h.stop();
}

#[test]
#[serial]
fn test_quit_ends_the_move_loop() {
    let mut h = harness();
    h.start();
    h.push("#quit\ny");
    assert_eq!(h.join(), SessionEnd::Loop(LoopExit::Quit));
    assert!(h.probe.report().ext_cmd_results.contains(&1));
}

#[test]
#[serial]
fn test_shutdown_and_reinit_leave_no_residue() {
    let mut h = harness();
    h.start();
    h.send("l");
    h.stop();

    let generation = h.heap.generation();
    assert!(h.heap.stats().used > 0);
    h.bridge.full_shutdown();
    h.bridge.full_init().unwrap();
    assert_eq!(h.heap.stats().used, 0);
    assert_eq!(h.heap.generation(), generation + 1);

    let shared = h.shared();
    assert!(shared.death().is_empty());
    assert!(!shared.flags.has_died());
    assert!(!shared.input.has_pending());
    assert_eq!(shared.render_len(), 0);
    assert_eq!(shared.game_ready_count(), 0);
    let windows = h.bridge.parked_windows().unwrap();
    assert!(windows.menu().is_empty());

    h.start();
    assert_eq!(h.shared().game_ready_count(), 1);
    assert_eq!(h.probe.projection().moves, 1);
    h.stop();
}

#[test]
#[serial]
fn test_repeated_exit_requests_stop_promptly() {
    let mut h = harness();
    h.start();

    for _ in 0..4 {
        h.bridge.request_exit();
    }
    let asked = Instant::now();
    h.bridge.request_exit();
    let end = h.bridge.wait_for_engine(Duration::from_secs(1)).unwrap();
    let took = asked.elapsed();
    assert!(took < EXIT_BOUND, "engine took {took:?} to stop");
    assert_eq!(end, Some(SessionEnd::Exited(ExitReason::Exited(0))));

    h.bridge.request_exit();
    assert_eq!(h.bridge.wait_for_engine(Duration::from_millis(10)).unwrap(), None);
}

#[test]
#[serial]
fn test_exit_flag_seen_on_next_wait_slice() {
    let mut h = harness();
    h.start();

    // No wake-up byte: the engine notices on its own timed wait.
    let asked = Instant::now();
    SessionFlags::set(&h.shared().flags.game_should_exit, true);
    let end = h.bridge.wait_for_engine(Duration::from_secs(1)).unwrap();
    let took = asked.elapsed();
    assert!(took < EXIT_BOUND, "engine took {took:?} to stop");
    assert_eq!(end, Some(SessionEnd::Exited(ExitReason::Exited(0))));
}

#[test]
#[serial]
fn test_new_game_after_exit_boots_fresh_engine() {
    let mut h = harness();
    h.start();
    h.send_each("ll");
    h.stop();

    h.start();
    let p = h.probe.projection();
    assert_eq!((p.x, p.y, p.moves), (12, 5, 1));
    h.stop();
}
