//! The C entry points, driven the way a host application drives them.

mod common;

use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use libc::c_char;
use nh_bridge::GameSnapshot;
use nh_bridge::exports::*;
use nh_test::{SimProbe, sim_factory};
use serial_test::serial;

use common::{STEP_TIMEOUT, init_logging};

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + STEP_TIMEOUT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn take_string(p: *mut c_char) -> Option<String> {
    if p.is_null() {
        return None;
    }
    let s = unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned();
    unsafe { nhb_free_string(p) };
    Some(s)
}

fn snapshot() -> GameSnapshot {
    let mut out = MaybeUninit::<GameSnapshot>::uninit();
    assert_eq!(unsafe { nhb_get_snapshot(out.as_mut_ptr()) }, 0);
    unsafe { out.assume_init() }
}

#[test]
#[serial]
fn test_host_plays_saves_and_shuts_down() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let docs = CString::new(dir.path().to_str().unwrap()).unwrap();
    let probe = Arc::new(SimProbe::new());

    assert_eq!(unsafe { nhb_full_init(docs.as_ptr(), std::ptr::null()) }, -1);
    install_engine_factory(sim_factory(probe.clone()));
    assert_eq!(unsafe { nhb_full_init(docs.as_ptr(), std::ptr::null()) }, 0);
    assert_eq!(nhb_is_initialized(), 1);
    assert_eq!(nhb_save_exists(), 0);

    let name = CString::new("Brynn").unwrap();
    assert_eq!(unsafe { nhb_new_game(name.as_ptr(), 11, 0, 1, 0) }, 0);
    wait_until("first key wait", || probe.polls() > 0);
    assert_eq!(snapshot().turn_number, 1);

    let keys = CString::new("l").unwrap();
    assert_eq!(unsafe { nhb_queue_string(keys.as_ptr()) }, 1);
    wait_until("the move", || probe.projection().moves == 2);
    wait_until("the next key wait", || snapshot().turn_number == 2);
    assert_eq!(nhb_status_turns(), 2);
    assert_eq!(nhb_status_hp(), 16);
    assert!(nhb_pump_events() > 0);

    assert_eq!(nhb_quicksave(), 1);
    assert_eq!(nhb_save_exists(), 1);
    assert_eq!(nhb_player_has_died(), 0);
    assert!(take_string(nhb_death_message()).unwrap().is_empty());

    let history = take_string(nhb_message_history_json()).unwrap();
    assert!(history.contains("Hello Brynn"), "{history}");

    nhb_request_exit();
    assert_eq!(nhb_wait_for_engine(5_000), 1);
    assert_eq!(nhb_wait_for_engine(10), 0);

    nhb_full_shutdown();
    assert_eq!(nhb_is_initialized(), 0);
    assert_eq!(nhb_queue_input(i32::from(b'l')), -1);
    assert!(take_string(nhb_status_name()).is_none());
    assert_eq!(unsafe { nhb_wipe_saves(docs.as_ptr()) }, 0);
}
