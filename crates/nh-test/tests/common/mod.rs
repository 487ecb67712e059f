//! Shared harness for the end-to-end tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nh_bridge::lifecycle::SessionEnd;
use nh_bridge::{BridgeConfig, Lifecycle, SessionFlags, Shared};
use nh_heap::FixedHeap;
use nh_test::{SimProbe, sim_factory, valkyrie};
use tempfile::TempDir;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Harness {
    pub dir: TempDir,
    pub probe: Arc<SimProbe>,
    pub heap: &'static FixedHeap,
    pub bridge: Lifecycle,
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Initialized bridge over a private heap and documents root.
pub fn harness_with(tweak: impl FnOnce(&mut BridgeConfig)) -> Harness {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::new(dir.path());
    config.steps_per_second = 0;
    tweak(&mut config);

    let probe = Arc::new(SimProbe::new());
    let heap: &'static FixedHeap = Box::leak(Box::new(FixedHeap::new(1 << 22)));
    let mut bridge = Lifecycle::new(config)
        .with_heap(heap)
        .with_engine_factory(sim_factory(probe.clone()));
    bridge.full_init().unwrap();
    Harness {
        dir,
        probe,
        heap,
        bridge,
    }
}

impl Harness {
    pub fn shared(&self) -> Arc<Shared> {
        self.bridge.shared()
    }

    /// Block until the move loop polled for a key more than `before` times
    /// and is parked on the input queue.
    pub fn wait_for_key_wait(&self, before: u64) {
        let deadline = Instant::now() + STEP_TIMEOUT;
        loop {
            let waiting = SessionFlags::get(&self.shared().flags.awaiting_input);
            if self.probe.polls() > before && waiting {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "engine never came back for input (polls {})",
                self.probe.polls()
            );
            thread::sleep(Duration::from_millis(2));
        }
    }

    pub fn start(&mut self) {
        let before = self.probe.polls();
        self.bridge.new_game(valkyrie()).unwrap();
        self.wait_for_key_wait(before);
    }

    /// Queue `keys` as one command and wait for the next key prompt.
    pub fn send(&self, keys: &str) {
        let before = self.probe.polls();
        assert_eq!(self.shared().input.push_str(keys), keys.len());
        self.wait_for_key_wait(before);
    }

    /// Send each key as its own command.
    pub fn send_each(&self, keys: &str) {
        for key in keys.chars() {
            self.send(&key.to_string());
        }
    }

    /// Queue `keys` without waiting for the engine.
    pub fn push(&self, keys: &str) {
        assert_eq!(self.shared().input.push_str(keys), keys.len());
    }

    pub fn join(&mut self) -> SessionEnd {
        self.bridge.wait_for_engine(STEP_TIMEOUT).unwrap().expect("engine thread was running")
    }

    pub fn stop(&mut self) -> SessionEnd {
        self.bridge.request_exit();
        self.join()
    }

    /// Shut down and bring the bridge back up over the same files.
    pub fn restart(&mut self) {
        self.bridge.full_shutdown();
        self.bridge.full_init().unwrap();
    }
}
