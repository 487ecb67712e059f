//! Render ring under a paint storm the host never drains.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use nh_bridge::RenderElement;
use nh_test::PAINT_BURST;
use serial_test::serial;

use common::harness_with;

const CAPACITY: usize = 64;

/// Counts "render queue full" warnings.
struct DropWarnings {
    seen: AtomicUsize,
}

impl Log for DropWarnings {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() == Level::Warn && record.args().to_string().contains("render queue full") {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush(&self) {}
}

static WARNINGS: DropWarnings = DropWarnings {
    seen: AtomicUsize::new(0),
};

fn install_logger() {
    if log::set_logger(&WARNINGS).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }
}

#[test]
#[serial]
fn test_paint_storm_drops_and_warns() {
    install_logger();
    let mut h = harness_with(|config| config.render_capacity = CAPACITY);
    h.start();
    let shared = h.shared();
    shared.drain_render();
    let warned_before = WARNINGS.seen.load(Ordering::SeqCst);

    h.send("P");
    assert_eq!(h.probe.report().paints, u64::from(PAINT_BURST));
    assert!(shared.render_len() <= CAPACITY);
    assert!(shared.render_dropped() > 0);
    assert!(WARNINGS.seen.load(Ordering::SeqCst) > warned_before);

    // The engine keeps playing once the host catches up.
    shared.drain_render();
    h.send_each("ss");
    let turns: Vec<i64> = shared
        .drain_render()
        .into_iter()
        .filter_map(|element| match element {
            RenderElement::TurnComplete { moves } => Some(moves),
            _ => None,
        })
        .collect();
    assert_eq!(turns, vec![2, 3]);
    assert_eq!(h.probe.projection().moves, 3);
    h.stop();
}
