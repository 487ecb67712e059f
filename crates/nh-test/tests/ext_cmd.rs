//! Extended-command entry through the input queue.

mod common;

use serial_test::serial;

use common::harness;

#[test]
#[serial]
fn test_ambiguous_prefix_is_reported() {
    let mut h = harness();
    h.start();
    h.send("#z\n");

    assert_eq!(h.probe.report().ext_cmd_results, vec![-1]);
    assert!(h.shared().messages().contains("#z: ambiguous extended command."));
    assert_eq!(h.probe.projection().moves, 1);
    h.stop();
}

#[test]
#[serial]
fn test_exact_name_and_unique_prefix() {
    let mut h = harness();
    h.start();

    h.send("#zap\n");
    assert!(h.shared().messages().contains("You don't have anything to zap."));

    h.send("#pr\n");
    assert!(h.shared().messages().contains("You finish your prayer."));

    assert_eq!(h.probe.report().ext_cmd_results, vec![3, 0]);
    assert_eq!(h.probe.projection().moves, 2);
    h.stop();
}

#[test]
#[serial]
fn test_unknown_and_cancelled_commands() {
    let mut h = harness();
    h.start();

    h.send("#dance\n");
    assert!(h.shared().messages().contains("#dance: unknown extended command."));

    h.send("#za\x08\x08\x1b");
    assert_eq!(h.probe.report().ext_cmd_results, vec![-1, -1]);
    h.stop();
}
