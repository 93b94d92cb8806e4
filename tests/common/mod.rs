//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;
use std::time::{Duration, Instant};

use bondgate::{GroupSpec, RendezvousBarrier, Role};

static INIT_LOGGING: Once = Once::new();

/// Routes barrier trace events to the test output. Safe to call repeatedly.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    H,
    O,
}

impl Atom {
    pub fn parse(roles: &str) -> Vec<Atom> {
        roles
            .chars()
            .map(|c| match c {
                'H' => Atom::H,
                'O' => Atom::O,
                other => panic!("not an atom: {other}"),
            })
            .collect()
    }
}

pub fn water() -> GroupSpec<Atom> {
    GroupSpec::new([(Atom::H, 2), (Atom::O, 1)]).unwrap()
}

/// Polls until `role` has `count` arrivals counted in the forming generation.
pub fn wait_for_waiting<R: Role>(barrier: &RendezvousBarrier<R>, role: R, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while barrier.waiting(role) != count {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {count} x {role:?}"
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Asserts every consecutive `spec.size()` chunk of `log` is one complete group.
pub fn assert_complete_groups<R: Role>(spec: &GroupSpec<R>, log: &[R]) {
    assert_eq!(
        log.len() % spec.size(),
        0,
        "log is not a whole number of groups: {log:?}"
    );
    for group in log.chunks(spec.size()) {
        for (role, required) in spec.iter() {
            let seen = group.iter().filter(|&&r| r == role).count();
            assert_eq!(seen, required, "group {group:?} has {seen} x {role:?}");
        }
    }
}
