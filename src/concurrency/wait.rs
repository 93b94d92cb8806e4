//! Address-based parking for gate counters.
//!
//! Linux parks on a private futex, Windows on `WaitOnAddress`; other targets
//! fall back to a yield loop. Every wait is bounded by a timeout so callers
//! can re-check closure, cancellation and deadlines between slices.

use core::time::Duration;

#[cfg(not(loom))]
use core::sync::atomic::AtomicU32;
#[cfg(all(not(loom), not(windows)))]
use core::sync::atomic::Ordering;
#[cfg(loom)]
use loom::sync::atomic::AtomicU32;

#[cfg(all(windows, not(loom)))]
use windows_sys::Win32::System::Threading::{WaitOnAddress, WakeByAddressAll, WakeByAddressSingle};

#[cfg(all(target_os = "linux", not(loom)))]
use libc::{SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

#[cfg(all(target_os = "linux", not(loom)))]
#[inline]
fn futex_wait(addr: *const u32, expected: u32, timeout: Duration) {
    let secs = libc::time_t::try_from(timeout.as_secs());
    let nanos = libc::c_long::try_from(timeout.subsec_nanos());
    let ts = libc::timespec {
        tv_sec: secs.unwrap_or(libc::time_t::MAX),
        tv_nsec: nanos.unwrap_or(0),
    };
    // EAGAIN (value changed), EINTR and ETIMEDOUT all just return to the
    // caller's retry loop.
    unsafe {
        libc::syscall(
            SYS_futex,
            addr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            &ts as *const libc::timespec,
        );
    }
}

#[cfg(all(target_os = "linux", not(loom)))]
#[inline]
fn futex_wake(addr: *const u32, count: i32) {
    unsafe {
        libc::syscall(SYS_futex, addr, FUTEX_WAKE | FUTEX_PRIVATE_FLAG, count);
    }
}

/// Parks until `addr` may no longer hold `expected`, a wake arrives, or
/// `timeout` elapses. Spurious returns are allowed.
#[inline]
pub(crate) fn wait_on_u32(addr: &AtomicU32, expected: u32, timeout: Duration) {
    #[cfg(loom)]
    {
        let _ = (addr, expected, timeout);
        loom::thread::yield_now();
    }
    #[cfg(all(windows, not(loom)))]
    unsafe {
        let expected_ptr = &expected as *const u32 as *const _;
        let addr_ptr = addr as *const AtomicU32 as *const _;
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX - 1);
        let millis = millis.max(1);
        WaitOnAddress(addr_ptr, expected_ptr, core::mem::size_of::<u32>(), millis);
    }
    #[cfg(all(target_os = "linux", not(loom)))]
    {
        if addr.load(Ordering::Acquire) == expected {
            futex_wait(addr.as_ptr().cast_const(), expected, timeout);
        }
    }
    #[cfg(not(any(windows, target_os = "linux", loom)))]
    {
        let start = std::time::Instant::now();
        while addr.load(Ordering::Acquire) == expected && start.elapsed() < timeout {
            std::thread::yield_now();
        }
    }
}

/// Wakes one thread parked on `addr`.
#[inline]
pub(crate) fn wake_one_u32(addr: &AtomicU32) {
    #[cfg(loom)]
    let _ = addr;
    #[cfg(all(windows, not(loom)))]
    unsafe {
        WakeByAddressSingle(addr as *const AtomicU32 as *const _);
    }
    #[cfg(all(target_os = "linux", not(loom)))]
    futex_wake(addr.as_ptr().cast_const(), 1);
    #[cfg(not(any(windows, target_os = "linux", loom)))]
    let _ = addr;
}

/// Wakes every thread parked on `addr`.
#[inline]
pub(crate) fn wake_all_u32(addr: &AtomicU32) {
    #[cfg(loom)]
    let _ = addr;
    #[cfg(all(windows, not(loom)))]
    unsafe {
        WakeByAddressAll(addr as *const AtomicU32 as *const _);
    }
    #[cfg(all(target_os = "linux", not(loom)))]
    futex_wake(addr.as_ptr().cast_const(), i32::MAX);
    #[cfg(not(any(windows, target_os = "linux", loom)))]
    let _ = addr;
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wake_all_releases_a_parked_waiter() {
        let flag = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(2));
        let flag_thread = flag.clone();
        let barrier_thread = barrier.clone();

        let handle = thread::spawn(move || {
            barrier_thread.wait();
            while flag_thread.load(Ordering::SeqCst) == 0 {
                wait_on_u32(&flag_thread, 0, Duration::from_secs(5));
            }
            flag_thread.load(Ordering::SeqCst)
        });

        barrier.wait();
        flag.store(1, Ordering::SeqCst);
        wake_all_u32(&flag);

        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn wait_returns_after_timeout() {
        let flag = AtomicU32::new(0);
        let start = Instant::now();
        wait_on_u32(&flag, 0, Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wait_returns_immediately_on_stale_expectation() {
        let flag = AtomicU32::new(7);
        let start = Instant::now();
        wait_on_u32(&flag, 0, Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(5));
        wake_one_u32(&flag);
    }
}
