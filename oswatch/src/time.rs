//! Monotonic clock sampling and millisecond deltas. Kept separate from
//! `stats` so the rest of the crate never touches `CLOCK_MONOTONIC`
//! directly. Uses `libc::clock_gettime` directly rather than going
//! through `nix`'s time wrappers, since the pinned `nix` version here
//! doesn't expose them.

use libc::{clock_gettime, timespec, CLOCK_MONOTONIC};

#[derive(Copy, Clone, Debug)]
pub struct Timestamp(timespec);

impl Timestamp {
    pub fn now() -> Timestamp {
        let mut ts = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let rc = unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };
        assert_eq!(rc, 0, "CLOCK_MONOTONIC should always be readable");
        Timestamp(ts)
    }

    fn as_ms(&self) -> f64 {
        self.0.tv_sec as f64 * 1000.0 + self.0.tv_nsec as f64 / 1_000_000.0
    }

    /// Milliseconds elapsed from `self` to `other`. Negative if `other`
    /// precedes `self`, which should never happen for a monotonic clock
    /// but callers shouldn't panic on it.
    pub fn delta_ms(&self, other: &Timestamp) -> f64 {
        other.as_ms() - self.as_ms()
    }
}
