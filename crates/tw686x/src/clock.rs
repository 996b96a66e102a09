// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::lock;
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};
use unix_ts::Timestamp;

/// Monotonic time source for capture timestamps and fault debouncing.
pub trait Clock: Send + Sync {
    /// Time since an arbitrary fixed origin. Never decreases.
    fn now(&self) -> Duration;

    /// [`now`](Clock::now) as a capture timestamp.
    fn timestamp(&self) -> Timestamp {
        let now = self.now();
        Timestamp::new(now.as_secs() as i64, now.subsec_nanos())
    }
}

/// Wall-clock time measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to, for simulation and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: Duration) {
        let mut now = lock(&self.now);
        if to > *now {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}
