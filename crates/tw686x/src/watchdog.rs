// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{dma::DmaController, lock, ChannelSet, Device};
use std::{fmt, sync::Mutex, time::Duration};
use tw686x_sys::{regs, RegisterIo};

/// Delay before the watchdog checks a freshly started audio channel.
pub const AUDIO_RESYNC_DELAY: Duration = Duration::from_millis(100);

/// The two recovery timers of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTask {
    /// Restore the registers saved by a channel reset
    DeferredReset,
    /// Reconcile the enabled channels with the requested ones
    ResyncWatchdog,
}

impl TimerTask {
    pub const ALL: [TimerTask; 2] = [TimerTask::DeferredReset, TimerTask::ResyncWatchdog];

    pub const fn index(self) -> usize {
        match self {
            TimerTask::DeferredReset => 0,
            TimerTask::ResyncWatchdog => 1,
        }
    }
}

impl fmt::Display for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerTask::DeferredReset => write!(f, "deferred reset"),
            TimerTask::ResyncWatchdog => write!(f, "resync watchdog"),
        }
    }
}

/// Host service that runs [`Device::run_timer`] after a delay.
///
/// Each task has at most one deadline; scheduling a task that is already
/// armed moves its deadline.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: TimerTask, delay: Duration);
}

/// Scheduler driven by explicit calls to [`advance`](ManualScheduler::advance).
///
/// ```
/// use std::time::Duration;
/// use tw686x::{ManualScheduler, Scheduler, TimerTask};
///
/// let timers = ManualScheduler::new();
/// timers.schedule(TimerTask::DeferredReset, Duration::from_millis(100));
/// assert!(timers.advance(Duration::from_millis(60)).is_empty());
/// assert_eq!(timers.advance(Duration::from_millis(40)), vec![TimerTask::DeferredReset]);
/// ```
#[derive(Debug, Default)]
pub struct ManualScheduler {
    remaining: Mutex<[Option<Duration>; 2]>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler::default()
    }

    /// Time left until `task` fires, if armed.
    pub fn pending(&self, task: TimerTask) -> Option<Duration> {
        lock(&self.remaining)[task.index()]
    }

    /// Move time forward by `by`, disarming and returning the tasks that
    /// came due, earliest first.
    pub fn advance(&self, by: Duration) -> Vec<TimerTask> {
        let mut remaining = lock(&self.remaining);
        let mut due: Vec<(Duration, TimerTask)> = Vec::new();
        for task in TimerTask::ALL {
            if let Some(left) = remaining[task.index()] {
                if left <= by {
                    due.push((left, task));
                    remaining[task.index()] = None;
                } else {
                    remaining[task.index()] = Some(left - by);
                }
            }
        }
        due.sort_by_key(|(left, _)| *left);
        due.into_iter().map(|(_, task)| task).collect()
    }

    pub fn cancel(&self, task: TimerTask) {
        lock(&self.remaining)[task.index()] = None;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: TimerTask, delay: Duration) {
        lock(&self.remaining)[task.index()] = Some(delay);
    }
}

impl<T: Scheduler + ?Sized> Scheduler for std::sync::Arc<T> {
    fn schedule(&self, task: TimerTask, delay: Duration) {
        (**self).schedule(task, delay)
    }
}

impl<R: RegisterIo> Device<R> {
    /// Run an expired timer.
    pub fn run_timer(&self, task: TimerTask) {
        log::trace!("timer: {}", task);
        match task {
            TimerTask::DeferredReset => self.deferred_reset(),
            TimerTask::ResyncWatchdog => self.resync_watchdog(),
        }
    }

    /// Put back the enable mask and command word a reset took off the
    /// hardware.
    pub fn deferred_reset(&self) {
        let mut dma = lock(&self.dma);
        if dma.pending.is_empty() {
            return;
        }

        let restored = DmaController::new(&self.io).restore(&mut dma.pending);
        let back = restored.video_only().intersection(&dma.requested);
        dma.enabled = dma.enabled.union(&back);
        log::debug!("deferred reset restored {}", restored);
    }

    /// Re-arm itself, then bring the hardware back in line with the
    /// requested video channels and running audio channels. A tick within
    /// one watchdog period of the last fault does nothing.
    pub fn resync_watchdog(&self) {
        let period = self.config.watchdog_period();
        self.scheduler.schedule(TimerTask::ResyncWatchdog, period);

        let mut dma = lock(&self.dma);
        if let Some(fault) = dma.last_fault {
            let age = self.clock.now().saturating_sub(fault);
            if age < period {
                log::trace!("resync skipped, fault {:?} ago", age);
                return;
            }
        }

        let hw_audio = ChannelSet::from_register(
            self.io.read(regs::DMA_CHANNEL_ENABLE) & regs::AUDIO_CHANNEL_MASK,
        );
        let diverged = dma
            .enabled
            .symmetric_difference(&dma.requested)
            .union(&hw_audio.symmetric_difference(&dma.audio_running));
        if diverged.is_empty() {
            return;
        }

        let wanted = dma.requested.union(&dma.audio_running);
        log::warn!("resync: {} out of step, enabling {}", diverged, wanted);
        dma.enabled = dma.requested;
        DmaController::new(&self.io).resync(&wanted);
    }
}
