// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{ChannelId, MAX_CHANNELS};
use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// Fault and throughput counters for one video channel.
///
/// Counters are atomics so interrupt, timer and consumer contexts can
/// update and read them without taking a channel lock.
#[derive(Debug, Default)]
pub struct ChannelStats {
    dma_errors: AtomicU32,
    timeouts: AtomicU32,
    pb_mismatches: AtomicU32,
    signal_losses: AtomicU32,
    frames: AtomicU32,
    dropped: AtomicU32,
}

impl ChannelStats {
    pub(crate) fn dma_error(&self) {
        self.dma_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pb_mismatch(&self) {
        self.pb_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn signal_lost(&self) {
        self.signal_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_done(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dma_errors: self.dma_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            pb_mismatches: self.pb_mismatches.load(Ordering::Relaxed),
            signal_losses: self.signal_losses.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.dma_errors,
            &self.timeouts,
            &self.pb_mismatches,
            &self.signal_losses,
            &self.frames,
            &self.dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// FIFO overflow or bad-data faults
    pub dma_errors: u32,
    /// Global DMA timeouts seen while this channel was enabled
    pub timeouts: u32,
    /// Field pairs discarded because their P/B slots differed
    pub pb_mismatches: u32,
    /// Transitions into the no-signal state
    pub signal_losses: u32,
    /// Buffers completed with [`BufferState::Done`](crate::BufferState::Done)
    pub frames: u32,
    /// Frames lost because no buffer was queued
    pub dropped: u32,
}

/// Counters for every video channel of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub channels: [StatsSnapshot; MAX_CHANNELS],
}

impl DeviceStats {
    pub fn channel(&self, channel: ChannelId) -> &StatsSnapshot {
        &self.channels[channel.index()]
    }

    /// Sum over all channels.
    pub fn total(&self) -> StatsSnapshot {
        self.channels
            .iter()
            .fold(StatsSnapshot::default(), |acc, s| StatsSnapshot {
                dma_errors: acc.dma_errors + s.dma_errors,
                timeouts: acc.timeouts + s.timeouts,
                pb_mismatches: acc.pb_mismatches + s.pb_mismatches,
                signal_losses: acc.signal_losses + s.signal_losses,
                frames: acc.frames + s.frames,
                dropped: acc.dropped + s.dropped,
            })
    }
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<4} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "ch", "frames", "dropped", "dma_err", "timeout", "field_off", "no_signal"
        )?;
        for (ch, s) in self.channels.iter().enumerate() {
            writeln!(
                f,
                "{:<4} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
                ch,
                s.frames,
                s.dropped,
                s.dma_errors,
                s.timeouts,
                s.pb_mismatches,
                s.signal_losses
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ChannelStats::default();
        stats.dma_error();
        stats.pb_mismatch();
        stats.pb_mismatch();
        stats.frame_done();

        let snap = stats.snapshot();
        assert_eq!(snap.dma_errors, 1);
        assert_eq!(snap.pb_mismatches, 2);
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.timeouts, 0);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_device_table() {
        let mut stats = DeviceStats::default();
        stats.channels[2].frames = 25;
        stats.channels[3].timeouts = 1;

        assert_eq!(stats.total().frames, 25);
        assert_eq!(stats.channel(ChannelId::new(3).unwrap()).timeouts, 1);

        let table = stats.to_string();
        assert_eq!(table.lines().count(), 1 + MAX_CHANNELS);
        assert!(table.lines().next().unwrap().contains("field_off"));
    }
}
