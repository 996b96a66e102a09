// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::time::Duration;
use tw686x::{Completion, StatsSnapshot};

/// Capture metrics for one channel of a simulated run
#[derive(Debug, Clone, Serialize)]
pub struct FrameMetrics {
    /// Channel index
    pub channel: usize,
    /// Buffers completed with image data
    pub frames_captured: u64,
    /// Total bytes delivered in completed buffers
    pub bytes_captured: u64,
    /// Simulated duration in milliseconds
    pub duration_ms: u64,
    /// Average frame rate over the simulated duration
    pub throughput_fps: f64,
    /// Minimum interval between completions in microseconds
    pub interval_min_us: u64,
    /// Maximum interval between completions in microseconds
    pub interval_max_us: u64,
    /// Average interval between completions in microseconds
    pub interval_avg_us: u64,
    /// 50th percentile (median) interval in microseconds
    pub interval_p50_us: u64,
    /// 95th percentile interval in microseconds
    pub interval_p95_us: u64,
    /// Frames lost because no buffer was queued
    pub dropped_frames: u64,
    /// Gaps in the completion sequence numbers
    pub sequence_gaps: u64,
    /// FIFO faults
    pub dma_errors: u64,
    /// DMA timeouts
    pub timeouts: u64,
    /// Field pairs discarded for a P/B mismatch
    pub pb_mismatches: u64,
    /// Transitions into the no-signal state
    pub signal_losses: u64,
}

/// Collects completions for one channel
pub struct MetricsCollector {
    channel: usize,
    intervals_us: Vec<u64>,
    last_timestamp_us: Option<u64>,
    frames: u64,
    bytes: u64,
    prev_sequence: Option<u32>,
    sequence_gaps: u64,
}

impl MetricsCollector {
    pub fn new(channel: usize) -> Self {
        Self {
            channel,
            intervals_us: Vec::new(),
            last_timestamp_us: None,
            frames: 0,
            bytes: 0,
            prev_sequence: None,
            sequence_gaps: 0,
        }
    }

    /// Record a buffer completed at `at` on the capture clock
    pub fn record(&mut self, completion: &Completion, at: Duration) {
        let now_us = at.as_micros() as u64;
        if let Some(last) = self.last_timestamp_us {
            self.intervals_us.push(now_us.saturating_sub(last));
        }
        self.last_timestamp_us = Some(now_us);

        self.frames += 1;
        self.bytes += completion.buffer.bytes_used() as u64;
        self.track_sequence(completion.sequence);
    }

    /// Track sequence numbers to detect gaps. A restart at 0 is not a gap.
    pub fn track_sequence(&mut self, sequence: u32) -> u64 {
        let gaps = match self.prev_sequence {
            Some(prev) if sequence > prev + 1 => u64::from(sequence - prev - 1),
            Some(prev) if sequence <= prev => {
                log::debug!("ch{}: sequence restarted {} -> {}", self.channel, prev, sequence);
                0
            }
            _ => 0,
        };
        self.sequence_gaps += gaps;
        self.prev_sequence = Some(sequence);
        gaps
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self, duration: Duration, stats: &StatsSnapshot) -> FrameMetrics {
        let duration_secs = duration.as_secs_f64();
        let throughput_fps = if duration_secs > 0.0 {
            self.frames as f64 / duration_secs
        } else {
            0.0
        };

        self.intervals_us.sort_unstable();
        let (min_us, max_us, avg_us) = match (self.intervals_us.first(), self.intervals_us.last()) {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.intervals_us.iter().sum();
                (min, max, sum / self.intervals_us.len() as u64)
            }
            _ => (0, 0, 0),
        };

        FrameMetrics {
            channel: self.channel,
            frames_captured: self.frames,
            bytes_captured: self.bytes,
            duration_ms: duration.as_millis() as u64,
            throughput_fps,
            interval_min_us: min_us,
            interval_max_us: max_us,
            interval_avg_us: avg_us,
            interval_p50_us: self.percentile(50.0),
            interval_p95_us: self.percentile(95.0),
            dropped_frames: u64::from(stats.dropped),
            sequence_gaps: self.sequence_gaps,
            dma_errors: u64::from(stats.dma_errors),
            timeouts: u64::from(stats.timeouts),
            pb_mismatches: u64::from(stats.pb_mismatches),
            signal_losses: u64::from(stats.signal_losses),
        }
    }

    /// Percentile of the sorted interval data
    fn percentile(&self, p: f64) -> u64 {
        if self.intervals_us.is_empty() {
            return 0;
        }

        let len = self.intervals_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.intervals_us[idx.min(len - 1)]
    }
}

/// Print one channel's metrics in human-readable format
pub fn print_text(metrics: &FrameMetrics) {
    println!("\n=== Channel {} ===", metrics.channel);
    println!("Frames captured:   {}", metrics.frames_captured);
    println!(
        "Bytes captured:    {} ({:.2} MB)",
        metrics.bytes_captured,
        metrics.bytes_captured as f64 / 1_048_576.0
    );
    println!(
        "Duration:          {:.2} s",
        metrics.duration_ms as f64 / 1000.0
    );
    println!("Throughput:        {:.2} fps", metrics.throughput_fps);

    if metrics.frames_captured > 1 {
        println!("\nFrame interval (µs):");
        println!("  Min:    {}", metrics.interval_min_us);
        println!("  Max:    {}", metrics.interval_max_us);
        println!("  Avg:    {}", metrics.interval_avg_us);
        println!("  P50:    {}", metrics.interval_p50_us);
        println!("  P95:    {}", metrics.interval_p95_us);
    }

    if metrics.dropped_frames > 0 {
        println!("\nDropped frames:    {}", metrics.dropped_frames);
    }
}
