// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Channel enable and command sequencing.
//!
//! The DMA engine has one enable mask and one command word shared by all
//! sixteen engines. Every update is a read-modify-write of both registers
//! followed by a read back, which flushes posted writes on the bus.

use crate::{ChannelSet, DmaChannel};
use tw686x_sys::{regs, RegisterIo};

/// Enable and command values taken off the hardware by a reset, waiting
/// for the deferred restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRegisters {
    pub enable: u32,
    pub command: u32,
}

impl PendingRegisters {
    pub fn is_empty(&self) -> bool {
        self.enable == 0 && self.command == 0
    }

    /// Engines the restore will re-enable.
    pub fn channels(&self) -> ChannelSet {
        ChannelSet::from_register(self.enable)
    }

    /// Add an engine started while a restore is outstanding. Does nothing
    /// when no restore is pending.
    pub fn include(&mut self, dma: DmaChannel) {
        if self.is_empty() {
            return;
        }
        self.enable |= dma.bit();
        self.command |= regs::DMA_CMD_RUN | dma.bit();
    }

    /// Drop an engine stopped while a restore is outstanding, forgetting
    /// the restore once no engine is left in it.
    pub fn exclude(&mut self, dma: DmaChannel) {
        self.enable &= !dma.bit();
        self.command &= !dma.bit();
        if self.enable == 0 {
            *self = PendingRegisters::default();
        }
    }
}

/// Register sequences for the shared enable mask and command word.
#[derive(Debug)]
pub struct DmaController<'a, R: RegisterIo + ?Sized> {
    io: &'a R,
}

impl<'a, R: RegisterIo + ?Sized> DmaController<'a, R> {
    pub fn new(io: &'a R) -> Self {
        DmaController { io }
    }

    /// Engines currently enabled in hardware.
    pub fn enabled(&self) -> ChannelSet {
        ChannelSet::from_register(self.io.read(regs::DMA_CHANNEL_ENABLE))
    }

    /// Turn on one engine and make sure the engine is running.
    pub fn enable(&self, dma: DmaChannel) {
        let enable = self.io.read(regs::DMA_CHANNEL_ENABLE) | dma.bit();
        self.io.write(regs::DMA_CHANNEL_ENABLE, enable);
        self.io
            .write(regs::DMA_CMD, regs::DMA_CMD_RUN | (enable & 0xffff));
        self.flush();
        log::debug!("{} enabled, mask {:#06x}", dma, enable & 0xffff);
    }

    /// Turn off one engine, halting the command word when none remain.
    /// Disabling an engine that is already off leaves both registers as
    /// they were.
    pub fn disable(&self, dma: DmaChannel) {
        let enable = self.io.read(regs::DMA_CHANNEL_ENABLE) & !dma.bit();
        let command = if enable == 0 {
            0
        } else {
            self.io.read(regs::DMA_CMD) & !dma.bit()
        };
        self.io.write(regs::DMA_CHANNEL_ENABLE, enable);
        self.io.write(regs::DMA_CMD, command);
        self.flush();
        log::debug!("{} disabled, mask {:#06x}", dma, enable & 0xffff);
    }

    /// Take every engine in `set` off the hardware, stashing the current
    /// register values in `pending` for [`restore`](DmaController::restore).
    pub fn reset(&self, set: &ChannelSet, pending: &mut PendingRegisters) {
        let enable = self.io.read(regs::DMA_CHANNEL_ENABLE);
        let command = self.io.read(regs::DMA_CMD);
        pending.enable |= enable;
        pending.command |= command;

        let mask = set.to_register();
        let enable = enable & !mask;
        self.io.write(regs::DMA_CHANNEL_ENABLE, enable);
        if enable == 0 {
            self.io.write(regs::DMA_CMD, 0);
        } else {
            self.io.write(regs::DMA_CMD, command & !mask);
        }
        self.flush();
        log::debug!("reset {}, enable now {:#06x}", set, enable);
    }

    /// Write the stashed values back and clear them. Returns the engines
    /// that were restored.
    pub fn restore(&self, pending: &mut PendingRegisters) -> ChannelSet {
        let restored = *pending;
        self.io.write(regs::DMA_CHANNEL_ENABLE, restored.enable);
        self.io.write(regs::DMA_CMD, restored.command);
        self.flush();
        *pending = PendingRegisters::default();
        log::debug!(
            "restored enable {:#06x} command {:#010x}",
            restored.enable,
            restored.command
        );
        restored.channels()
    }

    /// Bring the mask to exactly `wanted`, halting the command word when
    /// it is empty.
    pub fn resync(&self, wanted: &ChannelSet) {
        let enable = wanted.to_register();
        self.io.write(regs::DMA_CHANNEL_ENABLE, enable);
        if enable == 0 {
            self.io.write(regs::DMA_CMD, 0);
        } else {
            self.io.write(regs::DMA_CMD, regs::DMA_CMD_RUN | enable);
        }
        self.flush();
    }

    /// Clear both registers.
    pub fn halt(&self) {
        self.io.write(regs::DMA_CHANNEL_ENABLE, 0);
        self.io.write(regs::DMA_CMD, 0);
        self.flush();
    }

    fn flush(&self) {
        let _ = self.io.read(regs::DMA_CHANNEL_ENABLE);
        let _ = self.io.read(regs::DMA_CMD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;
    use crate::ChannelId;
    use rand::Rng;

    fn video(ch: usize) -> DmaChannel {
        DmaChannel::Video(ChannelId::new(ch).unwrap())
    }

    fn audio(ch: usize) -> DmaChannel {
        DmaChannel::Audio(ChannelId::new(ch).unwrap())
    }

    #[test]
    fn test_enable_sets_run_bit() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);

        dma.enable(video(3));
        dma.enable(audio(1));
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0x0208);
        assert_eq!(hw.register(regs::DMA_CMD), 0x8000_0208);
        assert!(dma.enabled().contains(audio(1)));
    }

    #[test]
    fn test_disable_is_idempotent() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);
        dma.enable(video(0));
        dma.enable(video(4));

        dma.disable(video(0));
        let once = (hw.register(regs::DMA_CHANNEL_ENABLE), hw.register(regs::DMA_CMD));
        dma.disable(video(0));
        let twice = (hw.register(regs::DMA_CHANNEL_ENABLE), hw.register(regs::DMA_CMD));
        assert_eq!(once, twice);
        assert_eq!(once, (0x10, 0x8000_0010));

        // Last engine off halts the command word
        dma.disable(video(4));
        assert_eq!(hw.register(regs::DMA_CMD), 0);
    }

    #[test]
    fn test_random_enable_disable_mask() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);
        let mut rng = rand::rng();
        let mut expected = ChannelSet::new();

        for _ in 0..200 {
            let ch = ChannelId::new(rng.random_range(0..8)).unwrap();
            let engine = if rng.random_bool(0.5) {
                DmaChannel::Video(ch)
            } else {
                DmaChannel::Audio(ch)
            };
            if rng.random_bool(0.5) {
                dma.enable(engine);
                expected.insert(engine);
            } else {
                dma.disable(engine);
                expected.remove(engine);
            }
            assert_eq!(dma.enabled(), expected);
            if expected.is_empty() {
                assert_eq!(hw.register(regs::DMA_CMD), 0);
            } else {
                assert_eq!(
                    hw.register(regs::DMA_CMD) & 0xffff,
                    expected.to_register()
                );
            }
        }
    }

    #[test]
    fn test_reset_and_restore() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);
        dma.enable(video(1));
        dma.enable(video(2));

        let mut pending = PendingRegisters::default();
        let set: ChannelSet = [video(1)].into_iter().collect();
        dma.reset(&set, &mut pending);
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0x04);
        assert_eq!(hw.register(regs::DMA_CMD), 0x8000_0004);
        assert_eq!(pending.enable, 0x06);

        // A second reset accumulates into the same pending state
        dma.reset(&ChannelSet::all(), &mut pending);
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0);
        assert_eq!(hw.register(regs::DMA_CMD), 0);
        assert_eq!(pending.command, 0x8000_0006);

        let restored = dma.restore(&mut pending);
        assert!(pending.is_empty());
        assert_eq!(restored.video().count(), 2);
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0x06);
        assert_eq!(hw.register(regs::DMA_CMD), 0x8000_0006);
    }

    #[test]
    fn test_resync_writes_wanted_set() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);
        dma.enable(video(0));
        dma.enable(audio(0));
        dma.enable(audio(2));

        let wanted: ChannelSet = [video(5), audio(0)].into_iter().collect();
        dma.resync(&wanted);
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0x0120);
        assert_eq!(hw.register(regs::DMA_CMD), 0x8000_0120);

        dma.resync(&ChannelSet::new());
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0);
        assert_eq!(hw.register(regs::DMA_CMD), 0);
    }

    #[test]
    fn test_reset_and_restore_read_back() {
        let hw = SimulatedHardware::new();
        let dma = DmaController::new(&hw);
        dma.enable(video(1));

        let mut pending = PendingRegisters::default();
        hw.take_writes();
        hw.take_reads();
        dma.reset(&ChannelSet::all(), &mut pending);
        let reads = hw.take_reads();
        assert_eq!(
            &reads[reads.len() - 2..],
            &[regs::DMA_CHANNEL_ENABLE, regs::DMA_CMD]
        );

        dma.restore(&mut pending);
        assert_eq!(hw.take_reads(), vec![regs::DMA_CHANNEL_ENABLE, regs::DMA_CMD]);
        let writes = hw.take_writes();
        assert_eq!(writes.last(), Some(&(regs::DMA_CMD, 0x8000_0002)));
    }

    #[test]
    fn test_pending_follows_start_and_stop() {
        let mut pending = PendingRegisters::default();
        pending.include(audio(2));
        assert!(pending.is_empty());

        pending.enable = 0x01;
        pending.command = 0x8000_0001;
        pending.include(audio(2));
        assert_eq!(pending.enable, 0x0401);
        assert_eq!(pending.command, 0x8000_0401);

        pending.exclude(video(0));
        assert_eq!(pending.enable, 0x0400);
        pending.exclude(audio(2));
        assert!(pending.is_empty());
    }
}
