// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    channel::{ChannelId, DmaChannel},
    dma::DmaController,
    lock,
    memory::{DmaAllocator, DmaBuffer},
    pingpong::Slot,
    watchdog::{TimerTask, AUDIO_RESYNC_DELAY},
    Device, Error,
};
use std::{collections::VecDeque, fmt, ops::RangeInclusive, sync::Mutex};
use tw686x_sys::{regs, RegisterIo};

pub const SAMPLE_RATES: RangeInclusive<u32> = 8000..=48000;
pub const PERIOD_SIZES: RangeInclusive<usize> = regs::AUDIO_DMA_SIZE_MIN..=regs::AUDIO_DMA_SIZE_MAX;
pub const PERIOD_COUNTS: RangeInclusive<usize> = 2..=16;

/// Where the hardware writes audio samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioDmaMode {
    /// Into two fixed descriptors; each period is copied into the ring
    #[default]
    Memcpy,
    /// Straight into the ring; the slot address registers follow it
    RegisterPointer,
}

impl fmt::Display for AudioDmaMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioDmaMode::Memcpy => write!(f, "memcpy"),
            AudioDmaMode::RegisterPointer => write!(f, "register-pointer"),
        }
    }
}

/// Stream parameters for one audio channel.
///
/// Sample rate and period size are shared by every channel of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    /// Bytes per period
    pub period_size: usize,
    /// Periods in the ring
    pub periods: usize,
}

impl AudioParams {
    pub fn new(sample_rate: u32, period_size: usize, periods: usize) -> Result<Self, Error> {
        let params = AudioParams {
            sample_rate,
            period_size,
            periods,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Error::InvalidArgument(format!(
                "sample rate {} outside {:?}",
                self.sample_rate, SAMPLE_RATES
            )));
        }
        if !PERIOD_SIZES.contains(&self.period_size) {
            return Err(Error::InvalidArgument(format!(
                "period size {} outside {:?}",
                self.period_size, PERIOD_SIZES
            )));
        }
        if !PERIOD_COUNTS.contains(&self.periods) {
            return Err(Error::InvalidArgument(format!(
                "period count {} outside {:?}",
                self.periods, PERIOD_COUNTS
            )));
        }
        Ok(())
    }

    /// Ring size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.period_size * self.periods
    }

    /// Value of the sample rate divider register.
    pub fn rate_divider(&self) -> u32 {
        let rate = self.sample_rate;
        ((regs::AUDIO_CLOCK_HZ / rate) << 16) + ((regs::AUDIO_CLOCK_HZ % rate) << 16) / rate
    }
}

impl Default for AudioParams {
    fn default() -> Self {
        AudioParams {
            sample_rate: 8000,
            period_size: regs::AUDIO_DMA_SIZE_MAX,
            periods: 4,
        }
    }
}

/// A filled audio period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodElapsed {
    pub channel: ChannelId,
    /// Ring index of the period that was filled
    pub period: usize,
    /// Byte offset of that period in the ring
    pub pointer: usize,
    /// Periods completed since prepare, starting at 1
    pub sequence: u64,
}

/// Receiver of audio period notifications. Called from interrupt context.
pub trait AudioSink: Send + Sync {
    fn period_elapsed(&self, event: PeriodElapsed);
}

impl<F> AudioSink for F
where
    F: Fn(PeriodElapsed) + Send + Sync,
{
    fn period_elapsed(&self, event: PeriodElapsed) {
        self(event)
    }
}

#[derive(Debug, Default)]
pub(crate) struct AudioState {
    /// fixed capture targets in memcpy mode
    descriptors: Option<[DmaBuffer; 2]>,
    ring: Option<DmaBuffer>,
    period_size: usize,
    /// ring order, front is the next period to hand the hardware
    order: VecDeque<usize>,
    /// period behind each slot
    current: [Option<usize>; 2],
    pointer: usize,
    sequence: u64,
}

#[derive(Debug)]
pub(crate) struct AudioChannel {
    id: ChannelId,
    mode: AudioDmaMode,
    state: Mutex<AudioState>,
}

impl AudioChannel {
    /// In memcpy mode allocate the two descriptors and point the slot
    /// registers at them.
    pub(crate) fn init<R: RegisterIo + ?Sized>(
        io: &R,
        allocator: &dyn DmaAllocator,
        id: ChannelId,
        mode: AudioDmaMode,
    ) -> Result<Self, Error> {
        let mut state = AudioState::default();
        if mode == AudioDmaMode::Memcpy {
            let p = allocator.allocate(regs::AUDIO_DMA_SIZE_MAX)?;
            let b = allocator.allocate(regs::AUDIO_DMA_SIZE_MAX)?;
            io.write(regs::adma_addr_reg(id.index(), false), p.addr());
            io.write(regs::adma_addr_reg(id.index(), true), b.addr());
            state.descriptors = Some([p, b]);
        }
        Ok(AudioChannel {
            id,
            mode,
            state: Mutex::new(state),
        })
    }
}

impl<R: RegisterIo> Device<R> {
    pub(crate) fn audio_channel(&self, channel: ChannelId) -> &AudioChannel {
        &self.audio[channel.index()]
    }

    /// Program the shared rate and period size and lay out the period ring
    /// for `channel`.
    ///
    /// Fails with [`Error::Busy`] when the rate or period size would change
    /// while any audio channel is running.
    pub fn prepare_audio(&self, channel: ChannelId, params: AudioParams) -> Result<(), Error> {
        params.validate()?;
        let dma_channel = DmaChannel::Audio(channel);

        {
            let mut dma = lock(&self.dma);
            let changed = dma.audio_rate != Some(params.sample_rate)
                || dma.audio_period_size != Some(params.period_size);
            if changed && !dma.audio_running.is_empty() {
                return Err(Error::Busy("audio parameters in use"));
            }

            DmaController::new(&self.io).disable(dma_channel);
            dma.audio_running.remove(dma_channel);
            dma.pending.exclude(dma_channel);

            if dma.audio_rate != Some(params.sample_rate) {
                self.io.write(regs::AUDIO_CONTROL2, params.rate_divider());
                dma.audio_rate = Some(params.sample_rate);
            }
            if dma.audio_period_size != Some(params.period_size) {
                let mut control = self.io.read(regs::AUDIO_CONTROL1);
                control &= !(regs::AUDIO_DMA_SIZE_MASK << regs::AUDIO_DMA_SIZE_SHIFT);
                control |= (params.period_size as u32) << regs::AUDIO_DMA_SIZE_SHIFT;
                self.io.write(regs::AUDIO_CONTROL1, control);
                dma.audio_period_size = Some(params.period_size);
            }
        }

        let audio = self.audio_channel(channel);
        let mut state = lock(&audio.state);
        let size = params.buffer_size();
        let reuse = state.ring.as_ref().map_or(false, |ring| ring.len() == size);
        if !reuse {
            state.ring = Some(self.allocator.allocate(size)?);
        }
        let base = state.ring.as_ref().map_or(0, DmaBuffer::addr);

        state.period_size = params.period_size;
        state.order = (0..params.periods).collect();
        state.order.rotate_left(2);
        state.current = [Some(0), Some(1)];
        state.pointer = 0;
        state.sequence = 0;

        if audio.mode == AudioDmaMode::RegisterPointer {
            let ch = channel.index();
            self.io.write(regs::adma_addr_reg(ch, false), base);
            self.io
                .write(regs::adma_addr_reg(ch, true), base + params.period_size as u32);
        }
        log::debug!(
            "{}: audio prepared, {} Hz, {} x {} bytes",
            channel,
            params.sample_rate,
            params.periods,
            params.period_size
        );
        Ok(())
    }

    /// Start audio DMA. Fails with [`Error::NotPrepared`] until
    /// [`prepare_audio`](Device::prepare_audio) has succeeded.
    pub fn start_audio(&self, channel: ChannelId) -> Result<(), Error> {
        {
            let state = lock(&self.audio_channel(channel).state);
            if state.current.iter().any(Option::is_none) {
                return Err(Error::NotPrepared);
            }
        }

        let dma_channel = DmaChannel::Audio(channel);
        {
            let mut dma = lock(&self.dma);
            dma.audio_running.insert(dma_channel);
            dma.pending.include(dma_channel);
            DmaController::new(&self.io).enable(dma_channel);
        }
        self.scheduler
            .schedule(TimerTask::ResyncWatchdog, AUDIO_RESYNC_DELAY);
        log::info!("{}: audio started", channel);
        Ok(())
    }

    /// Stop audio DMA and forget the slot assignment. Stopping an idle
    /// channel is a no-op.
    pub fn stop_audio(&self, channel: ChannelId) {
        let dma_channel = DmaChannel::Audio(channel);
        let was_running = {
            let mut dma = lock(&self.dma);
            let was_running = dma.audio_running.contains(dma_channel);
            DmaController::new(&self.io).disable(dma_channel);
            dma.audio_running.remove(dma_channel);
            dma.pending.exclude(dma_channel);
            was_running
        };

        lock(&self.audio_channel(channel).state).current = [None, None];
        if was_running {
            log::info!("{}: audio stopped", channel);
        }
    }

    /// Byte offset of the most recently filled period.
    pub fn audio_pointer(&self, channel: ChannelId) -> usize {
        lock(&self.audio_channel(channel).state).pointer
    }

    /// Copy ring period `period` of `channel` into `dst`, returning the
    /// bytes copied.
    pub fn copy_audio_period(
        &self,
        channel: ChannelId,
        period: usize,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        let state = lock(&self.audio_channel(channel).state);
        let ring = state.ring.as_ref().ok_or(Error::NotPrepared)?;
        let periods = ring.len() / state.period_size.max(1);
        if period >= periods {
            return Err(Error::InvalidArgument(format!(
                "period {} outside ring of {}",
                period, periods
            )));
        }
        let len = dst.len().min(state.period_size);
        Ok(ring.read_at(period * state.period_size, &mut dst[..len]))
    }

    /// Rotate the ring for one audio interrupt and notify the sink.
    pub(crate) fn audio_period(&self, channel: ChannelId, pb_status: u32) {
        let bit = 1 << (regs::AUDIO_CHANNEL_OFFSET + channel.index() as u32);
        let slot = Slot::from_bit(pb_status & bit != 0);
        let audio = self.audio_channel(channel);

        let event = {
            let mut state = lock(&audio.state);
            let state = &mut *state;
            let (Some(_), Some(_)) = (state.current[0], state.current[1]) else {
                return;
            };
            let Some(next) = state.order.pop_front() else {
                return;
            };
            state.order.push_back(next);
            let Some(done) = state.current[slot.other().index()] else {
                return;
            };
            state.current[slot.index()] = Some(next);

            let Some(ring) = state.ring.as_ref() else {
                return;
            };
            let period_size = state.period_size;
            match (&state.descriptors, audio.mode) {
                (Some(descriptors), AudioDmaMode::Memcpy) => {
                    descriptors[slot.index()].with_data(|src| {
                        ring.write_at(done * period_size, &src[..period_size.min(src.len())])
                    });
                }
                _ => {
                    let addr = ring.addr() + (next * period_size) as u32;
                    self.io
                        .write(regs::adma_addr_reg(channel.index(), slot == Slot::B), addr);
                }
            }

            state.pointer = done * period_size;
            state.sequence += 1;
            PeriodElapsed {
                channel,
                period: done,
                pointer: state.pointer,
                sequence: state.sequence,
            }
        };

        log::trace!("{}: audio period {} elapsed", audio.id, event.period);
        if let Some(sink) = &self.audio_sink {
            sink.period_elapsed(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_ranges() {
        assert!(AudioParams::new(48000, 4096, 16).is_ok());
        assert!(AudioParams::new(7999, 4096, 4).is_err());
        assert!(AudioParams::new(8000, 511, 4).is_err());
        assert!(AudioParams::new(8000, 4097, 4).is_err());
        assert!(AudioParams::new(8000, 1024, 1).is_err());
        assert!(AudioParams::new(8000, 1024, 17).is_err());
    }

    #[test]
    fn test_rate_divider() {
        let params = AudioParams::new(8000, 1024, 4).unwrap();
        assert_eq!(params.rate_divider(), 15625 << 16);

        let params = AudioParams::new(44100, 1024, 4).unwrap();
        let whole = 125_000_000 / 44100;
        let frac = ((125_000_000 % 44100) << 16) / 44100;
        assert_eq!(params.rate_divider(), (whole << 16) + frac);
        assert_eq!(params.buffer_size(), 4096);
    }
}
