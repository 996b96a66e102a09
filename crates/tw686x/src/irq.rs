// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Interrupt dispatch.
//!
//! One pass reads the interrupt and FIFO status, routes each signalled
//! video channel through the field state machine and each audio channel
//! through the period ring, then takes every faulted channel off the
//! hardware in a single reset. Nothing here returns an error: faults are
//! counted, logged and recovered by the timers.

use crate::{
    channel::{ChannelSet, DmaChannel},
    device::{VideoChannel, WeaveState},
    dma::DmaController,
    lock,
    pingpong::{Field, SlotStatus},
    queue::{BufferState, Completion},
    watchdog::TimerTask,
    weave::weave_field,
    Device, FieldMode,
};
use tw686x_sys::{regs, RegisterIo};

/// Whether an interrupt belonged to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// No status bits were set
    None,
    Handled,
}

/// What the video path decided for one channel.
enum FieldOutcome {
    Idle,
    Reset,
    Complete(Completion),
}

impl<R: RegisterIo> Device<R> {
    /// Service one hardware interrupt.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let int_status = self.io.read(regs::DMA_INT_STATUS);
        let fifo_status = self.io.read(regs::DMA_INT_ERROR);
        if int_status == 0 && fifo_status & !regs::FIFO_VIDEO_LOSS_MASK == 0 {
            return IrqReturn::None;
        }
        log::trace!(
            "irq: status {:#010x} fifo {:#010x}",
            int_status,
            fifo_status
        );

        let mut reset = ChannelSet::new();
        if int_status & regs::INT_STATUS_TIMEOUT != 0 {
            log::warn!("DMA timeout, resetting all channels");
            for video in &self.video {
                video.stats.timeout();
                let mut state = lock(&video.state);
                if state.streaming {
                    state.weave = WeaveState::AwaitingField0;
                }
            }
            reset = ChannelSet::all();
        } else {
            let (enable, pb_status) = {
                let _dma = lock(&self.dma);
                (
                    self.io.read(regs::DMA_CHANNEL_ENABLE),
                    self.io.read(regs::DMA_PB_STATUS),
                )
            };

            let video_en = enable & regs::VIDEO_CHANNEL_MASK;
            let fifo_signal = !(fifo_status & regs::FIFO_VIDEO_LOSS_MASK) & video_en;
            let fifo_errors = fifo_signal
                & ((fifo_status >> regs::FIFO_OVERFLOW_SHIFT)
                    | (fifo_status >> regs::FIFO_BAD_SHIFT));
            let video = ChannelSet::from_register((int_status & video_en) | fifo_errors);
            let audio = ChannelSet::from_register(int_status & enable & regs::AUDIO_CHANNEL_MASK);

            for channel in video.video() {
                match self.video_field(self.channel(channel), fifo_status, pb_status) {
                    FieldOutcome::Idle => {}
                    FieldOutcome::Reset => reset.insert(DmaChannel::Video(channel)),
                    FieldOutcome::Complete(completion) => self.complete(completion),
                }
            }
            for channel in audio.audio() {
                self.audio_period(channel, pb_status);
            }
        }

        if !reset.is_empty() {
            self.reset_channels(&reset);
        }
        IrqReturn::Handled
    }

    /// Take `set` off the hardware and arm the deferred restore.
    fn reset_channels(&self, set: &ChannelSet) {
        {
            let mut dma = lock(&self.dma);
            let dma = &mut *dma;
            DmaController::new(&self.io).reset(set, &mut dma.pending);
            dma.enabled = dma.enabled.difference(&set.video_only());
            dma.last_fault = Some(self.clock.now());
        }
        self.scheduler
            .schedule(TimerTask::DeferredReset, self.config.deferred_reset_delay());
    }

    fn video_field(&self, video: &VideoChannel, fifo_status: u32, pb_status: u32) -> FieldOutcome {
        let channel = video.id;
        let bit = 1u32 << channel.index();
        let mut state = lock(&video.state);
        if !state.streaming {
            return FieldOutcome::Idle;
        }

        let lost = fifo_status & bit != 0;
        if state.no_signal && !lost {
            log::info!("{}: video signal recovered", channel);
            state.no_signal = false;
            state.weave = WeaveState::AwaitingField0;
            return FieldOutcome::Reset;
        }
        if lost && !state.no_signal {
            log::info!("{}: video signal lost", channel);
            video.stats.signal_lost();
        }
        state.no_signal = lost;

        if !lost {
            let overflow = (fifo_status >> regs::FIFO_OVERFLOW_SHIFT) & bit != 0;
            let bad = (fifo_status >> regs::FIFO_BAD_SHIFT) & bit != 0;
            if overflow || bad {
                log::warn!(
                    "{}: FIFO {}",
                    channel,
                    if overflow { "overflow" } else { "bad data" }
                );
                video.stats.dma_error();
                state.weave = WeaveState::AwaitingField0;
                return FieldOutcome::Reset;
            }
        }

        let status = SlotStatus::from_pb_status(pb_status, channel);
        let format = state.format;
        let starts_frame = match format.field {
            FieldMode::Alternate => true,
            FieldMode::Bottom => status.field == Field::Bottom,
            _ => status.field == Field::Top,
        };

        if video.queue.is_empty() {
            if starts_frame {
                log::debug!("{}: no buffer queued, frame dropped", channel);
                video.stats.frame_dropped();
            }
            state.weave = WeaveState::AwaitingField0;
            return FieldOutcome::Idle;
        }

        let Some(buffers) = state.buffers.as_ref() else {
            return FieldOutcome::Idle;
        };
        let source = buffers.get(status).clone();
        let single = format.field.is_single_field();

        if starts_frame {
            let copied = video.queue.with_front(|buffer| {
                source.with_data(|src| {
                    weave_field(src, buffer.data_mut(), &format, status.field, single)
                })
            });
            if copied != Some(true) {
                state.weave = WeaveState::AwaitingField0;
                return FieldOutcome::Idle;
            }
            if !single {
                state.weave = WeaveState::Field0Captured { slot: status.slot };
                return FieldOutcome::Idle;
            }

            let field = match (format.field, status.field) {
                (FieldMode::Alternate, Field::Top) => FieldMode::Top,
                (FieldMode::Alternate, Field::Bottom) => FieldMode::Bottom,
                (mode, _) => mode,
            };
            state.weave = WeaveState::AwaitingField0;
            return self.finish_frame(video, &mut state.sequence, field, format.size_image());
        }

        let WeaveState::Field0Captured { slot } = state.weave else {
            return FieldOutcome::Idle;
        };
        state.weave = WeaveState::AwaitingField0;
        if slot != status.slot {
            log::warn!(
                "{}: field slot mismatch ({} then {}), frame discarded",
                channel,
                slot,
                status.slot
            );
            video.stats.pb_mismatch();
            return FieldOutcome::Reset;
        }

        video.queue.with_front(|buffer| {
            source.with_data(|src| {
                weave_field(src, buffer.data_mut(), &format, status.field, false)
            })
        });
        self.finish_frame(video, &mut state.sequence, format.field, format.size_image())
    }

    /// Dequeue the head buffer as a finished frame.
    fn finish_frame(
        &self,
        video: &VideoChannel,
        sequence: &mut u32,
        field: FieldMode,
        bytes: usize,
    ) -> FieldOutcome {
        let Some(mut buffer) = video.queue.complete_front() else {
            return FieldOutcome::Idle;
        };
        buffer.set_bytes_used(bytes);

        let completion = Completion {
            channel: video.id,
            buffer,
            sequence: *sequence,
            timestamp: self.clock.timestamp(),
            field,
            state: BufferState::Done,
        };
        *sequence = sequence.wrapping_add(1);
        video.stats.frame_done();
        log::trace!("{}: frame {} done", video.id, completion.sequence);
        FieldOutcome::Complete(completion)
    }
}
