// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! TW686x capture core for Rust
//!
//! Interrupt-driven acquisition engine for Techwell TW686x multi-channel
//! analog video adapters. The core drives the per-channel DMA engines for up
//! to eight video inputs and their mirrored audio channels, weaves the two
//! hardware fields of each interlaced frame into consumer buffers, and
//! recovers channels from FIFO faults and DMA timeouts without stopping the
//! rest of the device.
//!
//! The host environment supplies three things: register access through
//! [`RegisterIo`](tw686x_sys::RegisterIo), calls to
//! [`Device::handle_interrupt`] from its interrupt handler, and a
//! [`Scheduler`](watchdog::Scheduler) that runs the two recovery timers.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use tw686x::{ChannelId, Device, FieldMode, FrameBuffer, PixelFormat, VideoStandard};
//! use tw686x::pingpong::{Field, Slot, SlotStatus};
//! use tw686x::sim::SimulatedHardware;
//!
//! let hw = Arc::new(SimulatedHardware::new());
//! let done = Arc::new(Mutex::new(Vec::new()));
//! let sink = done.clone();
//! let device = Device::builder(hw.clone())
//!     .with_allocator(hw.clone())
//!     .with_completion_sink(move |c: tw686x::Completion| sink.lock().unwrap().push(c.sequence))
//!     .build()?;
//!
//! let ch = ChannelId::new(0)?;
//! hw.set_video_standard(ch, VideoStandard::Pal);
//! device.open(ch)?;
//! let format = device.set_format(ch, 720, 576, PixelFormat::Yuyv, FieldMode::Interlaced)?;
//! device.enqueue(ch, FrameBuffer::new(0, format.size_image()))?;
//! device.start(ch)?;
//!
//! hw.deliver_field(ch, SlotStatus::new(Field::Top, Slot::P), &vec![0x80; 1440 * 288]);
//! device.handle_interrupt();
//! hw.deliver_field(ch, SlotStatus::new(Field::Bottom, Slot::P), &vec![0x10; 1440 * 288]);
//! device.handle_interrupt();
//!
//! assert_eq!(*done.lock().unwrap(), vec![0]);
//! # Ok::<(), tw686x::Error>(())
//! ```
//!
//! # Features
//!
//! - Ping-pong (P/B) field DMA with slot-consistent field weaving
//! - Single-field, alternate and interlaced output
//! - FIFO error, signal loss and DMA timeout recovery with deferred reset
//! - Resync watchdog reconciling requested and enabled channels
//! - Audio period DMA in copy or register-pointer mode
//! - Register-level simulator for tests and offline runs

use std::{
    error, fmt,
    num::TryFromIntError,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Error type for capture core operations
#[derive(Debug)]
pub enum Error {
    /// The request conflicts with an active stream (format or rate change
    /// while streaming, start while already started)
    Busy(&'static str),

    /// Channel index outside `0..8`
    InvalidChannel(usize),

    /// Pixel format the hardware cannot produce
    UnsupportedFormat(FourCC),

    /// Parameter outside the range the hardware accepts
    InvalidArgument(String),

    /// Consumer buffer smaller than the negotiated image size
    BufferTooSmall {
        /// Bytes needed for one image in the current format
        required: usize,
        /// Bytes the buffer provides
        capacity: usize,
    },

    /// Audio start requested before a successful prepare
    NotPrepared,

    /// Stop requested on a channel that is not streaming
    NotStreaming,

    /// The DMA allocator could not provide a buffer of the given size
    DmaAlloc(usize),

    /// Integer conversion error (try_from failed)
    TryFromInt(TryFromIntError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Busy(what) => write!(f, "device busy: {}", what),
            Error::InvalidChannel(index) => write!(f, "invalid channel index {}", index),
            Error::UnsupportedFormat(fourcc) => {
                write!(f, "unsupported pixel format {}", fourcc)
            }
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::BufferTooSmall { required, capacity } => write!(
                f,
                "buffer too small: {} bytes required, {} available",
                required, capacity
            ),
            Error::NotPrepared => write!(f, "audio channel not prepared"),
            Error::NotStreaming => write!(f, "channel is not streaming"),
            Error::DmaAlloc(size) => write!(f, "failed to allocate {} bytes of DMA memory", size),
            Error::TryFromInt(err) => write!(f, "Integer conversion error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::TryFromInt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::TryFromInt(err)
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Interrupt and timer paths must keep running after a consumer thread
/// panics while holding a channel lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The audio module mirrors the video ping-pong scheme for PCM periods.
pub mod audio;

/// The channel module provides typed channel identifiers and sets.
pub mod channel;

/// The clock module provides monotonic time for timestamps and debouncing.
pub mod clock;

/// Picture controls, input status and frame-rate decimation.
pub mod controls;

/// The device module owns channels, locks and stream control.
pub mod device;

/// The dma module provides the channel enable and command sequences.
pub mod dma;

/// The format module provides pixel formats, field modes and negotiation.
pub mod format;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

mod irq;

/// The memory module provides DMA-coherent buffers and allocators.
pub mod memory;

/// The pingpong module manages the four hardware field buffers per channel.
pub mod pingpong;

/// The queue module holds consumer buffers awaiting completion.
pub mod queue;

/// Register-level hardware model used by tests and the CLI simulator.
pub mod sim;

/// Video standard detection and decoder geometry.
pub mod standard;

/// Per-channel capture statistics.
pub mod stats;

/// Thread-backed host for the recovery timers.
pub mod timer;

/// Deferred reset and resync watchdog timers.
pub mod watchdog;

/// The weave module copies hardware fields into output frames.
pub mod weave;

pub use audio::{AudioDmaMode, AudioParams, AudioSink, PeriodElapsed};
pub use channel::{ChannelId, ChannelSet, DmaChannel, MAX_CHANNELS};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use controls::{Control, InputStatus};
pub use device::{Device, DeviceBuilder, DeviceConfig, DmaStatus, StandardSelect};
pub use format::{FieldMode, PixelFormat, VideoFormat};
pub use fourcc::FourCC;
pub use irq::IrqReturn;
pub use memory::{DmaAllocator, DmaBuffer, HeapAllocator};
pub use queue::{BufferState, Completion, CompletionSink, FlushReason, FrameBuffer};
pub use standard::VideoStandard;
pub use stats::{ChannelStats, DeviceStats, StatsSnapshot};
pub use watchdog::{ManualScheduler, Scheduler, TimerTask};
