// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tw686x::pingpong::{Field, Slot, SlotStatus};
use tw686x::sim::SimulatedHardware;
use tw686x::{
    ChannelId, Completion, Device, DeviceConfig, FieldMode, FrameBuffer, ManualClock,
    ManualScheduler, PeriodElapsed, PixelFormat, VideoFormat, VideoStandard,
};

/// A simulated adapter with virtual time and recording sinks.
pub struct Rig {
    pub hw: Arc<SimulatedHardware>,
    pub device: Device<Arc<SimulatedHardware>>,
    pub clock: Arc<ManualClock>,
    pub timers: Arc<ManualScheduler>,
    completions: Arc<Mutex<Vec<Completion>>>,
    periods: Arc<Mutex<Vec<PeriodElapsed>>>,
}

impl Rig {
    pub fn new() -> Self {
        Rig::with_config(DeviceConfig::default())
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let hw = Arc::new(SimulatedHardware::new());
        let clock = Arc::new(ManualClock::new());
        let timers = Arc::new(ManualScheduler::new());
        let completions = Arc::new(Mutex::new(Vec::new()));
        let periods = Arc::new(Mutex::new(Vec::new()));

        let done = completions.clone();
        let elapsed = periods.clone();
        let device = Device::builder(hw.clone())
            .with_config(config)
            .with_allocator(hw.clone())
            .with_clock(clock.clone())
            .with_scheduler(timers.clone())
            .with_completion_sink(move |c: Completion| done.lock().unwrap().push(c))
            .with_audio_sink(move |p: PeriodElapsed| elapsed.lock().unwrap().push(p))
            .build()
            .unwrap();

        Rig {
            hw,
            device,
            clock,
            timers,
            completions,
            periods,
        }
    }

    /// Open `channel` on a `standard` source, apply the format, queue
    /// `buffers` buffers and start streaming.
    pub fn stream(
        &self,
        channel: ChannelId,
        standard: VideoStandard,
        width: u32,
        height: u32,
        field: FieldMode,
        buffers: u32,
    ) -> VideoFormat {
        self.hw.set_video_standard(channel, standard);
        self.device.open(channel).unwrap();
        let format = self
            .device
            .set_format(channel, width, height, PixelFormat::Yuyv, field)
            .unwrap();
        for i in 0..buffers {
            self.device
                .enqueue(channel, FrameBuffer::new(i, format.size_image()))
                .unwrap();
        }
        self.device.start(channel).unwrap();
        format
    }

    /// Deliver one field and run the interrupt handler.
    pub fn field(&self, channel: ChannelId, field: Field, slot: Slot, data: &[u8]) -> bool {
        let delivered = self
            .hw
            .deliver_field(channel, SlotStatus::new(field, slot), data);
        self.device.handle_interrupt();
        delivered
    }

    /// Deliver a matching top and bottom field filled with `fill`.
    pub fn frame(&self, channel: ChannelId, format: &VideoFormat, slot: Slot, fill: u8) {
        let field = vec![fill; format.field_size()];
        self.field(channel, Field::Top, slot, &field);
        self.field(channel, Field::Bottom, slot, &field);
    }

    /// Move virtual time forward in 10 ms steps, running due timers.
    pub fn advance(&self, by: Duration) {
        let step = Duration::from_millis(10);
        let mut left = by;
        while !left.is_zero() {
            let dt = left.min(step);
            self.clock.advance(dt);
            for task in self.timers.advance(dt) {
                self.device.run_timer(task);
            }
            left -= dt;
        }
    }

    pub fn take_completions(&self) -> Vec<Completion> {
        std::mem::take(&mut *self.completions.lock().unwrap())
    }

    pub fn take_periods(&self) -> Vec<PeriodElapsed> {
        std::mem::take(&mut *self.periods.lock().unwrap())
    }
}

pub fn ch(index: usize) -> ChannelId {
    ChannelId::new(index).unwrap()
}
