// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    audio::{AudioChannel, AudioDmaMode, AudioSink},
    channel::{ChannelId, ChannelSet, DmaChannel, MAX_CHANNELS},
    clock::{Clock, MonotonicClock},
    controls::FRAME_RATE_FULL,
    dma::{DmaController, PendingRegisters},
    format::{try_format, FieldMode, PixelFormat, VideoFormat},
    lock,
    memory::{DmaAllocator, HeapAllocator},
    pingpong::{self, FieldBuffers, Slot},
    queue::{BufferState, Completion, CompletionSink, FlushReason, FrameBuffer, FrameQueue},
    standard::{self, VideoStandard},
    stats::{ChannelStats, DeviceStats},
    watchdog::{ManualScheduler, Scheduler, TimerTask},
    Error,
};
use std::{
    env, fmt,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tw686x_sys::{regs, RegisterIo};

/// How each channel's video standard is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StandardSelect {
    /// Read the decoder's lock status on every open
    #[default]
    Auto,
    Ntsc,
    Pal,
}

impl StandardSelect {
    fn fixed(self) -> Option<VideoStandard> {
        match self {
            StandardSelect::Auto => None,
            StandardSelect::Ntsc => Some(VideoStandard::Ntsc),
            StandardSelect::Pal => Some(VideoStandard::Pal),
        }
    }
}

impl fmt::Display for StandardSelect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StandardSelect::Auto => write!(f, "auto"),
            StandardSelect::Ntsc => write!(f, "ntsc"),
            StandardSelect::Pal => write!(f, "pal"),
        }
    }
}

impl FromStr for StandardSelect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(StandardSelect::Auto),
            "ntsc" => Ok(StandardSelect::Ntsc),
            "pal" => Ok(StandardSelect::Pal),
            _ => Err(Error::InvalidArgument(format!(
                "unknown standard selection: {}",
                s
            ))),
        }
    }
}

/// Device-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    /// video standard selection for every channel, default is auto
    standard: StandardSelect,

    /// prefer a single field over interlaced output for short formats
    single_field: bool,

    /// how audio periods reach the ring buffer
    audio_mode: AudioDmaMode,

    /// delay between a DMA fault and the register restore
    deferred_reset_delay: Duration,

    /// resync watchdog period
    watchdog_period: Duration,

    /// delay before the first watchdog tick
    watchdog_initial_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            standard: StandardSelect::Auto,
            single_field: true,
            audio_mode: AudioDmaMode::Memcpy,
            deferred_reset_delay: Duration::from_millis(100),
            watchdog_period: Duration::from_millis(50),
            watchdog_initial_delay: Duration::from_millis(300),
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden by `TW686X_STANDARD` (`auto`, `ntsc` or `pal`).
    pub fn from_env() -> Result<Self, Error> {
        let config = DeviceConfig::default();
        match env::var("TW686X_STANDARD") {
            Ok(value) => Ok(config.with_standard(value.parse()?)),
            Err(_) => Ok(config),
        }
    }

    pub fn with_standard(self, standard: StandardSelect) -> Self {
        DeviceConfig { standard, ..self }
    }

    pub fn with_single_field(self, single_field: bool) -> Self {
        DeviceConfig {
            single_field,
            ..self
        }
    }

    pub fn with_audio_mode(self, audio_mode: AudioDmaMode) -> Self {
        DeviceConfig { audio_mode, ..self }
    }

    pub fn with_deferred_reset_delay(self, deferred_reset_delay: Duration) -> Self {
        DeviceConfig {
            deferred_reset_delay,
            ..self
        }
    }

    pub fn with_watchdog_period(self, watchdog_period: Duration) -> Self {
        DeviceConfig {
            watchdog_period,
            ..self
        }
    }

    pub fn with_watchdog_initial_delay(self, watchdog_initial_delay: Duration) -> Self {
        DeviceConfig {
            watchdog_initial_delay,
            ..self
        }
    }

    pub fn standard(&self) -> StandardSelect {
        self.standard
    }

    pub fn single_field(&self) -> bool {
        self.single_field
    }

    pub fn audio_mode(&self) -> AudioDmaMode {
        self.audio_mode
    }

    pub fn deferred_reset_delay(&self) -> Duration {
        self.deferred_reset_delay
    }

    pub fn watchdog_period(&self) -> Duration {
        self.watchdog_period
    }

    pub fn watchdog_initial_delay(&self) -> Duration {
        self.watchdog_initial_delay
    }
}

/// Progress through the two fields of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WeaveState {
    Idle,
    AwaitingField0,
    Field0Captured { slot: Slot },
}

#[derive(Debug)]
pub(crate) struct ChannelState {
    pub(crate) format: VideoFormat,
    pub(crate) standard: VideoStandard,
    pub(crate) opened: bool,
    pub(crate) streaming: bool,
    pub(crate) no_signal: bool,
    pub(crate) weave: WeaveState,
    pub(crate) sequence: u32,
    pub(crate) frame_rate_mask: u32,
    pub(crate) buffers: Option<FieldBuffers>,
}

/// A video input: negotiated state, buffer queue and counters.
#[derive(Debug)]
pub(crate) struct VideoChannel {
    pub(crate) id: ChannelId,
    pub(crate) state: Mutex<ChannelState>,
    pub(crate) queue: FrameQueue,
    pub(crate) stats: ChannelStats,
}

impl VideoChannel {
    fn new(id: ChannelId, standard: VideoStandard) -> Self {
        VideoChannel {
            id,
            state: Mutex::new(ChannelState {
                format: VideoFormat::default_for(standard),
                standard,
                opened: false,
                streaming: false,
                no_signal: false,
                weave: WeaveState::Idle,
                sequence: 0,
                frame_rate_mask: FRAME_RATE_FULL,
                buffers: None,
            }),
            queue: FrameQueue::new(),
            stats: ChannelStats::default(),
        }
    }
}

/// State shared by every channel, guarded by the device lock.
#[derive(Debug, Default)]
pub(crate) struct DmaState {
    /// video channels the consumer has started
    pub(crate) requested: ChannelSet,
    /// video channels the core believes are running
    pub(crate) enabled: ChannelSet,
    pub(crate) pending: PendingRegisters,
    pub(crate) last_fault: Option<Duration>,
    pub(crate) audio_running: ChannelSet,
    pub(crate) audio_rate: Option<u32>,
    pub(crate) audio_period_size: Option<usize>,
}

/// Software view of the DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaStatus {
    /// Video channels started by the consumer
    pub requested: ChannelSet,
    /// Video channels the core considers running
    pub enabled: ChannelSet,
    /// Engines waiting for the deferred restore
    pub pending_reset: ChannelSet,
    /// Audio channels started by the consumer
    pub audio_running: ChannelSet,
}

/// A TW686x adapter.
///
/// All methods take `&self`; the device is shared between the consumer,
/// the interrupt handler and the timer host, typically behind an [`Arc`].
pub struct Device<R: RegisterIo> {
    pub(crate) io: R,
    pub(crate) config: DeviceConfig,
    pub(crate) allocator: Box<dyn DmaAllocator>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    completion_sink: Option<Box<dyn CompletionSink>>,
    pub(crate) audio_sink: Option<Box<dyn AudioSink>>,
    pub(crate) dma: Mutex<DmaState>,
    start_lock: Mutex<()>,
    pub(crate) video: [VideoChannel; MAX_CHANNELS],
    pub(crate) audio: [AudioChannel; MAX_CHANNELS],
}

impl<R: RegisterIo> fmt::Debug for Device<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("dma", &*lock(&self.dma))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Device`].
pub struct DeviceBuilder<R: RegisterIo> {
    io: R,
    config: DeviceConfig,
    allocator: Option<Box<dyn DmaAllocator>>,
    clock: Option<Box<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    completion_sink: Option<Box<dyn CompletionSink>>,
    audio_sink: Option<Box<dyn AudioSink>>,
}

impl<R: RegisterIo> DeviceBuilder<R> {
    pub fn with_config(self, config: DeviceConfig) -> Self {
        DeviceBuilder { config, ..self }
    }

    /// Source of field and audio DMA memory, default is [`HeapAllocator`].
    pub fn with_allocator<A: DmaAllocator + 'static>(self, allocator: A) -> Self {
        DeviceBuilder {
            allocator: Some(Box::new(allocator)),
            ..self
        }
    }

    /// Time source for timestamps and fault debouncing, default is
    /// [`MonotonicClock`].
    pub fn with_clock<C: Clock + 'static>(self, clock: C) -> Self {
        DeviceBuilder {
            clock: Some(Box::new(clock)),
            ..self
        }
    }

    /// Host for the recovery timers. Without one the timers are armed on a
    /// private [`ManualScheduler`] and never fire.
    pub fn with_scheduler<S: Scheduler + 'static>(self, scheduler: Arc<S>) -> Self {
        DeviceBuilder {
            scheduler: Some(scheduler),
            ..self
        }
    }

    pub fn with_completion_sink<S: CompletionSink + 'static>(self, sink: S) -> Self {
        DeviceBuilder {
            completion_sink: Some(Box::new(sink)),
            ..self
        }
    }

    pub fn with_audio_sink<S: AudioSink + 'static>(self, sink: S) -> Self {
        DeviceBuilder {
            audio_sink: Some(Box::new(sink)),
            ..self
        }
    }

    /// Initialise the hardware and arm the resync watchdog.
    pub fn build(self) -> Result<Device<R>, Error> {
        let allocator = self
            .allocator
            .unwrap_or_else(|| Box::new(HeapAllocator::new()));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ManualScheduler::new()));
        let standard = self.config.standard.fixed().unwrap_or(VideoStandard::Ntsc);

        let io = self.io;
        DmaController::new(&io).halt();
        let control = io.read(regs::AUDIO_CONTROL1);
        io.write(
            regs::AUDIO_CONTROL1,
            control | regs::AUDIO_CONTROL1_EXTERNAL,
        );

        let mut audio = Vec::with_capacity(MAX_CHANNELS);
        for id in ChannelId::all() {
            audio.push(AudioChannel::init(
                &io,
                allocator.as_ref(),
                id,
                self.config.audio_mode,
            )?);
        }
        let audio: [AudioChannel; MAX_CHANNELS] = audio
            .try_into()
            .map_err(|_| Error::InvalidArgument("audio channel count".to_owned()))?;

        let device = Device {
            io,
            config: self.config,
            allocator,
            clock: self
                .clock
                .unwrap_or_else(|| Box::new(MonotonicClock::new())),
            scheduler,
            completion_sink: self.completion_sink,
            audio_sink: self.audio_sink,
            dma: Mutex::new(DmaState::default()),
            start_lock: Mutex::new(()),
            video: std::array::from_fn(|i| {
                VideoChannel::new(ChannelId::from_index(i), standard)
            }),
            audio,
        };

        device.scheduler.schedule(
            TimerTask::ResyncWatchdog,
            device.config.watchdog_initial_delay,
        );
        log::info!(
            "tw686x ready: {} channels, standard {}, audio {}",
            MAX_CHANNELS,
            device.config.standard,
            device.config.audio_mode
        );
        Ok(device)
    }
}

impl<R: RegisterIo> Device<R> {
    pub fn builder(io: R) -> DeviceBuilder<R> {
        DeviceBuilder {
            io,
            config: DeviceConfig::default(),
            allocator: None,
            clock: None,
            scheduler: None,
            completion_sink: None,
            audio_sink: None,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Register backend.
    pub fn io(&self) -> &R {
        &self.io
    }

    pub(crate) fn channel(&self, channel: ChannelId) -> &VideoChannel {
        &self.video[channel.index()]
    }

    /// Prepare a channel for use, detecting or programming its standard.
    ///
    /// Detection runs on the first open and, with [`StandardSelect::Auto`],
    /// on every later open of an idle channel. A change of standard
    /// re-validates the current format against the new geometry.
    pub fn open(&self, channel: ChannelId) -> Result<VideoFormat, Error> {
        let mut state = lock(&self.channel(channel).state);
        if state.streaming {
            return Ok(state.format);
        }

        let standard = match self.config.standard.fixed() {
            Some(standard) => {
                if !state.opened {
                    standard::program(&self.io, channel, standard);
                }
                standard
            }
            None => standard::detect(&self.io, channel),
        };

        if !state.opened {
            state.format = VideoFormat::default_for(standard);
        } else if standard != state.standard {
            let current = state.format;
            state.format = try_format(
                standard,
                current.width,
                current.height,
                current.pixel_format,
                current.field,
                self.config.single_field,
            )?;
        }
        state.standard = standard;
        state.opened = true;
        log::debug!("{}: opened with {}", channel, state.format);
        Ok(state.format)
    }

    /// Stop the channel if it is streaming and release its field buffers.
    pub fn close(&self, channel: ChannelId) -> Result<(), Error> {
        if lock(&self.channel(channel).state).streaming {
            self.stop(channel)?;
        }
        {
            let mut state = lock(&self.channel(channel).state);
            state.buffers = None;
            state.opened = false;
        }
        self.flush(channel, FlushReason::Close);
        log::debug!("{}: closed", channel);
        Ok(())
    }

    /// Negotiate and apply a capture format. Fails with [`Error::Busy`]
    /// while the channel is streaming.
    pub fn set_format(
        &self,
        channel: ChannelId,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        field: FieldMode,
    ) -> Result<VideoFormat, Error> {
        let mut state = lock(&self.channel(channel).state);
        if state.streaming {
            return Err(Error::Busy("format change while streaming"));
        }

        let format = try_format(
            state.standard,
            width,
            height,
            pixel_format,
            field,
            self.config.single_field,
        )?;
        state.format = format;
        if state.buffers.is_some() {
            self.program_geometry(channel, state.standard, &format);
        }
        log::info!("{}: format {}", channel, format);
        Ok(format)
    }

    /// Negotiate without applying.
    pub fn try_format(
        &self,
        channel: ChannelId,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        field: FieldMode,
    ) -> Result<VideoFormat, Error> {
        let standard = lock(&self.channel(channel).state).standard;
        try_format(
            standard,
            width,
            height,
            pixel_format,
            field,
            self.config.single_field,
        )
    }

    pub fn format(&self, channel: ChannelId) -> VideoFormat {
        lock(&self.channel(channel).state).format
    }

    /// Force a video standard. Fails with [`Error::Busy`] while the channel
    /// is streaming.
    pub fn set_standard(&self, channel: ChannelId, standard: VideoStandard) -> Result<(), Error> {
        let mut state = lock(&self.channel(channel).state);
        if state.streaming {
            return Err(Error::Busy("standard change while streaming"));
        }

        standard::program(&self.io, channel, standard);
        let current = state.format;
        state.format = try_format(
            standard,
            current.width,
            current.height,
            current.pixel_format,
            current.field,
            self.config.single_field,
        )?;
        state.standard = standard;
        log::info!("{}: standard {}, format {}", channel, standard, state.format);
        Ok(())
    }

    pub fn standard(&self, channel: ChannelId) -> VideoStandard {
        lock(&self.channel(channel).state).standard
    }

    pub fn is_streaming(&self, channel: ChannelId) -> bool {
        lock(&self.channel(channel).state).streaming
    }

    /// Queue a buffer for capture. It must hold one image of the current
    /// format.
    pub fn enqueue(&self, channel: ChannelId, buffer: FrameBuffer) -> Result<(), Error> {
        let required = self.format(channel).size_image();
        if buffer.capacity() < required {
            return Err(Error::BufferTooSmall {
                required,
                capacity: buffer.capacity(),
            });
        }
        self.channel(channel).queue.push(buffer);
        Ok(())
    }

    /// Buffers waiting on `channel`.
    pub fn queued(&self, channel: ChannelId) -> usize {
        self.channel(channel).queue.len()
    }

    /// Program the channel's DMA and start capturing into queued buffers.
    pub fn start(&self, channel: ChannelId) -> Result<(), Error> {
        let _guard = lock(&self.start_lock);
        let video = self.channel(channel);

        {
            let mut state = lock(&video.state);
            if state.streaming {
                return Err(Error::Busy("stream already started"));
            }
            if state.buffers.is_none() {
                state.buffers = Some(FieldBuffers::allocate(self.allocator.as_ref())?);
            }

            let format = state.format;
            standard::resize(
                &self.io,
                channel,
                state.standard,
                format.width,
                format.field_lines(),
            );
            if let Some(buffers) = &state.buffers {
                buffers.program(&self.io, channel, &format);
            }
            pingpong::program_channel_config(&self.io, channel, &format);
            self.io.write(
                regs::DROP_FIELD_REG0 + channel.index() as u32,
                state.frame_rate_mask,
            );

            state.sequence = 0;
            state.no_signal = false;
            state.weave = WeaveState::AwaitingField0;
            state.streaming = true;
        }

        let dma_channel = DmaChannel::Video(channel);
        {
            let mut dma = lock(&self.dma);
            dma.requested.insert(dma_channel);
            dma.enabled.insert(dma_channel);
            dma.pending.include(dma_channel);
            DmaController::new(&self.io).enable(dma_channel);
        }

        log::info!("{}: streaming {}", channel, self.format(channel));
        Ok(())
    }

    /// Stop capturing and hand every queued buffer back with
    /// [`BufferState::Error`].
    pub fn stop(&self, channel: ChannelId) -> Result<(), Error> {
        let _guard = lock(&self.start_lock);
        let video = self.channel(channel);
        if !lock(&video.state).streaming {
            return Err(Error::NotStreaming);
        }

        let dma_channel = DmaChannel::Video(channel);
        {
            let mut dma = lock(&self.dma);
            DmaController::new(&self.io).disable(dma_channel);
            dma.requested.remove(dma_channel);
            dma.enabled.remove(dma_channel);
            dma.pending.exclude(dma_channel);
        }

        {
            let mut state = lock(&video.state);
            state.streaming = false;
            state.no_signal = false;
            state.weave = WeaveState::Idle;
        }
        self.flush(channel, FlushReason::StreamStop);

        log::info!("{}: stopped", channel);
        Ok(())
    }

    /// Stop every stream, turn off external audio and halt the DMA engine.
    pub fn shutdown(&self) {
        for channel in ChannelId::all() {
            if self.is_streaming(channel) {
                if let Err(err) = self.stop(channel) {
                    log::warn!("{}: stop during shutdown failed: {}", channel, err);
                }
            }
            self.flush(channel, FlushReason::Shutdown);
            self.stop_audio(channel);
        }

        let _dma = lock(&self.dma);
        DmaController::new(&self.io).halt();
        let control = self.io.read(regs::AUDIO_CONTROL1);
        self.io.write(
            regs::AUDIO_CONTROL1,
            control & !regs::AUDIO_CONTROL1_EXTERNAL,
        );
        log::info!("tw686x shut down");
    }

    /// Counters for every channel.
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            channels: std::array::from_fn(|i| self.video[i].stats.snapshot()),
        }
    }

    pub fn channel_stats(&self, channel: ChannelId) -> &ChannelStats {
        &self.channel(channel).stats
    }

    pub fn dma_status(&self) -> DmaStatus {
        let dma = lock(&self.dma);
        DmaStatus {
            requested: dma.requested,
            enabled: dma.enabled,
            pending_reset: dma.pending.channels(),
            audio_running: dma.audio_running,
        }
    }

    fn program_geometry(&self, channel: ChannelId, standard: VideoStandard, format: &VideoFormat) {
        standard::resize(
            &self.io,
            channel,
            standard,
            format.width,
            format.field_lines(),
        );
        pingpong::program_geometry(&self.io, channel, format);
        pingpong::program_channel_config(&self.io, channel, format);
    }

    pub(crate) fn complete(&self, completion: Completion) {
        if let Some(sink) = &self.completion_sink {
            sink.buffer_done(completion);
        }
    }

    /// Return every queued buffer of `channel` with an error state.
    fn flush(&self, channel: ChannelId, reason: FlushReason) {
        let video = self.channel(channel);
        let (sequence, field) = {
            let state = lock(&video.state);
            (state.sequence, state.format.field)
        };

        let buffers = video.queue.flush();
        if buffers.is_empty() {
            return;
        }
        log::debug!(
            "{}: returning {} buffers on {}",
            channel,
            buffers.len(),
            reason
        );
        let timestamp = self.clock.timestamp();
        for buffer in buffers {
            self.complete(Completion {
                channel,
                buffer,
                sequence,
                timestamp,
                field,
                state: BufferState::Error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;

    fn device(hw: &Arc<SimulatedHardware>) -> Device<Arc<SimulatedHardware>> {
        Device::builder(hw.clone())
            .with_allocator(hw.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = DeviceConfig::default()
            .with_standard(StandardSelect::Pal)
            .with_single_field(false)
            .with_watchdog_period(Duration::from_millis(20));
        assert_eq!(config.standard(), StandardSelect::Pal);
        assert!(!config.single_field());
        assert_eq!(config.watchdog_period(), Duration::from_millis(20));
        assert_eq!(config.deferred_reset_delay(), Duration::from_millis(100));
        assert_eq!(config.watchdog_initial_delay(), Duration::from_millis(300));
        assert!("secam".parse::<StandardSelect>().is_err());
    }

    #[test]
    fn test_build_initialises_hardware() {
        let hw = Arc::new(SimulatedHardware::new());
        hw.set_register(regs::DMA_CHANNEL_ENABLE, 0xffff);
        let scheduler = Arc::new(ManualScheduler::new());
        let _device = Device::builder(hw.clone())
            .with_allocator(hw.clone())
            .with_scheduler(scheduler.clone())
            .build()
            .unwrap();

        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0);
        assert_eq!(hw.register(regs::DMA_CMD), 0);
        assert_eq!(hw.register(regs::AUDIO_CONTROL1) & 1, 1);
        assert_ne!(hw.register(regs::ADMA_P_ADDR0), 0);
        assert_eq!(
            scheduler.pending(TimerTask::ResyncWatchdog),
            Some(Duration::from_millis(300))
        );
    }

    #[test]
    fn test_open_detects_standard() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(4).unwrap();

        hw.set_video_standard(ch, VideoStandard::Pal);
        let format = device.open(ch).unwrap();
        assert_eq!(device.standard(ch), VideoStandard::Pal);
        assert_eq!((format.width, format.height), (720, 576));

        // A later open of an idle channel follows the source
        hw.set_video_standard(ch, VideoStandard::Ntsc);
        let format = device.open(ch).unwrap();
        assert_eq!(device.standard(ch), VideoStandard::Ntsc);
        assert_eq!(format.height, 480);
    }

    #[test]
    fn test_fixed_standard_is_programmed() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = Device::builder(hw.clone())
            .with_allocator(hw.clone())
            .with_config(DeviceConfig::default().with_standard(StandardSelect::Pal))
            .build()
            .unwrap();
        let ch = ChannelId::new(1).unwrap();

        device.open(ch).unwrap();
        assert_eq!(device.standard(ch), VideoStandard::Pal);
        assert_eq!(hw.register(regs::MISC_CONTROL3), 0xc5);
        assert_eq!(hw.register(regs::decoder_reg(regs::DECODER0_SDT, 1)), 1);
    }

    #[test]
    fn test_busy_while_streaming() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(0).unwrap();
        device.open(ch).unwrap();
        device.start(ch).unwrap();

        assert!(matches!(
            device.set_format(ch, 352, 240, PixelFormat::Yuyv, FieldMode::Any),
            Err(Error::Busy(_))
        ));
        assert!(matches!(
            device.set_standard(ch, VideoStandard::Pal),
            Err(Error::Busy(_))
        ));
        assert!(matches!(device.start(ch), Err(Error::Busy(_))));
        assert_eq!(device.format(ch), VideoFormat::default_for(VideoStandard::Ntsc));

        device.stop(ch).unwrap();
        assert!(matches!(device.stop(ch), Err(Error::NotStreaming)));
        assert!(device.set_standard(ch, VideoStandard::Pal).is_ok());
        assert_eq!(device.format(ch).height, 480);
    }

    #[test]
    fn test_enqueue_checks_size() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(2).unwrap();
        device.open(ch).unwrap();

        match device.enqueue(ch, FrameBuffer::new(0, 4096)) {
            Err(Error::BufferTooSmall { required, capacity }) => {
                assert_eq!(required, 720 * 480 * 2);
                assert_eq!(capacity, 4096);
            }
            other => panic!("unexpected result {:?}", other),
        }
        device
            .enqueue(ch, FrameBuffer::new(1, 720 * 480 * 2))
            .unwrap();
        assert_eq!(device.queued(ch), 1);
    }

    #[test]
    fn test_start_programs_channel() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(3).unwrap();
        device.open(ch).unwrap();
        device
            .set_format(ch, 352, 240, PixelFormat::Uyvy, FieldMode::Any)
            .unwrap();
        device.start(ch).unwrap();

        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 1 << 3);
        assert_eq!(hw.register(regs::DMA_CMD), regs::DMA_CMD_RUN | (1 << 3));
        assert_eq!(hw.register(regs::DROP_FIELD_REG0 + 3), FRAME_RATE_FULL);
        assert_eq!(hw.register(regs::VIDEO_SIZE_REG0 + 3), 352 | (240 << 16) | (1 << 31));
        assert_ne!(hw.register(regs::bdma_reg(regs::BDMA_ADDR_P_0, 3)), 0);
        assert_eq!(
            (hw.register(regs::DMA_CH0_CONFIG + 3) >> 20) & 7,
            regs::VIDEO_FORMAT_UYVY
        );

        let status = device.dma_status();
        assert!(status.requested.contains(DmaChannel::Video(ch)));
        assert!(status.enabled.contains(DmaChannel::Video(ch)));
    }

    #[test]
    fn test_close_releases_buffers() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(0).unwrap();
        device.open(ch).unwrap();
        device.start(ch).unwrap();
        device.close(ch).unwrap();

        assert!(!device.is_streaming(ch));
        assert!(lock(&device.channel(ch).state).buffers.is_none());
        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0);
    }

    #[test]
    fn test_shutdown_halts() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        for ch in ChannelId::all().take(3) {
            device.open(ch).unwrap();
            device.start(ch).unwrap();
        }
        device.shutdown();

        assert_eq!(hw.register(regs::DMA_CHANNEL_ENABLE), 0);
        assert_eq!(hw.register(regs::DMA_CMD), 0);
        assert_eq!(hw.register(regs::AUDIO_CONTROL1) & 1, 0);
        assert!(device.dma_status().requested.is_empty());
    }
}
