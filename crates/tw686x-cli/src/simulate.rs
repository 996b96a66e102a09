// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::{self, FrameMetrics, MetricsCollector};
use crate::utils;
use clap::Args as ClapArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tw686x::pingpong::{Field, Slot, SlotStatus};
use tw686x::sim::{FifoError, SimulatedHardware};
use tw686x::{
    AudioParams, BufferState, ChannelId, Clock, Completion, Device, DeviceConfig, FieldMode,
    FrameBuffer, ManualClock, ManualScheduler, PeriodElapsed, PixelFormat, StandardSelect,
    VideoStandard,
};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Channels to capture ("0,2,5", "0-3" or "all")
    #[arg(short, long, default_value = "0")]
    channels: String,

    /// Video standard of the simulated sources (ntsc or pal)
    #[arg(short, long, default_value = "ntsc")]
    standard: String,

    /// Resolution in WxH format (defaults to the full frame)
    #[arg(short, long)]
    resolution: Option<String>,

    /// Pixel format FOURCC
    #[arg(long, default_value = "YUYV")]
    format: String,

    /// Field order (any, top, bottom, interlaced, alternate)
    #[arg(long, default_value = "interlaced")]
    field: String,

    /// Frames to capture per channel
    #[arg(short, long, default_value = "100")]
    frames: u64,

    /// Buffers queued per channel
    #[arg(short, long, default_value = "4")]
    buffers: u32,

    /// Probability of a fault on each field interrupt (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    fault_rate: f64,

    /// Seed for fault injection
    #[arg(long)]
    seed: Option<u64>,

    /// Also capture audio on each channel at this sample rate
    #[arg(long)]
    audio_rate: Option<u32>,

    /// Print the per-channel statistics table
    #[arg(long)]
    stats: bool,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Overflow,
    BadData,
    Timeout,
    SlotMismatch,
    SignalLoss,
}

const FAULTS: [Fault; 5] = [
    Fault::Overflow,
    Fault::BadData,
    Fault::Timeout,
    Fault::SlotMismatch,
    Fault::SignalLoss,
];

/// Simulated run summary
#[derive(Debug, Serialize)]
struct Report {
    standard: String,
    format: String,
    seed: u64,
    fields_delivered: u64,
    faults_injected: u64,
    audio_periods: u64,
    channels: Vec<FrameMetrics>,
}

struct ChannelRun {
    channel: ChannelId,
    collector: MetricsCollector,
    frames: u64,
    field: Field,
    slot: Slot,
    signal_back_at: Option<u64>,
}

type SimDevice = Device<Arc<SimulatedHardware>>;

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Simulation parameters: {:?}", args);

    let channels = utils::parse_channels(&args.channels)?;
    let standard: VideoStandard = args.standard.parse()?;
    let pixel_format: PixelFormat = args.format.parse()?;
    let field: FieldMode = args.field.parse()?;
    let (width, height) = match &args.resolution {
        Some(resolution) => utils::parse_resolution(resolution)?,
        None => (standard.width(), standard.height()),
    };
    if !(0.0..=1.0).contains(&args.fault_rate) {
        return Err(CliError::InvalidArgs(format!(
            "Fault rate must be between 0 and 1: {}",
            args.fault_rate
        )));
    }
    let audio = args
        .audio_rate
        .map(|rate| AudioParams::new(rate, 4096, 4))
        .transpose()?;

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    let term = utils::install_signal_handler()?;

    let hw = Arc::new(SimulatedHardware::new());
    let clock = Arc::new(ManualClock::new());
    let timers = Arc::new(ManualScheduler::new());
    let completions: Arc<Mutex<Vec<Completion>>> = Arc::new(Mutex::new(Vec::new()));
    let audio_periods = Arc::new(AtomicU64::new(0));

    let sink = completions.clone();
    let periods = audio_periods.clone();
    let device = Device::builder(hw.clone())
        .with_config(DeviceConfig::default().with_standard(StandardSelect::Auto))
        .with_allocator(hw.clone())
        .with_clock(clock.clone())
        .with_scheduler(timers.clone())
        .with_completion_sink(move |c: Completion| {
            sink.lock().unwrap_or_else(|e| e.into_inner()).push(c)
        })
        .with_audio_sink(move |_: PeriodElapsed| {
            periods.fetch_add(1, Ordering::Relaxed);
        })
        .build()?;

    let mut format = None;
    let mut runs = Vec::with_capacity(channels.len());
    for &channel in &channels {
        hw.set_video_standard(channel, standard);
        device.open(channel)?;
        let negotiated = device.set_format(channel, width, height, pixel_format, field)?;
        for index in 0..args.buffers {
            device.enqueue(channel, FrameBuffer::new(index, negotiated.size_image()))?;
        }
        device.start(channel)?;
        if let Some(params) = audio {
            device.prepare_audio(channel, params)?;
            device.start_audio(channel)?;
        }
        format = Some(negotiated);
        runs.push(ChannelRun {
            channel,
            collector: MetricsCollector::new(channel.index()),
            frames: 0,
            field: Field::Top,
            slot: Slot::P,
            signal_back_at: None,
        });
    }
    let Some(format) = format else {
        return Err(CliError::InvalidArgs("No channels selected".to_string()));
    };
    log::info!(
        "Simulating {} channel(s) at {}, {} frames each (seed {})",
        runs.len(),
        format,
        args.frames,
        seed
    );

    let period = Duration::from_micros(standard.field_period_us());
    let max_ticks = args.frames.saturating_mul(8).saturating_add(64);
    let mut field_data = vec![0u8; format.field_size()];
    let audio_data = vec![0u8; 4096];
    let mut fields_delivered = 0u64;
    let mut faults_injected = 0u64;

    for tick in 0..max_ticks {
        if term.load(Ordering::Relaxed) {
            log::info!("Received Ctrl+C, stopping...");
            break;
        }
        if runs.iter().all(|run| run.frames >= args.frames) {
            break;
        }

        clock.advance(period);
        for task in timers.advance(period) {
            device.run_timer(task);
        }

        for run in runs.iter_mut() {
            let channel = run.channel;
            if run.signal_back_at.map_or(false, |at| tick >= at) {
                hw.set_signal_lost(channel, false);
                run.signal_back_at = None;
            }

            let mut status = SlotStatus::new(run.field, run.slot);
            if args.fault_rate > 0.0 && rng.random_bool(args.fault_rate) {
                faults_injected += 1;
                let fault = FAULTS[rng.random_range(0..FAULTS.len())];
                log::debug!("{}: injecting {:?} at field {}", channel, fault, tick);
                match fault {
                    Fault::Overflow => hw.raise_fifo_error(channel, FifoError::Overflow),
                    Fault::BadData => hw.raise_fifo_error(channel, FifoError::BadData),
                    Fault::Timeout => hw.raise_timeout(),
                    Fault::SlotMismatch => status.slot = status.slot.other(),
                    Fault::SignalLoss => {
                        hw.set_signal_lost(channel, true);
                        run.signal_back_at = Some(tick + rng.random_range(2..20));
                    }
                }
            }

            field_data.fill(rng.random());
            if hw.deliver_field(channel, status, &field_data) {
                fields_delivered += 1;
            }
            device.handle_interrupt();

            if audio.is_some() && tick % 4 == 0 {
                let slot = if tick % 8 == 0 { Slot::P } else { Slot::B };
                hw.deliver_audio_period(channel, slot, &audio_data);
                device.handle_interrupt();
            }

            if run.field == Field::Bottom {
                run.slot = run.slot.other();
            }
            run.field = run.field.other();
        }

        recycle(&device, &completions, &mut runs, clock.now())?;
    }

    let duration = clock.now();
    device.shutdown();
    let stats = device.stats();

    let report = Report {
        standard: standard.to_string(),
        format: format.to_string(),
        seed,
        fields_delivered,
        faults_injected,
        audio_periods: audio_periods.load(Ordering::Relaxed),
        channels: runs
            .iter_mut()
            .map(|run| run.collector.finalize(duration, stats.channel(run.channel)))
            .collect(),
    };

    if json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::General(format!("Failed to output JSON metrics: {}", e)))?;
        println!("{}", json);
    } else {
        println!(
            "Simulated {:.2} s of {} at {}: {} fields, {} faults injected",
            duration.as_secs_f64(),
            report.standard,
            report.format,
            report.fields_delivered,
            report.faults_injected
        );
        if audio.is_some() {
            println!("Audio periods:     {}", report.audio_periods);
        }
        for channel in &report.channels {
            metrics::print_text(channel);
        }
        if args.stats {
            println!();
            print!("{}", stats);
        }
    }

    Ok(())
}

/// Record finished frames and hand every returned buffer back to its channel.
fn recycle(
    device: &SimDevice,
    completions: &Mutex<Vec<Completion>>,
    runs: &mut [ChannelRun],
    now: Duration,
) -> Result<(), CliError> {
    let done = std::mem::take(&mut *completions.lock().unwrap_or_else(|e| e.into_inner()));
    for completion in done {
        let Some(run) = runs.iter_mut().find(|r| r.channel == completion.channel) else {
            continue;
        };
        if completion.state == BufferState::Done {
            run.collector.record(&completion, now);
            run.frames += 1;
            log::trace!(
                "{}: frame {} ({} bytes)",
                completion.channel,
                completion.sequence,
                completion.buffer.bytes_used()
            );
        }
        if device.is_streaming(completion.channel) {
            device.enqueue(completion.channel, completion.buffer)?;
        }
    }
    Ok(())
}
