// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{lock, ChannelId, Device, Error, VideoStandard};
use std::{fmt, ops::RangeInclusive, str::FromStr};
use tw686x_sys::{regs, RegisterIo};

/// Drop-field pattern keeping every field.
pub const FRAME_RATE_FULL: u32 = 0xbfff_ffff;

/// Drop-field patterns from full rate down, one per supported rate.
const FRAME_RATE_MASKS: [u32; 6] = [
    FRAME_RATE_FULL,
    0xbfff_cfff,
    0x8fff_cfff,
    0xbf3f_3f3f,
    0xb3cf_cfc3,
    0x8f3c_f3cf,
];

const NTSC_RATES: [u32; 6] = [30, 28, 26, 24, 22, 20];
const PAL_RATES: [u32; 6] = [25, 23, 20, 18, 16, 14];

/// Frame rates the decimator can produce for `standard`, fastest first.
pub fn frame_rates(standard: VideoStandard) -> &'static [u32] {
    match standard {
        VideoStandard::Ntsc => &NTSC_RATES,
        VideoStandard::Pal => &PAL_RATES,
    }
}

/// Decoder picture adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

impl Control {
    pub const ALL: [Control; 4] = [
        Control::Brightness,
        Control::Contrast,
        Control::Saturation,
        Control::Hue,
    ];

    pub fn range(self) -> RangeInclusive<i32> {
        match self {
            Control::Brightness => 0..=255,
            Control::Contrast => 0..=200,
            Control::Saturation => 0..=127,
            Control::Hue => -124..=125,
        }
    }

    pub const fn default_value(self) -> i32 {
        match self {
            Control::Brightness => 125,
            Control::Contrast => 96,
            Control::Saturation => 64,
            Control::Hue => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Control::Brightness => "brightness",
            Control::Contrast => "contrast",
            Control::Saturation => "saturation",
            Control::Hue => "hue",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Control {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Control::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown control: {}", s)))
    }
}

/// Decoder lock state of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputStatus {
    /// No video detected
    pub video_loss: bool,
    pub horizontal_lock: bool,
    /// Line rate the decoder reports
    pub standard: VideoStandard,
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.video_loss {
            write!(f, "no signal")
        } else {
            write!(
                f,
                "{}{}",
                self.standard,
                if self.horizontal_lock { "" } else { " (no h-lock)" }
            )
        }
    }
}

impl<R: RegisterIo> Device<R> {
    /// Set a picture control on the decoder for `channel`.
    pub fn set_control(&self, channel: ChannelId, control: Control, value: i32) -> Result<(), Error> {
        if !control.range().contains(&value) {
            return Err(Error::InvalidArgument(format!(
                "{} {} outside {:?}",
                control,
                value,
                control.range()
            )));
        }

        let ch = channel.index();
        match control {
            Control::Brightness => self.io.write(
                regs::decoder_reg(regs::BRIGHTNESS0, ch),
                (value - 0x80) as u32 & 0xff,
            ),
            Control::Contrast => self
                .io
                .write(regs::decoder_reg(regs::CONTRAST0, ch), value as u32),
            Control::Saturation => {
                let sat = (value * 2) as u32;
                self.io.write(regs::decoder_reg(regs::SAT_U0, ch), sat);
                self.io.write(regs::decoder_reg(regs::SAT_V0, ch), sat);
            }
            Control::Hue => self
                .io
                .write(regs::decoder_reg(regs::HUE0, ch), value as u32 & 0xff),
        }
        log::debug!("{}: {} = {}", channel, control, value);
        Ok(())
    }

    /// Read a picture control back from the decoder.
    pub fn control(&self, channel: ChannelId, control: Control) -> i32 {
        let ch = channel.index();
        match control {
            Control::Brightness => {
                let reg = self.io.read(regs::decoder_reg(regs::BRIGHTNESS0, ch)) & 0xff;
                ((reg + 0x80) & 0xff) as i32
            }
            Control::Contrast => (self.io.read(regs::decoder_reg(regs::CONTRAST0, ch)) & 0xff) as i32,
            Control::Saturation => {
                ((self.io.read(regs::decoder_reg(regs::SAT_U0, ch)) & 0xff) / 2) as i32
            }
            Control::Hue => {
                let reg = (self.io.read(regs::decoder_reg(regs::HUE0, ch)) & 0xff) as i32;
                if reg < 0x80 {
                    reg
                } else {
                    reg - 0x100
                }
            }
        }
    }

    /// Write every control's default value.
    pub fn reset_controls(&self, channel: ChannelId) -> Result<(), Error> {
        for control in Control::ALL {
            self.set_control(channel, control, control.default_value())?;
        }
        Ok(())
    }

    /// Select a capture frame rate from [`frame_rates`]. Takes effect
    /// immediately on a streaming channel and on the next start otherwise.
    pub fn set_frame_rate(&self, channel: ChannelId, fps: u32) -> Result<(), Error> {
        let mut state = lock(&self.channel(channel).state);
        let index = frame_rates(state.standard)
            .iter()
            .position(|&rate| rate == fps)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "{} fps not available for {}, choose from {:?}",
                    fps,
                    state.standard,
                    frame_rates(state.standard)
                ))
            })?;

        state.frame_rate_mask = FRAME_RATE_MASKS[index];
        if state.streaming {
            self.io.write(
                regs::DROP_FIELD_REG0 + channel.index() as u32,
                state.frame_rate_mask,
            );
        }
        log::debug!("{}: {} fps", channel, fps);
        Ok(())
    }

    /// Current capture frame rate.
    pub fn frame_rate(&self, channel: ChannelId) -> u32 {
        let state = lock(&self.channel(channel).state);
        let index = FRAME_RATE_MASKS
            .iter()
            .position(|&mask| mask == state.frame_rate_mask)
            .unwrap_or(0);
        frame_rates(state.standard)[index]
    }

    /// Decoder lock state for `channel`.
    pub fn input_status(&self, channel: ChannelId) -> InputStatus {
        let status = self
            .io
            .read(regs::decoder_reg(regs::DECODER0_STATUS, channel.index()));
        InputStatus {
            video_loss: status & regs::DECODER_STATUS_VDLOSS != 0,
            horizontal_lock: status & regs::DECODER_STATUS_HLOCK != 0,
            standard: if status & regs::DECODER_STATUS_50HZ != 0 {
                VideoStandard::Pal
            } else {
                VideoStandard::Ntsc
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;
    use std::sync::Arc;

    fn device(hw: &Arc<SimulatedHardware>) -> Device<Arc<SimulatedHardware>> {
        Device::builder(hw.clone())
            .with_allocator(hw.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_control_round_trip() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(6).unwrap();

        for control in Control::ALL {
            for value in [*control.range().start(), control.default_value(), *control.range().end()] {
                device.set_control(ch, control, value).unwrap();
                assert_eq!(device.control(ch, control), value, "{}", control);
            }
        }
    }

    #[test]
    fn test_control_encoding() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(1).unwrap();

        device.set_control(ch, Control::Brightness, 0).unwrap();
        assert_eq!(hw.register(0x111), 0x80);
        device.set_control(ch, Control::Saturation, 100).unwrap();
        assert_eq!(hw.register(0x114), 200);
        assert_eq!(hw.register(0x115), 200);
        device.set_control(ch, Control::Hue, -1).unwrap();
        assert_eq!(hw.register(0x116), 0xff);

        assert!(device.set_control(ch, Control::Contrast, 201).is_err());
        assert!(device.set_control(ch, Control::Hue, -125).is_err());
        assert_eq!("HUE".parse::<Control>().unwrap(), Control::Hue);
    }

    #[test]
    fn test_frame_rate_masks() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(2).unwrap();
        device.open(ch).unwrap();

        device.set_frame_rate(ch, 24).unwrap();
        assert_eq!(device.frame_rate(ch), 24);
        // Not written until the stream starts
        assert_eq!(hw.register(regs::DROP_FIELD_REG0 + 2), 0);
        device.start(ch).unwrap();
        assert_eq!(hw.register(regs::DROP_FIELD_REG0 + 2), 0xbf3f_3f3f);

        device.set_frame_rate(ch, 20).unwrap();
        assert_eq!(hw.register(regs::DROP_FIELD_REG0 + 2), 0x8f3c_f3cf);
        assert!(matches!(
            device.set_frame_rate(ch, 25),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_input_status() {
        let hw = Arc::new(SimulatedHardware::new());
        let device = device(&hw);
        let ch = ChannelId::new(7).unwrap();

        hw.set_video_standard(ch, VideoStandard::Pal);
        let status = device.input_status(ch);
        assert_eq!(status.standard, VideoStandard::Pal);
        assert!(status.horizontal_lock);
        assert!(!status.video_loss);

        hw.set_signal_lost(ch, true);
        let status = device.input_status(ch);
        assert!(status.video_loss);
        assert_eq!(status.to_string(), "no signal");
    }
}
