// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{fmt, str::FromStr};
use tw686x_sys::{regs, RegisterIo};

use crate::{ChannelId, Error};

/// Line-rate family of an analog source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoStandard {
    /// 60 Hz, 525 lines
    Ntsc,
    /// 50 Hz, 625 lines
    Pal,
}

impl VideoStandard {
    pub const fn width(self) -> u32 {
        720
    }

    /// Active lines per frame.
    pub const fn height(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 480,
            VideoStandard::Pal => 576,
        }
    }

    pub const fn field_rate(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 60,
            VideoStandard::Pal => 50,
        }
    }

    /// Full frame rate.
    pub const fn frame_rate(self) -> u32 {
        self.field_rate() / 2
    }

    /// Time between two field interrupts, in microseconds.
    pub const fn field_period_us(self) -> u64 {
        1_000_000 / self.field_rate() as u64
    }

    pub const fn name(self) -> &'static str {
        match self {
            VideoStandard::Ntsc => "NTSC",
            VideoStandard::Pal => "PAL",
        }
    }

    const fn misc_control3(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 0x85,
            VideoStandard::Pal => 0xc5,
        }
    }

    const fn sdt(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 0,
            VideoStandard::Pal => 1,
        }
    }

    const fn vdelay(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 0x14,
            VideoStandard::Pal => 0x18,
        }
    }

    const fn hdelay(self) -> u32 {
        match self {
            VideoStandard::Ntsc => 0x0e,
            VideoStandard::Pal => 0x0c,
        }
    }
}

impl fmt::Display for VideoStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "ntsc" => Ok(VideoStandard::Ntsc),
            "pal" => Ok(VideoStandard::Pal),
            _ => Err(Error::InvalidArgument(format!("unknown video standard: {}", s))),
        }
    }
}

/// Classify the line rate the decoder for `channel` is locked to.
pub fn detect<R: RegisterIo + ?Sized>(io: &R, channel: ChannelId) -> VideoStandard {
    let status = io.read(regs::decoder_reg(regs::DECODER0_STATUS, channel.index()));
    let standard = if status & regs::DECODER_STATUS_50HZ != 0 {
        VideoStandard::Pal
    } else {
        VideoStandard::Ntsc
    };
    log::info!("{}: detected {} source", channel, standard);
    standard
}

/// Force the decoder for `channel` to `standard`.
///
/// `MISC_CONTROL3` is shared by the four decoders of a bank, so both banks
/// are written.
pub fn program<R: RegisterIo + ?Sized>(io: &R, channel: ChannelId, standard: VideoStandard) {
    io.write(regs::MISC_CONTROL3, standard.misc_control3());
    io.write(
        regs::MISC_CONTROL3 + regs::DECODER_BANK_STRIDE,
        standard.misc_control3(),
    );
    io.write(
        regs::decoder_reg(regs::DECODER0_SDT, channel.index()),
        standard.sdt(),
    );
    log::debug!("{}: decoder set to {}", channel, standard);
}

/// Program the decoder delays, scaler and video size for an output of
/// `width` by `field_lines` lines per field.
pub fn resize<R: RegisterIo + ?Sized>(
    io: &R,
    channel: ChannelId,
    standard: VideoStandard,
    width: u32,
    field_lines: u32,
) {
    let ch = channel.index();

    // Blue back color
    io.write(regs::MISC_CONTROL2, 0xe6);
    io.write(regs::MISC_CONTROL2 + regs::DECODER_BANK_STRIDE, 0xe6);
    io.write(regs::MISC_CONTROL3, standard.misc_control3());
    io.write(
        regs::MISC_CONTROL3 + regs::DECODER_BANK_STRIDE,
        standard.misc_control3(),
    );
    io.write(regs::decoder_reg(regs::VDELAY0, ch), standard.vdelay());
    io.write(regs::decoder_reg(regs::HDELAY0, ch), standard.hdelay());

    let size = width | (field_lines << 16) | regs::VIDEO_SIZE_ENABLE;
    io.write(regs::VIDEO_SIZE_REG, size);
    io.write(regs::VIDEO_SIZE_REG0 + ch as u32, size);

    let full_field = field_lines == 240 || field_lines == 288;
    let scaled_width = if full_field && width > 699 {
        720
    } else {
        width + 16 * width / 720
    };
    let hscale = (720 * 256) / (scaled_width & 0x7ff).max(1);
    let vscale = (standard.height() / 2 * 256) / (field_lines & 0x1ff).max(1);

    let scale = regs::decoder_reg(regs::VSCALE0_LO, ch);
    io.write(scale, vscale & 0xff);
    io.write(
        scale + 1,
        (((vscale >> 8) & 0xf) << 4) | ((hscale >> 8) & 0xf),
    );
    io.write(scale + 2, hscale & 0xff);

    // Black stripe remover
    let ratio = ((scaled_width.saturating_sub(16)) << 16) / scaled_width.max(1);
    let stripe = 4 | ((scaled_width.saturating_sub(12) & 0x3ff) << 5) | (ratio << 15);
    io.write(regs::SHSCALER_REG0 + ch as u32, stripe);

    log::debug!(
        "{}: decoder resized to {}x{} per field, hscale {:#x} vscale {:#x}",
        channel,
        width,
        field_lines,
        hscale,
        vscale
    );
}
