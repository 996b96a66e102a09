// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! TW686x register map.
//!
//! Offsets are DWORD indices into BAR0; multiply by four for a byte offset.
//! Decoder-bank registers (`0x100` and up) hold 8-bit values in the low byte
//! of each DWORD. Channels 4..=7 live in a second decoder bank `0x100`
//! DWORDs above the first, see [`decoder_reg`].

// ============================================================================
// DMA engine
// ============================================================================

/// Interrupt status (RO). Bits 0..=7 video, 8..=15 audio, 17 timeout.
pub const DMA_INT_STATUS: u32 = 0x00;

/// Ping-pong status (RO). Bit `ch` is the slot (0 = P, 1 = B) the
/// hardware just finished; bit `24 + ch` is the field number.
pub const DMA_PB_STATUS: u32 = 0x01;

/// DMA command word. Bit 31 runs the engine; the low 16 bits mirror
/// [`DMA_CHANNEL_ENABLE`].
pub const DMA_CMD: u32 = 0x02;

/// FIFO status. Bits 0..=7 video loss, 16..=23 bad data, 24..=31 overflow.
pub const DMA_INT_ERROR: u32 = 0x03;

pub const VIDEO_CHID: u32 = 0x04;
pub const VIDEO_PARSER_STATUS: u32 = 0x05;
pub const SYS_SOFT_RST: u32 = 0x06;

/// Channel enable mask. Same bit layout as [`DMA_INT_STATUS`].
pub const DMA_CHANNEL_ENABLE: u32 = 0x0a;
pub const DMA_CONFIG: u32 = 0x0b;
pub const DMA_CHANNEL_TIMEOUT: u32 = 0x0d;

/// Per-channel video DMA configuration, `DMA_CH0_CONFIG + ch`.
pub const DMA_CH0_CONFIG: u32 = 0x10;

/// Audio DMA P-slot address for channel 0, stride 2.
pub const ADMA_P_ADDR0: u32 = 0x18;
/// Audio DMA B-slot address for channel 0, stride 2.
pub const ADMA_B_ADDR0: u32 = 0x19;

pub const VIDEO_CTRL1: u32 = 0x2a;
pub const VIDEO_CTRL2: u32 = 0x2b;

/// Audio control 1: external audio enable (bit 0) and DMA period size.
pub const AUDIO_CONTROL1: u32 = 0x2c;
/// Audio control 2: sample rate divider.
pub const AUDIO_CONTROL2: u32 = 0x2d;

pub const PHASE_REF_CONFIG: u32 = 0x2e;

/// Field drop pattern, `DROP_FIELD_REG0 + ch`.
pub const DROP_FIELD_REG0: u32 = 0x39;
/// Shared video size register kept for Rev.A parts.
pub const VIDEO_SIZE_REG: u32 = 0x41;
/// Black stripe remover, `SHSCALER_REG0 + ch`.
pub const SHSCALER_REG0: u32 = 0x42;
/// Per-channel video size, `VIDEO_SIZE_REG0 + ch`.
pub const VIDEO_SIZE_REG0: u32 = 0x4a;

/// Block DMA field 0 P address. Channel stride is 8 DWORDs.
pub const BDMA_ADDR_P_0: u32 = 0x80;
/// Block DMA field 0 width/height/pitch.
pub const BDMA_WHP_0: u32 = 0x81;
pub const BDMA_ADDR_B_0: u32 = 0x82;
pub const BDMA_ADDR_P_F2_0: u32 = 0x84;
pub const BDMA_WHP_F2_0: u32 = 0x85;
pub const BDMA_ADDR_B_F2_0: u32 = 0x86;
pub const BDMA_CHANNEL_STRIDE: u32 = 8;

// ============================================================================
// Video decoder bank
// ============================================================================

/// Decoder status: bit 7 video loss, bit 6 horizontal lock, bit 0 50 Hz.
pub const DECODER0_STATUS: u32 = 0x100;
pub const BRIGHTNESS0: u32 = 0x101;
pub const CONTRAST0: u32 = 0x102;
pub const SAT_U0: u32 = 0x104;
pub const SAT_V0: u32 = 0x105;
pub const HUE0: u32 = 0x106;
pub const VDELAY0: u32 = 0x108;
pub const HDELAY0: u32 = 0x10a;
/// Standard selection: 0 = NTSC, 1 = PAL.
pub const DECODER0_SDT: u32 = 0x10e;
pub const VSCALE0_LO: u32 = 0x144;
pub const MISC_CONTROL2: u32 = 0x196;
pub const MISC_CONTROL3: u32 = 0x197;

/// Offset between the decoder bank for channels 0..=3 and 4..=7.
pub const DECODER_BANK_STRIDE: u32 = 0x100;
/// Offset between two decoders within a bank.
pub const DECODER_STRIDE: u32 = 0x10;

// ============================================================================
// Bit definitions
// ============================================================================

pub const MAX_VIDEO_CHANNELS: usize = 8;
pub const MAX_AUDIO_CHANNELS: usize = 8;

/// Audio channels occupy bits 8..=15 of the enable and status masks.
pub const AUDIO_CHANNEL_OFFSET: u32 = 8;

pub const VIDEO_CHANNEL_MASK: u32 = 0x00ff;
pub const AUDIO_CHANNEL_MASK: u32 = 0xff00;

/// Global DMA timeout in [`DMA_INT_STATUS`].
pub const INT_STATUS_TIMEOUT: u32 = 1 << 17;

pub const FIFO_VIDEO_LOSS_MASK: u32 = 0xff;
pub const FIFO_BAD_SHIFT: u32 = 16;
pub const FIFO_OVERFLOW_SHIFT: u32 = 24;

/// Field-number bits in [`DMA_PB_STATUS`] start here.
pub const PB_STATUS_FIELD_SHIFT: u32 = 24;

pub const DMA_CMD_RUN: u32 = 1 << 31;

pub const VIDEO_SIZE_ENABLE: u32 = 1 << 31;

pub const DECODER_STATUS_VDLOSS: u32 = 1 << 7;
pub const DECODER_STATUS_HLOCK: u32 = 1 << 6;
pub const DECODER_STATUS_50HZ: u32 = 1 << 0;

pub const AUDIO_CONTROL1_EXTERNAL: u32 = 1 << 0;
pub const AUDIO_DMA_SIZE_SHIFT: u32 = 19;
pub const AUDIO_DMA_SIZE_MASK: u32 = 0x1fff;
pub const AUDIO_DMA_SIZE_MIN: usize = 512;
pub const AUDIO_DMA_SIZE_MAX: usize = 4096;

/// Audio sample clock in Hz used by the [`AUDIO_CONTROL2`] divider.
pub const AUDIO_CLOCK_HZ: u32 = 125_000_000;

/// Drop-field master bit in [`DMA_CH0_CONFIG`].
pub const CH_CONFIG_MASTER: u32 = 1 << 27;
pub const CH_CONFIG_END_SHIFT: u32 = 10;
pub const CH_CONFIG_FORMAT_SHIFT: u32 = 20;

/// Page-table entries reserved per channel in the DMA page table.
pub const CH_CONFIG_PAGE_STRIDE: u32 = 128;
pub const PAGE_SIZE: usize = 4096;

/// Hardware video format codes for [`DMA_CH0_CONFIG`].
pub const VIDEO_FORMAT_UYVY: u32 = 0;
pub const VIDEO_FORMAT_RGB555: u32 = 4;
pub const VIDEO_FORMAT_RGB565: u32 = 5;
pub const VIDEO_FORMAT_YUYV: u32 = 6;

// ============================================================================
// Address helpers
// ============================================================================

/// Register `base` of the decoder serving video channel `channel`.
///
/// ```
/// use tw686x_sys::regs::{decoder_reg, DECODER0_STATUS};
/// assert_eq!(decoder_reg(DECODER0_STATUS, 1), 0x110);
/// assert_eq!(decoder_reg(DECODER0_STATUS, 5), 0x210);
/// ```
pub const fn decoder_reg(base: u32, channel: usize) -> u32 {
    let ch = channel as u32;
    if ch < 4 {
        base + ch * DECODER_STRIDE
    } else {
        base + DECODER_BANK_STRIDE + (ch - 4) * DECODER_STRIDE
    }
}

/// Block DMA register `base` for video channel `channel`.
pub const fn bdma_reg(base: u32, channel: usize) -> u32 {
    base + channel as u32 * BDMA_CHANNEL_STRIDE
}

/// Audio DMA address register for `channel`, P slot when `b_slot` is false.
pub const fn adma_addr_reg(channel: usize, b_slot: bool) -> u32 {
    let base = if b_slot { ADMA_B_ADDR0 } else { ADMA_P_ADDR0 };
    base + 2 * channel as u32
}

/// Block DMA width/height/pitch word.
///
/// `bytes_per_line` fills both the active width and line pitch fields.
pub const fn bdma_whp(bytes_per_line: u32, lines: u32) -> u32 {
    (bytes_per_line & 0x7ff) | ((bytes_per_line & 0x7ff) << 11) | ((lines & 0x3ff) << 22)
}

/// Number of DMA pages needed for `size` bytes, plus one for misalignment.
pub const fn buffer_pages(size: usize) -> usize {
    let aligned = (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
    (aligned + PAGE_SIZE) / PAGE_SIZE
}
