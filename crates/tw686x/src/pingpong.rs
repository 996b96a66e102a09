// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{memory::DmaAllocator, memory::DmaBuffer, ChannelId, Error, VideoFormat};
use std::fmt;
use tw686x_sys::{regs, RegisterIo};

/// Bytes reserved for each hardware field buffer: the largest line (800
/// pixels at 16 bpp) times the tallest field the engine can emit.
pub const FIELD_BUFFER_SIZE: usize = 800 * 300 * 2;

/// One of the two fields of an interlaced frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// First field in time, carrying the even lines
    Top,
    /// Second field, carrying the odd lines
    Bottom,
}

impl Field {
    /// 0 for [`Field::Top`], 1 for [`Field::Bottom`].
    pub const fn index(self) -> usize {
        match self {
            Field::Top => 0,
            Field::Bottom => 1,
        }
    }

    pub const fn other(self) -> Field {
        match self {
            Field::Top => Field::Bottom,
            Field::Bottom => Field::Top,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Top => "top",
            Field::Bottom => "bottom",
        })
    }
}

/// Ping-pong slot of a field buffer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    P,
    B,
}

impl Slot {
    pub const fn index(self) -> usize {
        match self {
            Slot::P => 0,
            Slot::B => 1,
        }
    }

    pub const fn other(self) -> Slot {
        match self {
            Slot::P => Slot::B,
            Slot::B => Slot::P,
        }
    }

    pub const fn from_bit(set: bool) -> Slot {
        if set {
            Slot::B
        } else {
            Slot::P
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::P => "P",
            Slot::B => "B",
        })
    }
}

/// Field and slot the hardware reports for a finished transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotStatus {
    pub field: Field,
    pub slot: Slot,
}

impl SlotStatus {
    pub const fn new(field: Field, slot: Slot) -> Self {
        SlotStatus { field, slot }
    }

    /// Decode the status for `channel` from a `DMA_PB_STATUS` value.
    ///
    /// ```
    /// use tw686x::ChannelId;
    /// use tw686x::pingpong::{Field, Slot, SlotStatus};
    ///
    /// let ch = ChannelId::new(2)?;
    /// let status = SlotStatus::from_pb_status(0x0400_0004, ch);
    /// assert_eq!(status, SlotStatus::new(Field::Bottom, Slot::B));
    /// # Ok::<(), tw686x::Error>(())
    /// ```
    pub fn from_pb_status(pb_status: u32, channel: ChannelId) -> Self {
        let ch = channel.index() as u32;
        let slot = Slot::from_bit(pb_status & (1 << ch) != 0);
        let field = if pb_status & (1 << (regs::PB_STATUS_FIELD_SHIFT + ch)) != 0 {
            Field::Bottom
        } else {
            Field::Top
        };
        SlotStatus { field, slot }
    }

    /// Position of this buffer in [`FieldBuffers`]: `field * 2 + slot`.
    pub const fn buffer_index(self) -> usize {
        self.field.index() * 2 + self.slot.index()
    }

    /// Bits this status sets in `DMA_PB_STATUS` for `channel`.
    pub fn pb_bits(self, channel: ChannelId) -> u32 {
        let ch = channel.index() as u32;
        let mut bits = 0;
        if self.slot == Slot::B {
            bits |= 1 << ch;
        }
        if self.field == Field::Bottom {
            bits |= 1 << (regs::PB_STATUS_FIELD_SHIFT + ch);
        }
        bits
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.field, self.slot)
    }
}

/// The four hardware field buffers of one video channel.
///
/// Allocated on the first stream start and kept until the channel is
/// closed. The hardware alternates between the P and B buffer of each
/// field on its own.
#[derive(Debug)]
pub struct FieldBuffers {
    buffers: [DmaBuffer; 4],
}

impl FieldBuffers {
    pub fn allocate<A: DmaAllocator + ?Sized>(allocator: &A) -> Result<Self, Error> {
        Ok(FieldBuffers {
            buffers: [
                allocator.allocate(FIELD_BUFFER_SIZE)?,
                allocator.allocate(FIELD_BUFFER_SIZE)?,
                allocator.allocate(FIELD_BUFFER_SIZE)?,
                allocator.allocate(FIELD_BUFFER_SIZE)?,
            ],
        })
    }

    /// Buffer the hardware filled for `status`.
    pub fn get(&self, status: SlotStatus) -> &DmaBuffer {
        &self.buffers[status.buffer_index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DmaBuffer> {
        self.buffers.iter()
    }

    /// Program the block DMA addresses and geometry for `channel`.
    pub fn program<R: RegisterIo + ?Sized>(
        &self,
        io: &R,
        channel: ChannelId,
        format: &VideoFormat,
    ) {
        let ch = channel.index();
        let status = |field, slot| SlotStatus::new(field, slot);

        io.write(
            regs::bdma_reg(regs::BDMA_ADDR_P_0, ch),
            self.get(status(Field::Top, Slot::P)).addr(),
        );
        io.write(
            regs::bdma_reg(regs::BDMA_ADDR_B_0, ch),
            self.get(status(Field::Top, Slot::B)).addr(),
        );
        io.write(
            regs::bdma_reg(regs::BDMA_ADDR_P_F2_0, ch),
            self.get(status(Field::Bottom, Slot::P)).addr(),
        );
        io.write(
            regs::bdma_reg(regs::BDMA_ADDR_B_F2_0, ch),
            self.get(status(Field::Bottom, Slot::B)).addr(),
        );
        program_geometry(io, channel, format);

        let phase = io.read(regs::PHASE_REF_CONFIG);
        io.write(regs::PHASE_REF_CONFIG, phase | (3 << (16 + 2 * ch as u32)));
    }
}

/// Write the width/height/pitch word of both fields for `format`.
pub fn program_geometry<R: RegisterIo + ?Sized>(io: &R, channel: ChannelId, format: &VideoFormat) {
    let ch = channel.index();
    let whp = regs::bdma_whp(format.bytes_per_line() as u32, format.field_lines());
    io.write(regs::bdma_reg(regs::BDMA_WHP_0, ch), whp);
    io.write(regs::bdma_reg(regs::BDMA_WHP_F2_0, ch), whp);
    log::debug!("{}: field geometry {:#010x}", channel, whp);
}

/// Program the channel configuration word: page-table window, pixel
/// format and drop-field master.
pub fn program_channel_config<R: RegisterIo + ?Sized>(
    io: &R,
    channel: ChannelId,
    format: &VideoFormat,
) {
    let start = regs::CH_CONFIG_PAGE_STRIDE * channel.index() as u32;
    let end = start + regs::buffer_pages(format.field_size()) as u32 - 1;
    let value = (start & 0x3ff)
        | ((end & 0x3ff) << regs::CH_CONFIG_END_SHIFT)
        | ((format.pixel_format.hardware_code() & 0x7) << regs::CH_CONFIG_FORMAT_SHIFT)
        | regs::CH_CONFIG_MASTER;
    io.write(regs::DMA_CH0_CONFIG + channel.index() as u32, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;
    use crate::{FieldMode, PixelFormat};

    #[test]
    fn test_status_bits() {
        let ch = ChannelId::new(5).unwrap();
        for field in [Field::Top, Field::Bottom] {
            for slot in [Slot::P, Slot::B] {
                let status = SlotStatus::new(field, slot);
                assert_eq!(SlotStatus::from_pb_status(status.pb_bits(ch), ch), status);
            }
        }
        // Other channels' bits are ignored
        assert_eq!(
            SlotStatus::from_pb_status(!0x2000_0020, ch),
            SlotStatus::new(Field::Top, Slot::P)
        );
    }

    #[test]
    fn test_buffer_index() {
        assert_eq!(SlotStatus::new(Field::Top, Slot::P).buffer_index(), 0);
        assert_eq!(SlotStatus::new(Field::Top, Slot::B).buffer_index(), 1);
        assert_eq!(SlotStatus::new(Field::Bottom, Slot::P).buffer_index(), 2);
        assert_eq!(SlotStatus::new(Field::Bottom, Slot::B).buffer_index(), 3);
    }

    #[test]
    fn test_program_registers() {
        let hw = SimulatedHardware::new();
        let ch = ChannelId::new(1).unwrap();
        let format = VideoFormat {
            width: 720,
            height: 576,
            pixel_format: PixelFormat::Yuyv,
            field: FieldMode::Interlaced,
        };

        let buffers = FieldBuffers::allocate(&hw).unwrap();
        buffers.program(&hw, ch, &format);
        program_channel_config(&hw, ch, &format);

        assert_eq!(
            hw.register(0x88),
            buffers.get(SlotStatus::new(Field::Top, Slot::P)).addr()
        );
        assert_eq!(
            hw.register(0x8e),
            buffers.get(SlotStatus::new(Field::Bottom, Slot::B)).addr()
        );
        assert_eq!(hw.register(0x89), regs::bdma_whp(1440, 288));
        assert_eq!(hw.register(0x8d), regs::bdma_whp(1440, 288));
        assert_eq!(hw.register(regs::PHASE_REF_CONFIG), 3 << 18);

        let config = hw.register(regs::DMA_CH0_CONFIG + 1);
        assert_eq!(config & 0x3ff, 128);
        assert_eq!((config >> 10) & 0x3ff, 128 + 103 - 1);
        assert_eq!((config >> 20) & 0x7, regs::VIDEO_FORMAT_YUYV);
        assert_ne!(config & regs::CH_CONFIG_MASTER, 0);
        assert!(buffers.iter().all(|b| b.len() == FIELD_BUFFER_SIZE));
    }
}
