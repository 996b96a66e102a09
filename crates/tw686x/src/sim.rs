// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Register-file model of a TW686x.
//!
//! [`SimulatedHardware`] stands in for both the register window and the
//! DMA address space. Plain registers read back what was written. The
//! interrupt status register clears on read and the FIFO status register
//! keeps only its video-loss byte after a read, as on the real part. Test
//! code plays the DMA engine: [`deliver_field`](SimulatedHardware::deliver_field)
//! writes a field into the buffer the driver programmed and raises the
//! channel's interrupt, provided the channel is enabled.

use crate::{
    lock,
    memory::{DmaAllocator, DmaBuffer},
    pingpong::{Field, Slot, SlotStatus},
    ChannelId, Error, VideoStandard,
};
use std::{
    collections::BTreeMap,
    fmt,
    sync::Mutex,
};
use tw686x_sys::{regs, RegisterIo};

/// Size of the modelled register window in DWORDs.
pub const REGISTER_COUNT: usize = 0x300;

const SIM_BUS_BASE: u32 = 0x2000_0000;

/// FIFO fault kinds reported in `DMA_INT_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoError {
    Overflow,
    BadData,
}

impl fmt::Display for FifoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FifoError::Overflow => write!(f, "overflow"),
            FifoError::BadData => write!(f, "bad data"),
        }
    }
}

#[derive(Debug)]
struct Memory {
    next: u32,
    regions: BTreeMap<u32, DmaBuffer>,
}

/// Simulated adapter: registers, DMA memory and an access log.
#[derive(Debug)]
pub struct SimulatedHardware {
    registers: Mutex<Vec<u32>>,
    memory: Mutex<Memory>,
    writes: Mutex<Vec<(u32, u32)>>,
    reads: Mutex<Vec<u32>>,
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        SimulatedHardware::new()
    }
}

impl SimulatedHardware {
    /// Every decoder locked to an NTSC source.
    pub fn new() -> Self {
        let mut registers = vec![0u32; REGISTER_COUNT];
        for ch in 0..regs::MAX_VIDEO_CHANNELS {
            registers[regs::decoder_reg(regs::DECODER0_STATUS, ch) as usize] =
                regs::DECODER_STATUS_HLOCK;
        }
        SimulatedHardware {
            registers: Mutex::new(registers),
            memory: Mutex::new(Memory {
                next: SIM_BUS_BASE,
                regions: BTreeMap::new(),
            }),
            writes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Register value without read side effects.
    pub fn register(&self, reg: u32) -> u32 {
        lock(&self.registers)
            .get(reg as usize)
            .copied()
            .unwrap_or(u32::MAX)
    }

    /// Set a register without logging the write.
    pub fn set_register(&self, reg: u32, value: u32) {
        if let Some(slot) = lock(&self.registers).get_mut(reg as usize) {
            *slot = value;
        }
    }

    fn update(&self, reg: u32, f: impl FnOnce(u32) -> u32) {
        if let Some(slot) = lock(&self.registers).get_mut(reg as usize) {
            *slot = f(*slot);
        }
    }

    /// Register writes made through [`RegisterIo`] since the last call.
    pub fn take_writes(&self) -> Vec<(u32, u32)> {
        std::mem::take(&mut *lock(&self.writes))
    }

    /// Registers read through [`RegisterIo`] since the last call.
    pub fn take_reads(&self) -> Vec<u32> {
        std::mem::take(&mut *lock(&self.reads))
    }

    /// Whether the engine for `bit` is enabled and the command word runs.
    fn engine_running(&self, bit: u32) -> bool {
        let registers = lock(&self.registers);
        registers[regs::DMA_CHANNEL_ENABLE as usize] & bit != 0
            && registers[regs::DMA_CMD as usize] & regs::DMA_CMD_RUN != 0
    }

    /// Make the decoder for `channel` report `standard`.
    pub fn set_video_standard(&self, channel: ChannelId, standard: VideoStandard) {
        let reg = regs::decoder_reg(regs::DECODER0_STATUS, channel.index());
        self.update(reg, |status| match standard {
            VideoStandard::Pal => status | regs::DECODER_STATUS_50HZ,
            VideoStandard::Ntsc => status & !regs::DECODER_STATUS_50HZ,
        });
    }

    /// Drop or restore the input signal of `channel`.
    pub fn set_signal_lost(&self, channel: ChannelId, lost: bool) {
        let bit = 1 << channel.index();
        let decoder = regs::decoder_reg(regs::DECODER0_STATUS, channel.index());
        if lost {
            self.update(regs::DMA_INT_ERROR, |fifo| fifo | bit);
            self.update(decoder, |status| {
                (status | regs::DECODER_STATUS_VDLOSS) & !regs::DECODER_STATUS_HLOCK
            });
        } else {
            self.update(regs::DMA_INT_ERROR, |fifo| fifo & !bit);
            self.update(decoder, |status| {
                (status & !regs::DECODER_STATUS_VDLOSS) | regs::DECODER_STATUS_HLOCK
            });
        }
    }

    /// Latch a FIFO fault for `channel`.
    pub fn raise_fifo_error(&self, channel: ChannelId, error: FifoError) {
        let shift = match error {
            FifoError::Overflow => regs::FIFO_OVERFLOW_SHIFT,
            FifoError::BadData => regs::FIFO_BAD_SHIFT,
        };
        self.update(regs::DMA_INT_ERROR, |fifo| {
            fifo | (1 << (shift + channel.index() as u32))
        });
    }

    /// Latch the global DMA timeout.
    pub fn raise_timeout(&self) {
        self.update(regs::DMA_INT_STATUS, |status| {
            status | regs::INT_STATUS_TIMEOUT
        });
    }

    /// Complete a field transfer: write `data` to the buffer programmed for
    /// `status`, report the slot and field, and raise the channel interrupt.
    /// Returns `false` without touching anything when the channel is not
    /// enabled.
    pub fn deliver_field(&self, channel: ChannelId, status: SlotStatus, data: &[u8]) -> bool {
        let ch = channel.index();
        if !self.engine_running(1 << ch) {
            return false;
        }

        let base = match (status.field, status.slot) {
            (Field::Top, Slot::P) => regs::BDMA_ADDR_P_0,
            (Field::Top, Slot::B) => regs::BDMA_ADDR_B_0,
            (Field::Bottom, Slot::P) => regs::BDMA_ADDR_P_F2_0,
            (Field::Bottom, Slot::B) => regs::BDMA_ADDR_B_F2_0,
        };
        let addr = self.register(regs::bdma_reg(base, ch));
        self.write_memory(addr, data);

        let mask = (1 << ch) | (1 << (regs::PB_STATUS_FIELD_SHIFT + ch as u32));
        self.update(regs::DMA_PB_STATUS, |pb| {
            (pb & !mask) | status.pb_bits(channel)
        });
        self.update(regs::DMA_INT_STATUS, |int| int | (1 << ch));
        true
    }

    /// Complete an audio period in `slot` with `data` and raise the audio
    /// interrupt. Returns `false` when the audio channel is not enabled.
    pub fn deliver_audio_period(&self, channel: ChannelId, slot: Slot, data: &[u8]) -> bool {
        let bit = 1 << (regs::AUDIO_CHANNEL_OFFSET + channel.index() as u32);
        if !self.engine_running(bit) {
            return false;
        }

        let addr = self.register(regs::adma_addr_reg(channel.index(), slot == Slot::B));
        self.write_memory(addr, data);
        self.update(regs::DMA_PB_STATUS, |pb| match slot {
            Slot::P => pb & !bit,
            Slot::B => pb | bit,
        });
        self.update(regs::DMA_INT_STATUS, |int| int | bit);
        true
    }

    fn region(&self, addr: u32) -> Option<(DmaBuffer, usize)> {
        let memory = lock(&self.memory);
        let (base, buffer) = memory.regions.range(..=addr).next_back()?;
        let offset = (addr - base) as usize;
        (offset < buffer.len()).then(|| (buffer.clone(), offset))
    }

    /// Bus-master write into allocated memory. Returns the bytes written.
    pub fn write_memory(&self, addr: u32, data: &[u8]) -> usize {
        match self.region(addr) {
            Some((buffer, offset)) => buffer.write_at(offset, data),
            None => {
                log::warn!("sim: DMA write to unmapped address {:#010x}", addr);
                0
            }
        }
    }

    /// Bus-master read of `len` bytes at `addr`.
    pub fn read_memory(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        if let Some((buffer, offset)) = self.region(addr) {
            let n = buffer.read_at(offset, &mut out);
            out.truncate(n);
        } else {
            out.clear();
        }
        out
    }

    /// Bytes of DMA memory handed out.
    pub fn allocated(&self) -> usize {
        lock(&self.memory).regions.values().map(DmaBuffer::len).sum()
    }
}

impl RegisterIo for SimulatedHardware {
    fn read(&self, reg: u32) -> u32 {
        lock(&self.reads).push(reg);
        let mut registers = lock(&self.registers);
        let Some(value) = registers.get(reg as usize).copied() else {
            return u32::MAX;
        };
        match reg {
            regs::DMA_INT_STATUS => registers[reg as usize] = 0,
            regs::DMA_INT_ERROR => registers[reg as usize] &= regs::FIFO_VIDEO_LOSS_MASK,
            _ => {}
        }
        value
    }

    fn write(&self, reg: u32, value: u32) {
        lock(&self.writes).push((reg, value));
        match reg {
            // Status registers are read-only
            regs::DMA_INT_STATUS | regs::DMA_PB_STATUS => {}
            _ => self.set_register(reg, value),
        }
    }
}

impl DmaAllocator for SimulatedHardware {
    fn allocate(&self, size: usize) -> Result<DmaBuffer, Error> {
        let mut memory = lock(&self.memory);
        let pages = (size.max(1) + regs::PAGE_SIZE - 1) / regs::PAGE_SIZE;
        let span = u32::try_from(pages * regs::PAGE_SIZE)?;
        let addr = memory.next;
        memory.next = addr.checked_add(span).ok_or(Error::DmaAlloc(size))?;

        let buffer = DmaBuffer::new(addr, size);
        memory.regions.insert(addr, buffer.clone());
        Ok(buffer)
    }
}
