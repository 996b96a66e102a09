// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Typed channel identifiers.
//!
//! The hardware reports channel sets as bitmasks: video channels in bits
//! 0..=7 and audio channels in bits 8..=15. Inside the core channels are
//! [`ChannelId`] and [`DmaChannel`] values collected in a [`ChannelSet`];
//! masks only appear at the register boundary through
//! [`ChannelSet::from_register`] and [`ChannelSet::to_register`].

use crate::Error;
use std::fmt;
use tw686x_sys::regs::AUDIO_CHANNEL_OFFSET;

/// Number of video channels, and of audio channels.
pub const MAX_CHANNELS: usize = tw686x_sys::regs::MAX_VIDEO_CHANNELS;

/// Index of one of the eight capture inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Creates a channel identifier.
    ///
    /// # Example
    ///
    /// ```
    /// use tw686x::ChannelId;
    ///
    /// assert_eq!(ChannelId::new(3).unwrap().index(), 3);
    /// assert!(ChannelId::new(8).is_err());
    /// ```
    pub fn new(index: usize) -> Result<Self, Error> {
        if index < MAX_CHANNELS {
            Ok(ChannelId(index as u8))
        } else {
            Err(Error::InvalidChannel(index))
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Channel for a hardware bit position; wraps above 7.
    pub(crate) const fn from_index(index: usize) -> Self {
        ChannelId((index % MAX_CHANNELS) as u8)
    }

    /// All channel identifiers in ascending order.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..MAX_CHANNELS as u8).map(ChannelId)
    }
}

impl TryFrom<usize> for ChannelId {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self, Error> {
        ChannelId::new(index)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// A DMA engine: the video or audio half of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmaChannel {
    Video(ChannelId),
    Audio(ChannelId),
}

impl DmaChannel {
    /// Bit of this engine in the enable, command and status registers.
    pub const fn bit(self) -> u32 {
        match self {
            DmaChannel::Video(ch) => 1 << ch.0,
            DmaChannel::Audio(ch) => 1 << (ch.0 as u32 + AUDIO_CHANNEL_OFFSET),
        }
    }

    pub const fn channel(self) -> ChannelId {
        match self {
            DmaChannel::Video(ch) | DmaChannel::Audio(ch) => ch,
        }
    }
}

impl fmt::Display for DmaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmaChannel::Video(ch) => write!(f, "video {}", ch),
            DmaChannel::Audio(ch) => write!(f, "audio {}", ch),
        }
    }
}

/// A set of DMA engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSet {
    video: [bool; MAX_CHANNELS],
    audio: [bool; MAX_CHANNELS],
}

impl ChannelSet {
    pub const fn new() -> Self {
        ChannelSet {
            video: [false; MAX_CHANNELS],
            audio: [false; MAX_CHANNELS],
        }
    }

    /// Every video and audio engine.
    pub const fn all() -> Self {
        ChannelSet {
            video: [true; MAX_CHANNELS],
            audio: [true; MAX_CHANNELS],
        }
    }

    /// Decode a register mask. Bits above 15 are ignored.
    ///
    /// ```
    /// use tw686x::{ChannelId, ChannelSet};
    ///
    /// let set = ChannelSet::from_register(0x0105);
    /// let video: Vec<usize> = set.video().map(ChannelId::index).collect();
    /// assert_eq!(video, vec![0, 2]);
    /// assert_eq!(set.audio().count(), 1);
    /// assert_eq!(set.to_register(), 0x0105);
    /// ```
    pub fn from_register(mask: u32) -> Self {
        let mut set = ChannelSet::new();
        for i in 0..MAX_CHANNELS {
            set.video[i] = mask & (1 << i) != 0;
            set.audio[i] = mask & (1 << (i as u32 + AUDIO_CHANNEL_OFFSET)) != 0;
        }
        set
    }

    /// Encode as a register mask.
    pub fn to_register(&self) -> u32 {
        self.iter().fold(0, |mask, dma| mask | dma.bit())
    }

    pub fn insert(&mut self, dma: DmaChannel) {
        self.slot(dma, true);
    }

    pub fn remove(&mut self, dma: DmaChannel) {
        self.slot(dma, false);
    }

    fn slot(&mut self, dma: DmaChannel, value: bool) {
        match dma {
            DmaChannel::Video(ch) => self.video[ch.index()] = value,
            DmaChannel::Audio(ch) => self.audio[ch.index()] = value,
        }
    }

    pub fn contains(&self, dma: DmaChannel) -> bool {
        match dma {
            DmaChannel::Video(ch) => self.video[ch.index()],
            DmaChannel::Audio(ch) => self.audio[ch.index()],
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.video.iter().chain(self.audio.iter()).any(|&b| b)
    }

    pub fn len(&self) -> usize {
        self.video
            .iter()
            .chain(self.audio.iter())
            .filter(|&&b| b)
            .count()
    }

    /// Video channels in the set, ascending.
    pub fn video(&self) -> impl Iterator<Item = ChannelId> + '_ {
        ChannelId::all().filter(move |ch| self.video[ch.index()])
    }

    /// Audio channels in the set, ascending.
    pub fn audio(&self) -> impl Iterator<Item = ChannelId> + '_ {
        ChannelId::all().filter(move |ch| self.audio[ch.index()])
    }

    /// Video engines first, then audio engines.
    pub fn iter(&self) -> impl Iterator<Item = DmaChannel> + '_ {
        self.video()
            .map(DmaChannel::Video)
            .chain(self.audio().map(DmaChannel::Audio))
    }

    /// The video half of the set.
    pub fn video_only(&self) -> Self {
        ChannelSet {
            video: self.video,
            audio: [false; MAX_CHANNELS],
        }
    }

    /// The audio half of the set.
    pub fn audio_only(&self) -> Self {
        ChannelSet {
            video: [false; MAX_CHANNELS],
            audio: self.audio,
        }
    }

    pub fn union(&self, other: &ChannelSet) -> Self {
        self.zip(other, |a, b| a || b)
    }

    pub fn intersection(&self, other: &ChannelSet) -> Self {
        self.zip(other, |a, b| a && b)
    }

    pub fn difference(&self, other: &ChannelSet) -> Self {
        self.zip(other, |a, b| a && !b)
    }

    /// Engines in exactly one of the two sets.
    pub fn symmetric_difference(&self, other: &ChannelSet) -> Self {
        self.zip(other, |a, b| a != b)
    }

    fn zip(&self, other: &ChannelSet, op: impl Fn(bool, bool) -> bool) -> Self {
        let mut out = ChannelSet::new();
        for i in 0..MAX_CHANNELS {
            out.video[i] = op(self.video[i], other.video[i]);
            out.audio[i] = op(self.audio[i], other.audio[i]);
        }
        out
    }
}

impl FromIterator<DmaChannel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = DmaChannel>>(iter: I) -> Self {
        let mut set = ChannelSet::new();
        for dma in iter {
            set.insert(dma);
        }
        set
    }
}

impl Extend<DmaChannel> for ChannelSet {
    fn extend<I: IntoIterator<Item = DmaChannel>>(&mut self, iter: I) {
        for dma in iter {
            self.insert(dma);
        }
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, dma) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match dma {
                DmaChannel::Video(ch) => write!(f, "v{}", ch.index())?,
                DmaChannel::Audio(ch) => write!(f, "a{}", ch.index())?,
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn ch(i: usize) -> ChannelId {
        ChannelId::new(i).unwrap()
    }

    #[test]
    fn test_dma_channel_bits() {
        assert_eq!(DmaChannel::Video(ch(0)).bit(), 0x0001);
        assert_eq!(DmaChannel::Video(ch(7)).bit(), 0x0080);
        assert_eq!(DmaChannel::Audio(ch(0)).bit(), 0x0100);
        assert_eq!(DmaChannel::Audio(ch(7)).bit(), 0x8000);
    }

    #[test]
    fn test_register_conversion_random() {
        let mut rng = rand::rng();
        for _ in 0..256 {
            let mask: u32 = rng.random::<u32>() & 0xffff;
            assert_eq!(ChannelSet::from_register(mask).to_register(), mask);
        }
        assert_eq!(ChannelSet::from_register(0xffff_0000).to_register(), 0);
        assert_eq!(ChannelSet::all().to_register(), 0xffff);
    }

    #[test]
    fn test_set_algebra() {
        let a: ChannelSet = [DmaChannel::Video(ch(0)), DmaChannel::Video(ch(1))]
            .into_iter()
            .collect();
        let b: ChannelSet = [DmaChannel::Video(ch(1)), DmaChannel::Audio(ch(2))]
            .into_iter()
            .collect();

        assert_eq!(a.union(&b).to_register(), 0x0403);
        assert_eq!(a.intersection(&b).to_register(), 0x0002);
        assert_eq!(a.difference(&b).to_register(), 0x0001);
        assert_eq!(a.symmetric_difference(&b).to_register(), 0x0401);
        assert_eq!(b.video_only().to_register(), 0x0002);
        assert_eq!(b.audio_only().to_register(), 0x0400);
        assert_eq!(a.union(&b).len(), 3);
        assert!(ChannelSet::new().is_empty());
    }

    #[test]
    fn test_display() {
        let set = ChannelSet::from_register(0x0205);
        assert_eq!(set.to_string(), "{v0, v2, a1}");
        assert_eq!(ChannelSet::new().to_string(), "{}");
        assert_eq!(ch(4).to_string(), "ch4");
    }
}
