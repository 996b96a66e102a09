// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use core::fmt;

/// Four-character pixel format code as used by V4L2.
///
/// The numeric form is always little-endian: the first character is the
/// least significant byte, independent of the host byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const YUYV: FourCC = FourCC(*b"YUYV");
    pub const UYVY: FourCC = FourCC(*b"UYVY");
    /// RGB565, `V4L2_PIX_FMT_RGB565`.
    pub const RGBP: FourCC = FourCC(*b"RGBP");
    /// RGB555, `V4L2_PIX_FMT_RGB555`.
    pub const RGBO: FourCC = FourCC(*b"RGBO");

    pub const fn from_u32(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }

    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0 {
                    write!(f, "{}", core::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FourCC")
            .field(&format_args!("{}", self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_code() {
        assert_eq!(FourCC::YUYV.to_u32(), 0x5659_5559);
        assert_eq!(FourCC::from(0x5659_5559u32), FourCC::YUYV);
        assert_eq!(u32::from(FourCC::from(b"UYVY")), 0x5956_5955);
    }

    #[test]
    fn test_display_escapes_binary() {
        assert_eq!(FourCC::RGBP.to_string(), "RGBP");
        assert_eq!(FourCC([b'A', 0, b'B', 0xff]).to_string(), "A\\x00B\\xff");
        assert_eq!(format!("{:?}", FourCC::RGBO), "FourCC(RGBO)");
    }
}
