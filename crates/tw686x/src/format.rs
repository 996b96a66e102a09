// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{fourcc::FourCC, standard::VideoStandard, Error};
use std::{fmt, str::FromStr};
use tw686x_sys::regs;

/// Narrowest capture width accepted by the scaler.
pub const MIN_WIDTH: u32 = 128;
/// Widest capture width, one full active line.
pub const MAX_WIDTH: u32 = 720;
/// Shortest capture height accepted by the scaler.
pub const MIN_HEIGHT: u32 = 60;

/// Output pixel formats of the DMA engine.
///
/// | Format | FourCC | Hardware code | Bits per pixel |
/// |--------|--------|---------------|----------------|
/// | YUYV   | `YUYV` | 6             | 16             |
/// | UYVY   | `UYVY` | 0             | 16             |
/// | RGB565 | `RGBP` | 5             | 16             |
/// | RGB555 | `RGBO` | 4             | 16             |
///
/// RGB555 is reported by [`PixelFormat::ALL`] but negotiation rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Yuyv,
    Uyvy,
    Rgb565,
    Rgb555,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 4] = [
        PixelFormat::Yuyv,
        PixelFormat::Uyvy,
        PixelFormat::Rgb565,
        PixelFormat::Rgb555,
    ];

    pub const fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Yuyv => FourCC::YUYV,
            PixelFormat::Uyvy => FourCC::UYVY,
            PixelFormat::Rgb565 => FourCC::RGBP,
            PixelFormat::Rgb555 => FourCC::RGBO,
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<PixelFormat> {
        PixelFormat::ALL.into_iter().find(|f| f.fourcc() == fourcc)
    }

    /// Bits per pixel.
    pub const fn depth(self) -> u32 {
        16
    }

    /// Format code for the per-channel DMA configuration register.
    pub const fn hardware_code(self) -> u32 {
        match self {
            PixelFormat::Yuyv => regs::VIDEO_FORMAT_YUYV,
            PixelFormat::Uyvy => regs::VIDEO_FORMAT_UYVY,
            PixelFormat::Rgb565 => regs::VIDEO_FORMAT_RGB565,
            PixelFormat::Rgb555 => regs::VIDEO_FORMAT_RGB555,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            PixelFormat::Yuyv => "4:2:2, packed, YUYV",
            PixelFormat::Uyvy => "4:2:2, packed, UYVY",
            PixelFormat::Rgb565 => "16 bpp RGB, le",
            PixelFormat::Rgb555 => "15 bpp RGB, le",
        }
    }

    /// Whether negotiation accepts this format.
    pub const fn is_capturable(self) -> bool {
        !matches!(self, PixelFormat::Rgb555)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let upper = s.to_ascii_uppercase();
        let code: [u8; 4] = upper
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidArgument(format!("FOURCC must be 4 characters: {}", s)))?;
        PixelFormat::from_fourcc(FourCC(code)).ok_or(Error::UnsupportedFormat(FourCC(code)))
    }
}

/// How fields are arranged in the delivered buffers.
///
/// Matches the V4L2 field orders the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMode {
    /// Let negotiation choose
    Any,
    /// Top fields only
    Top,
    /// Bottom fields only
    Bottom,
    /// Both fields woven into one frame
    Interlaced,
    /// Both fields, each delivered as its own buffer
    Alternate,
}

impl FieldMode {
    /// Modes delivering one field per buffer.
    pub const fn is_single_field(self) -> bool {
        matches!(self, FieldMode::Top | FieldMode::Bottom | FieldMode::Alternate)
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldMode::Any => "any",
            FieldMode::Top => "top",
            FieldMode::Bottom => "bottom",
            FieldMode::Interlaced => "interlaced",
            FieldMode::Alternate => "alternate",
        }
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(FieldMode::Any),
            "top" => Ok(FieldMode::Top),
            "bottom" => Ok(FieldMode::Bottom),
            "interlaced" => Ok(FieldMode::Interlaced),
            "alternate" => Ok(FieldMode::Alternate),
            _ => Err(Error::InvalidArgument(format!("unknown field mode: {}", s))),
        }
    }
}

/// A negotiated capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Never [`FieldMode::Any`] once negotiated.
    pub field: FieldMode,
}

impl VideoFormat {
    /// Full-size interlaced YUYV for `standard`.
    pub fn default_for(standard: VideoStandard) -> Self {
        VideoFormat {
            width: standard.width(),
            height: standard.height(),
            pixel_format: PixelFormat::Yuyv,
            field: FieldMode::Interlaced,
        }
    }

    /// Bytes per output line.
    pub fn bytes_per_line(&self) -> usize {
        (self.width * self.pixel_format.depth() / 8) as usize
    }

    /// Bytes per output buffer.
    pub fn size_image(&self) -> usize {
        self.bytes_per_line() * self.height as usize
    }

    /// Lines in each hardware field.
    pub fn field_lines(&self) -> u32 {
        if self.field.is_single_field() {
            self.height
        } else {
            self.height / 2
        }
    }

    /// Bytes the hardware writes for one field.
    pub fn field_size(&self) -> usize {
        self.bytes_per_line() * self.field_lines() as usize
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}",
            self.width, self.height, self.pixel_format, self.field
        )
    }
}

/// Adjust a requested format to what the hardware can produce.
///
/// `single_field_default` picks [`FieldMode::Bottom`] over
/// [`FieldMode::Interlaced`] when [`FieldMode::Any`] is requested at half
/// height or less. Single-field modes taller than one field fall back to
/// interlaced.
///
/// # Example
///
/// ```
/// use tw686x::format::try_format;
/// use tw686x::{FieldMode, PixelFormat, VideoStandard};
///
/// let fmt = try_format(VideoStandard::Pal, 1920, 1080, PixelFormat::Uyvy, FieldMode::Any, true)?;
/// assert_eq!((fmt.width, fmt.height, fmt.field), (720, 576, FieldMode::Interlaced));
///
/// let fmt = try_format(VideoStandard::Ntsc, 350, 240, PixelFormat::Yuyv, FieldMode::Any, true)?;
/// assert_eq!((fmt.width, fmt.height, fmt.field), (352, 240, FieldMode::Bottom));
/// # Ok::<(), tw686x::Error>(())
/// ```
pub fn try_format(
    standard: VideoStandard,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    field: FieldMode,
    single_field_default: bool,
) -> Result<VideoFormat, Error> {
    if !pixel_format.is_capturable() {
        return Err(Error::UnsupportedFormat(pixel_format.fourcc()));
    }

    let frame_lines = standard.height();
    let field = match field {
        FieldMode::Any if height > frame_lines / 2 => FieldMode::Interlaced,
        FieldMode::Any if single_field_default => FieldMode::Bottom,
        FieldMode::Any => FieldMode::Interlaced,
        mode if mode.is_single_field() && height > frame_lines / 2 => FieldMode::Interlaced,
        mode => mode,
    };
    let max_height = if field.is_single_field() {
        frame_lines / 2
    } else {
        frame_lines
    };

    let width = align_nearest(width.clamp(MIN_WIDTH, MAX_WIDTH), 4).clamp(MIN_WIDTH, MAX_WIDTH);
    let height = height.clamp(MIN_HEIGHT, max_height);

    Ok(VideoFormat {
        width,
        height,
        pixel_format,
        field,
    })
}

fn align_nearest(value: u32, align: u32) -> u32 {
    (value + align / 2) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_lookup() {
        assert_eq!(
            PixelFormat::from_fourcc(FourCC::RGBP),
            Some(PixelFormat::Rgb565)
        );
        assert_eq!(PixelFormat::from_fourcc(FourCC(*b"NV12")), None);
        assert_eq!("yuyv".parse::<PixelFormat>().unwrap(), PixelFormat::Yuyv);
        assert!(matches!(
            "NV12".parse::<PixelFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            "YUV".parse::<PixelFormat>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rgb555_is_rejected() {
        let result = try_format(
            VideoStandard::Ntsc,
            720,
            480,
            PixelFormat::Rgb555,
            FieldMode::Interlaced,
            true,
        );
        assert!(matches!(result, Err(Error::UnsupportedFormat(f)) if f == FourCC::RGBO));
    }

    #[test]
    fn test_clamping() {
        let fmt = try_format(
            VideoStandard::Ntsc,
            16,
            8,
            PixelFormat::Yuyv,
            FieldMode::Interlaced,
            true,
        )
        .unwrap();
        assert_eq!((fmt.width, fmt.height), (MIN_WIDTH, MIN_HEIGHT));

        let fmt = try_format(
            VideoStandard::Pal,
            719,
            600,
            PixelFormat::Uyvy,
            FieldMode::Interlaced,
            true,
        )
        .unwrap();
        assert_eq!((fmt.width, fmt.height), (720, 576));
    }

    #[test]
    fn test_field_resolution() {
        let negotiate = |height, field, single| {
            try_format(
                VideoStandard::Pal,
                720,
                height,
                PixelFormat::Yuyv,
                field,
                single,
            )
            .unwrap()
            .field
        };

        assert_eq!(negotiate(576, FieldMode::Any, true), FieldMode::Interlaced);
        assert_eq!(negotiate(288, FieldMode::Any, true), FieldMode::Bottom);
        assert_eq!(negotiate(288, FieldMode::Any, false), FieldMode::Interlaced);
        assert_eq!(negotiate(576, FieldMode::Top, true), FieldMode::Interlaced);
        assert_eq!(negotiate(288, FieldMode::Top, true), FieldMode::Top);
        assert_eq!(
            negotiate(240, FieldMode::Alternate, true),
            FieldMode::Alternate
        );
    }

    #[test]
    fn test_geometry() {
        let interlaced = VideoFormat::default_for(VideoStandard::Pal);
        assert_eq!(interlaced.bytes_per_line(), 1440);
        assert_eq!(interlaced.size_image(), 1440 * 576);
        assert_eq!(interlaced.field_lines(), 288);
        assert_eq!(interlaced.field_size(), 1440 * 288);

        let single = VideoFormat {
            height: 240,
            field: FieldMode::Top,
            ..VideoFormat::default_for(VideoStandard::Ntsc)
        };
        assert_eq!(single.field_lines(), 240);
        assert_eq!(single.size_image(), single.field_size());
    }
}
