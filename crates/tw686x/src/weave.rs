// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{pingpong::Field, VideoFormat};

/// Tallest field the hardware transfers, in lines.
pub const MAX_FIELD_LINES: usize = 288;

/// Copy one hardware field into an output frame.
///
/// With `single` set, the field fills consecutive lines of `dst` from the
/// top, at most [`MAX_FIELD_LINES`] of them. Otherwise the field lands on
/// every second line starting at `field.index()`, so the two fields of a
/// frame interleave. A line that would run past the end of `dst` or `src`
/// ends the copy. Returns `false` only when the format has no pixels.
///
/// ```
/// use tw686x::pingpong::Field;
/// use tw686x::weave::weave_field;
/// use tw686x::{FieldMode, PixelFormat, VideoFormat};
///
/// let format = VideoFormat {
///     width: 2,
///     height: 4,
///     pixel_format: PixelFormat::Yuyv,
///     field: FieldMode::Interlaced,
/// };
/// let mut frame = [0u8; 16];
/// weave_field(&[1; 8], &mut frame, &format, Field::Top, false);
/// weave_field(&[2; 8], &mut frame, &format, Field::Bottom, false);
/// assert_eq!(frame, [1, 1, 1, 1, 2, 2, 2, 2, 1, 1, 1, 1, 2, 2, 2, 2]);
/// ```
pub fn weave_field(
    src: &[u8],
    dst: &mut [u8],
    format: &VideoFormat,
    field: Field,
    single: bool,
) -> bool {
    let pitch = format.bytes_per_line();
    if pitch == 0 {
        return false;
    }

    let height = format.height as usize;
    let (start, step, lines) = if single {
        (0, pitch, height.min(MAX_FIELD_LINES))
    } else {
        (field.index() * pitch, 2 * pitch, height / 2)
    };

    for line in 0..lines {
        let at = start + line * step;
        let from = line * pitch;
        if at + pitch > dst.len() || from + pitch > src.len() {
            log::trace!("weave truncated at line {} of {}", line, lines);
            break;
        }
        dst[at..at + pitch].copy_from_slice(&src[from..from + pitch]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldMode, PixelFormat};
    use rand::Rng;

    fn format(width: u32, height: u32, field: FieldMode) -> VideoFormat {
        VideoFormat {
            width,
            height,
            pixel_format: PixelFormat::Uyvy,
            field,
        }
    }

    #[test]
    fn test_interlaced_round_trip() {
        let fmt = format(720, 576, FieldMode::Interlaced);
        let pitch = fmt.bytes_per_line();
        let mut rng = rand::rng();
        let frame: Vec<u8> = (0..fmt.size_image()).map(|_| rng.random()).collect();

        // Split the frame into its two fields
        let mut top = Vec::new();
        let mut bottom = Vec::new();
        for (i, line) in frame.chunks(pitch).enumerate() {
            if i % 2 == 0 {
                top.extend_from_slice(line);
            } else {
                bottom.extend_from_slice(line);
            }
        }

        let mut out = vec![0u8; fmt.size_image()];
        assert!(weave_field(&top, &mut out, &fmt, Field::Top, false));
        assert!(weave_field(&bottom, &mut out, &fmt, Field::Bottom, false));
        assert_eq!(out, frame);
    }

    #[test]
    fn test_single_field_is_capped() {
        let fmt = format(128, 288, FieldMode::Top);
        let pitch = fmt.bytes_per_line();
        let src: Vec<u8> = (0..pitch * 300).map(|i| (i / pitch) as u8).collect();
        let mut dst = vec![0xffu8; pitch * 300];

        assert!(weave_field(&src, &mut dst, &fmt, Field::Bottom, true));
        assert_eq!(dst[287 * pitch], 31);
        assert_eq!(dst[288 * pitch], 0xff);
    }

    #[test]
    fn test_short_destination_truncates() {
        let fmt = format(128, 480, FieldMode::Interlaced);
        let pitch = fmt.bytes_per_line();
        let src = vec![7u8; pitch * 240];
        let mut dst = vec![0u8; pitch * 5 + 10];

        assert!(weave_field(&src, &mut dst, &fmt, Field::Bottom, false));
        // Lines 1 and 3 fit; line 5 would end past the buffer
        assert_eq!(dst[pitch], 7);
        assert_eq!(dst[3 * pitch], 7);
        assert!(dst[4 * pitch..].iter().all(|&b| b == 0));
        assert!(dst[..pitch].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_source_truncates() {
        let fmt = format(128, 240, FieldMode::Bottom);
        let pitch = fmt.bytes_per_line();
        let mut dst = vec![0u8; fmt.size_image()];

        assert!(weave_field(&vec![3u8; pitch * 2], &mut dst, &fmt, Field::Top, true));
        assert!(dst[..2 * pitch].iter().all(|&b| b == 3));
        assert!(dst[2 * pitch..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_format() {
        let fmt = format(0, 480, FieldMode::Interlaced);
        assert!(!weave_field(&[1, 2], &mut [0u8; 4], &fmt, Field::Top, false));
    }
}
