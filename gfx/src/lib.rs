//! Packed-pixel bitmap graphics algorithms.
//!
//! This crate is deliberately architecture-independent to allow for testing on
//! the host. It knows nothing about video memory or the VCP; it only operates
//! on a borrowed slice of words laid out the way the video hardware reads
//! them.
//!
//! All drawing operations are total: geometry outside the bitmap is clipped
//! away silently rather than reported.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod bit;
mod fill;

use core::fmt;

/// Pixel encodings understood by the video hardware.
///
/// The discriminants are the values of the VCP `CMODE` register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ColorMode {
    /// 32 bits per pixel, `0xAABBGGRR`.
    Rgba8888 = 0,
    /// 16 bits per pixel, five bits per color channel and one alpha bit.
    Rgba5551 = 1,
    /// 8 bits per pixel, palette index.
    Pal8 = 2,
    /// 4 bits per pixel, palette index.
    Pal4 = 3,
    /// 2 bits per pixel, palette index.
    Pal2 = 4,
    /// 1 bit per pixel, palette index.
    Pal1 = 5,
}

impl ColorMode {
    pub const ALL: [ColorMode; 6] = [
        ColorMode::Rgba8888,
        ColorMode::Rgba5551,
        ColorMode::Pal8,
        ColorMode::Pal4,
        ColorMode::Pal2,
        ColorMode::Pal1,
    ];

    /// Decodes a `CMODE` register value.
    pub fn from_cmode(value: u32) -> Option<Self> {
        ColorMode::ALL.iter().copied().find(|m| m.cmode() == value)
    }

    /// The value to load into the VCP `CMODE` register.
    pub fn cmode(self) -> u32 {
        self as u32
    }

    /// Base-two logarithm of the number of pixels per 32-bit word.
    pub fn log2_ppw(self) -> usize {
        match self {
            ColorMode::Rgba8888 => 0,
            ColorMode::Rgba5551 => 1,
            ColorMode::Pal8 => 2,
            ColorMode::Pal4 => 3,
            ColorMode::Pal2 => 4,
            ColorMode::Pal1 => 5,
        }
    }

    /// Pixels per word.
    pub fn ppw(self) -> usize {
        1 << self.log2_ppw()
    }

    /// Bits per pixel.
    pub fn bpp(self) -> usize {
        32 >> self.log2_ppw()
    }

    /// Mask covering the significant bits of a single pixel value.
    pub fn pixel_mask(self) -> u32 {
        !0u32 >> (32 - self.bpp())
    }

    /// Number of palette entries needed to display this mode, or zero for the
    /// direct color modes.
    pub fn palette_len(self) -> usize {
        match self {
            ColorMode::Rgba8888 | ColorMode::Rgba5551 => 0,
            _ => 1 << self.bpp(),
        }
    }

    /// Replicates `color` into every pixel lane of a word, so that it can be
    /// stored with whole-word writes.
    pub fn replicate(self, color: u32) -> u32 {
        match self {
            ColorMode::Rgba8888 => color,
            ColorMode::Rgba5551 => bit::repeat2x16(color),
            ColorMode::Pal8 => bit::repeat4x8(color),
            ColorMode::Pal4 => bit::repeat8x4(color),
            ColorMode::Pal2 => bit::repeat16x2(color),
            ColorMode::Pal1 => bit::repeat32x1(color),
        }
    }

    /// Tightest legal row stride, in bytes, for a bitmap `width` pixels wide.
    /// Rows are padded out to a whole number of words.
    pub fn min_stride(self, width: usize) -> usize {
        ((width * self.bpp() + 31) / 32) * 4
    }
}

/// Reasons a `Bitmap` can't be constructed over a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitmapError {
    /// Row stride must be a whole number of words.
    UnalignedStride,
    /// Row stride is too small to hold `width` pixels.
    StrideTooSmall,
    /// The buffer is shorter than `stride * height` bytes.
    BufferTooSmall,
}

impl fmt::Display for BitmapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BitmapError::UnalignedStride => {
                f.write_str("row stride is not a multiple of 4 bytes")
            }
            BitmapError::StrideTooSmall => {
                f.write_str("row stride is too small for the width")
            }
            BitmapError::BufferTooSmall => {
                f.write_str("pixel buffer is too small for the geometry")
            }
        }
    }
}

/// A rectangular array of packed pixels, borrowed from some word buffer.
///
/// Within each word, the leftmost pixel occupies the least significant bits.
#[derive(Debug)]
pub struct Bitmap<'a> {
    words: &'a mut [u32],
    width: usize,
    height: usize,
    stride: usize,
    mode: ColorMode,
}

impl<'a> Bitmap<'a> {
    /// Wraps `words` as a `width` x `height` bitmap with rows `stride` bytes
    /// apart.
    pub fn new(
        words: &'a mut [u32],
        width: usize,
        height: usize,
        stride: usize,
        mode: ColorMode,
    ) -> Result<Self, BitmapError> {
        if stride % 4 != 0 {
            return Err(BitmapError::UnalignedStride);
        }
        if stride < mode.min_stride(width) {
            return Err(BitmapError::StrideTooSmall);
        }
        let needed = stride
            .checked_mul(height)
            .ok_or(BitmapError::BufferTooSmall)?;
        if words.len() * 4 < needed {
            return Err(BitmapError::BufferTooSmall);
        }
        Ok(Bitmap {
            words,
            width,
            height,
            stride,
            mode,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn words(&self) -> &[u32] {
        &self.words[..]
    }

    fn stride_words(&self) -> usize {
        self.stride / 4
    }

    /// Locates pixel `(x, y)`: its word index and bit shift within the word.
    /// Coordinates must be in bounds.
    fn locate(&self, x: usize, y: usize) -> (usize, u32) {
        let log2_ppw = self.mode.log2_ppw();
        let word = y * self.stride_words() + (x >> log2_ppw);
        let lane = x & ((1 << log2_ppw) - 1);
        (word, (lane * self.mode.bpp()) as u32)
    }

    fn in_bounds(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((x, y))
    }

    /// Fills the entire bitmap with `color`.
    pub fn clear(&mut self, color: u32) {
        let (w, h) = (self.width as i32, self.height as i32);
        self.fill_rect(0, 0, w, h, color)
    }

    /// Fills the rectangle with top-left corner `(x0, y0)` and size `w` x `h`
    /// with `color`.
    ///
    /// The rectangle is clipped to the bitmap. Portions outside are ignored,
    /// and a rectangle with no area inside the bitmap does nothing.
    pub fn fill_rect(&mut self, x0: i32, y0: i32, w: i32, h: i32, color: u32) {
        // Clamp in 64 bits so that huge extents can't wrap around.
        let x1 = (i64::from(x0) + i64::from(w)).min(self.width as i64).max(0);
        let y1 = (i64::from(y0) + i64::from(h)).min(self.height as i64).max(0);
        let x0 = i64::from(x0).max(0);
        let y0 = i64::from(y0).max(0);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let stride_words = self.stride_words();
        let pattern = self.mode.replicate(color);
        fill::fill_rows(
            self.words,
            stride_words,
            self.mode,
            x0 as usize,
            y0 as usize,
            (x1 - x0) as usize,
            (y1 - y0) as usize,
            pattern,
        );
    }

    /// Sets the pixel at `(x, y)` to `color`. Points outside the bitmap are
    /// ignored.
    pub fn draw_point(&mut self, x: i32, y: i32, color: u32) {
        let (x, y) = match self.in_bounds(x, y) {
            Some(p) => p,
            None => return,
        };
        let (index, shift) = self.locate(x, y);
        let mask = self.mode.pixel_mask() << shift;
        let word = &mut self.words[index];
        *word = bit::bitmix(mask, color << shift, *word);
    }

    /// Draws a line from `(x0, y0)` to `(x1, y1)`, both endpoints included,
    /// using Bresenham's algorithm. Pixels falling outside the bitmap are
    /// skipped.
    pub fn draw_line(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: u32,
    ) {
        let dx = (i64::from(x1) - i64::from(x0)).abs();
        let dy = -(i64::from(y1) - i64::from(y0)).abs();
        let step_x = if x0 < x1 { 1 } else { -1 };
        let step_y = if y0 < y1 { 1 } else { -1 };

        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.draw_point(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += step_x;
            }
            if e2 <= dx {
                err += dx;
                y += step_y;
            }
        }
    }

    /// Reads the pixel value at `(x, y)`, or `None` outside the bitmap.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        let (x, y) = self.in_bounds(x, y)?;
        let (index, shift) = self.locate(x, y);
        Some((self.words[index] >> shift) & self.mode.pixel_mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// Makes a zeroed buffer big enough for a tightly packed bitmap, plus
    /// guard words on either side.
    fn guarded(mode: ColorMode, width: usize, height: usize) -> Vec<u32> {
        let stride_words = mode.min_stride(width) / 4;
        vec![0; stride_words * height + 2]
    }

    const GUARD: u32 = 0xdead_beef;

    fn with_bitmap<R>(
        buf: &mut [u32],
        mode: ColorMode,
        width: usize,
        height: usize,
        body: impl FnOnce(&mut Bitmap) -> R,
    ) -> R {
        let last = buf.len() - 1;
        buf[0] = GUARD;
        buf[last] = GUARD;
        let stride = mode.min_stride(width);
        let mut bmp =
            Bitmap::new(&mut buf[1..last], width, height, stride, mode)
                .unwrap();
        let r = body(&mut bmp);
        assert_eq!(buf[0], GUARD, "write before start of buffer");
        assert_eq!(buf[last], GUARD, "write past end of buffer");
        r
    }

    fn snapshot(bmp: &Bitmap) -> Vec<u32> {
        let mut out = vec![];
        for y in 0..bmp.height() as i32 {
            for x in 0..bmp.width() as i32 {
                out.push(bmp.pixel(x, y).unwrap());
            }
        }
        out
    }

    /// Paints every pixel with a value derived from its coordinates, so that
    /// "unchanged" is distinguishable from "zero".
    fn checker(bmp: &mut Bitmap) {
        let mask = bmp.mode().pixel_mask();
        for y in 0..bmp.height() as i32 {
            for x in 0..bmp.width() as i32 {
                bmp.draw_point(x, y, (x as u32 * 7 + y as u32 * 13) & mask);
            }
        }
    }

    #[test]
    fn geometry_checks() {
        let mut buf = [0u32; 8];
        assert_eq!(
            Bitmap::new(&mut buf, 16, 2, 6, ColorMode::Pal4).unwrap_err(),
            BitmapError::UnalignedStride
        );
        assert_eq!(
            Bitmap::new(&mut buf, 16, 2, 4, ColorMode::Pal4).unwrap_err(),
            BitmapError::StrideTooSmall
        );
        assert_eq!(
            Bitmap::new(&mut buf, 16, 5, 8, ColorMode::Pal4).unwrap_err(),
            BitmapError::BufferTooSmall
        );
        // Stride may exceed the packed width.
        assert!(Bitmap::new(&mut buf, 16, 2, 16, ColorMode::Pal4).is_ok());
    }

    #[test]
    fn mode_tables() {
        let ppw: Vec<_> = ColorMode::ALL.iter().map(|m| m.ppw()).collect();
        assert_eq!(ppw, [1, 2, 4, 8, 16, 32]);
        let bpp: Vec<_> = ColorMode::ALL.iter().map(|m| m.bpp()).collect();
        assert_eq!(bpp, [32, 16, 8, 4, 2, 1]);
        for m in &ColorMode::ALL {
            assert_eq!(ColorMode::from_cmode(m.cmode()), Some(*m));
        }
        assert_eq!(ColorMode::from_cmode(6), None);
        assert_eq!(ColorMode::Pal4.palette_len(), 16);
        assert_eq!(ColorMode::Rgba5551.palette_len(), 0);
        assert_eq!(ColorMode::Pal1.min_stride(33), 8);
    }

    #[test]
    fn narrow_fill_touches_single_word() {
        // 16x2 pixels at 4bpp, 8 bytes per row.
        let mut buf = [0x1234_5678u32, 0x9abc_def0, 0x1111_1111, 0x2222_2222];
        {
            let mut bmp =
                Bitmap::new(&mut buf, 16, 2, 8, ColorMode::Pal4).unwrap();
            bmp.fill_rect(3, 0, 5, 1, 0xA);
        }
        // Pixels 3..8 of row 0 live in the top five nibbles of word 0.
        assert_eq!(buf, [0xaaaa_a678, 0x9abc_def0, 0x1111_1111, 0x2222_2222]);
    }

    #[test]
    fn fill_unaligned_edges_every_mode() {
        for &mode in &ColorMode::ALL {
            let (width, height) = (70, 5);
            let mut buf = guarded(mode, width, height);
            with_bitmap(&mut buf, mode, width, height, |bmp| {
                checker(bmp);
                let before = snapshot(bmp);

                let (x0, y0, w, h) = (3, 1, 37, 3);
                let color = mode.pixel_mask() ^ 1;
                bmp.fill_rect(x0, y0, w, h, color);

                for y in 0..height as i32 {
                    for x in 0..width as i32 {
                        let inside =
                            x >= x0 && x < x0 + w && y >= y0 && y < y0 + h;
                        let expected = if inside {
                            color & mode.pixel_mask()
                        } else {
                            before[y as usize * width + x as usize]
                        };
                        assert_eq!(
                            bmp.pixel(x, y),
                            Some(expected),
                            "{:?} pixel ({}, {})",
                            mode,
                            x,
                            y
                        );
                    }
                }
            });
        }
    }

    #[test]
    fn fill_masks_color_to_depth() {
        let mut buf = [0u32; 1];
        let mut bmp = Bitmap::new(&mut buf, 32, 1, 4, ColorMode::Pal1).unwrap();
        bmp.fill_rect(0, 0, 3, 1, 0x3);
        assert_eq!(bmp.pixel(0, 0), Some(1));
        assert_eq!(bmp.pixel(3, 0), Some(0));
        assert_eq!(bmp.words(), &[0b111]);
    }

    #[test]
    fn clear_is_full_fill() {
        for &mode in &ColorMode::ALL {
            let (width, height) = (21, 3);
            let stride = mode.min_stride(width) + 4;
            let words = stride / 4 * height;

            let mut a = vec![0x5a5a_5a5a; words];
            let mut b = a.clone();
            Bitmap::new(&mut a, width, height, stride, mode)
                .unwrap()
                .clear(0x0bad_cafe);
            Bitmap::new(&mut b, width, height, stride, mode)
                .unwrap()
                .fill_rect(0, 0, width as i32, height as i32, 0x0bad_cafe);
            assert_eq!(a, b, "{:?}", mode);
        }
    }

    #[test]
    fn fill_clips_to_bounds() {
        for &mode in &ColorMode::ALL {
            let (width, height) = (40, 4);
            let mut buf = guarded(mode, width, height);
            with_bitmap(&mut buf, mode, width, height, |bmp| {
                bmp.fill_rect(-10, -10, 15, 12, 1);
                bmp.fill_rect(35, 2, 100, 100, 1);
                bmp.fill_rect(i32::MAX - 1, 0, i32::MAX, 1, 1);
                bmp.fill_rect(0, 0, 0, 4, 1);
                bmp.fill_rect(0, 0, -3, 4, 1);
                bmp.fill_rect(100, 100, 5, 5, 1);

                for y in 0..height as i32 {
                    for x in 0..width as i32 {
                        let inside = (x < 5 && y < 2) || (x >= 35 && y >= 2);
                        assert_eq!(
                            bmp.pixel(x, y),
                            Some(inside as u32),
                            "{:?} pixel ({}, {})",
                            mode,
                            x,
                            y
                        );
                    }
                }
            });
        }
    }

    #[test]
    fn fill_matches_per_pixel_model() {
        let mut rng = rand::rngs::SmallRng::seed_from_u64(20210419);
        for &mode in &ColorMode::ALL {
            let (width, height) = (53, 7);
            let mut buf = guarded(mode, width, height);
            with_bitmap(&mut buf, mode, width, height, |bmp| {
                let mut model = vec![0u32; width * height];
                for _ in 0..200 {
                    let x0 = rng.gen_range(-8, width as i32 + 8);
                    let y0 = rng.gen_range(-3, height as i32 + 3);
                    let w = rng.gen_range(-2, 48);
                    let h = rng.gen_range(-2, 6);
                    let color: u32 = rng.gen();

                    bmp.fill_rect(x0, y0, w, h, color);
                    for y in y0.max(0)..(y0 + h).min(height as i32) {
                        for x in x0.max(0)..(x0 + w).min(width as i32) {
                            model[y as usize * width + x as usize] =
                                color & mode.pixel_mask();
                        }
                    }
                }
                assert_eq!(snapshot(bmp), model, "{:?}", mode);
            });
        }
    }

    #[test]
    fn point_clipping() {
        for &mode in &ColorMode::ALL {
            let (width, height) = (9, 2);
            let mut buf = guarded(mode, width, height);
            with_bitmap(&mut buf, mode, width, height, |bmp| {
                for &(x, y) in
                    &[(-1, 0), (0, -1), (9, 0), (0, 2), (i32::MIN, i32::MAX)]
                {
                    bmp.draw_point(x, y, !0);
                }
                assert!(bmp.words().iter().all(|&w| w == 0), "{:?}", mode);

                bmp.draw_point(8, 1, !0);
                assert_eq!(bmp.pixel(8, 1), Some(mode.pixel_mask()));
                assert_eq!(bmp.pixel(7, 1), Some(0));
            });
        }
    }

    #[test]
    fn point_preserves_neighbors() {
        let mut buf = [0xffff_ffffu32; 2];
        let mut bmp = Bitmap::new(&mut buf, 16, 1, 8, ColorMode::Pal4).unwrap();
        bmp.draw_point(9, 0, 0x3);
        assert_eq!(bmp.words(), &[0xffff_ffff, 0xffff_ff3f]);
    }

    fn check_line(bmp: &Bitmap, pred: impl Fn(i32, i32) -> bool) {
        for y in 0..bmp.height() as i32 {
            for x in 0..bmp.width() as i32 {
                if pred(x, y) {
                    assert_eq!(
                        bmp.pixel(x, y),
                        Some(1),
                        "Pixel at ({}, {}) should be set",
                        x,
                        y
                    );
                } else {
                    assert_eq!(
                        bmp.pixel(x, y),
                        Some(0),
                        "Pixel at ({}, {}) should not be set",
                        x,
                        y
                    );
                }
            }
        }
    }

    fn count_set(bmp: &Bitmap) -> usize {
        snapshot(bmp).iter().filter(|&&p| p != 0).count()
    }

    #[test]
    fn zero_length() {
        let mut buf = [0; 30];
        let mut bmp =
            Bitmap::new(&mut buf, 10, 10, 12, ColorMode::Pal8).unwrap();
        // A zero-length line should still set one pixel.
        bmp.draw_line(4, 4, 4, 4, 1);
        check_line(&bmp, |x, y| x == 4 && y == 4);
    }

    #[test]
    fn horizontal_full() {
        let mut buf = [0; 100 * 100 / 32];
        let mut bmp =
            Bitmap::new(&mut buf, 96, 33, 12, ColorMode::Pal1).unwrap();
        bmp.draw_line(95, 7, 0, 7, 1);
        check_line(&bmp, |_, y| y == 7);
        assert_eq!(count_set(&bmp), 96);
    }

    #[test]
    fn vertical_full() {
        let mut buf = [0; 100 * 100 / 4];
        let mut bmp =
            Bitmap::new(&mut buf, 100, 100, 100, ColorMode::Pal8).unwrap();
        bmp.draw_line(3, 0, 3, 99, 1);
        check_line(&bmp, |x, _| x == 3);
    }

    #[test]
    fn diagonal_full() {
        let mut buf = [0; 100 * 100 / 4];
        let mut bmp =
            Bitmap::new(&mut buf, 100, 100, 100, ColorMode::Pal8).unwrap();
        bmp.draw_line(99, 99, 0, 0, 1);
        check_line(&bmp, |x, y| x == y);
        assert_eq!(count_set(&bmp), 100);
    }

    #[test]
    fn steep_line_hits_endpoints() {
        let mut buf = [0; 20 * 20];
        let mut bmp =
            Bitmap::new(&mut buf, 20, 20, 80, ColorMode::Rgba8888).unwrap();
        bmp.draw_line(17, 2, 5, 19, 1);
        assert_eq!(bmp.pixel(17, 2), Some(1));
        assert_eq!(bmp.pixel(5, 19), Some(1));
        // One pixel per step along the major axis.
        assert_eq!(count_set(&bmp), 18);
    }

    #[test]
    fn line_partly_outside_is_clipped() {
        let mut buf = guarded(ColorMode::Pal2, 16, 4);
        with_bitmap(&mut buf, ColorMode::Pal2, 16, 4, |bmp| {
            bmp.draw_line(-4, 1, 20, 1, 1);
            check_line(bmp, |_, y| y == 1);
        });
    }
}
