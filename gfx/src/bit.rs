//! Bit-twiddling helpers for packed pixel words.
//!
//! Pixels are packed into 32-bit words starting at the least significant end:
//! the leftmost pixel of a word lives in its lowest bits. The helpers here
//! replicate a single pixel value across every lane of a word, and merge words
//! under a mask, which is all the fill engine needs to write whole words
//! without disturbing neighbouring pixels.

/// Replicates the low 16 bits of `x` into both halves of a word.
#[inline]
pub fn repeat2x16(x: u32) -> u32 {
    (x << 16) | (x & 0xffff)
}

/// Replicates the low 8 bits of `x` into all four bytes of a word.
#[inline]
pub fn repeat4x8(x: u32) -> u32 {
    repeat2x16((x << 8) | (x & 0xff))
}

/// Replicates the low 4 bits of `x` into all eight nibbles of a word.
#[inline]
pub fn repeat8x4(x: u32) -> u32 {
    repeat4x8((x << 4) | (x & 0xf))
}

/// Replicates the low 2 bits of `x` sixteen times.
#[inline]
pub fn repeat16x2(x: u32) -> u32 {
    repeat8x4((x << 2) | (x & 0x3))
}

/// Replicates bit 0 of `x` into all 32 bits.
#[inline]
pub fn repeat32x1(x: u32) -> u32 {
    (((x as i32) << 31) >> 31) as u32
}

/// Bit select: takes bits of `a` where `mask` is set, and bits of `b`
/// elsewhere.
///
/// The fill engine uses this as `bitmix(mask, new, old)`, with `mask`
/// selecting the bits that belong to the pixels being written.
#[inline]
pub fn bitmix(mask: u32, a: u32, b: u32) -> u32 {
    (a & mask) | (b & !mask)
}

/// Mask selecting the pixel lanes from `first` (inclusive) to the top of the
/// word, for a format with `bpp` bits per pixel.
///
/// `first * bpp` must be below 32.
#[inline]
pub(crate) fn lanes_from(first: usize, bpp: usize) -> u32 {
    !0u32 << (first * bpp)
}

/// Mask selecting the pixel lanes below `end` (exclusive).
///
/// `end` must be at least 1 and `end * bpp` at most 32.
#[inline]
pub(crate) fn lanes_below(end: usize, bpp: usize) -> u32 {
    !0u32 >> (32 - end * bpp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication() {
        assert_eq!(repeat2x16(0x1234), 0x1234_1234);
        assert_eq!(repeat4x8(0x5a), 0x5a5a_5a5a);
        assert_eq!(repeat8x4(0xa), 0xaaaa_aaaa);
        assert_eq!(repeat16x2(0x2), 0xaaaa_aaaa);
        assert_eq!(repeat16x2(0x1), 0x5555_5555);
        assert_eq!(repeat32x1(1), 0xffff_ffff);
        assert_eq!(repeat32x1(0), 0);
    }

    #[test]
    fn replication_ignores_high_garbage() {
        // Only the low lane of the input is significant.
        assert_eq!(repeat8x4(0xfff1), 0x1111_1111);
        assert_eq!(repeat4x8(0xdead_be42), 0x4242_4242);
        assert_eq!(repeat32x1(0xffff_fffe), 0);
    }

    #[test]
    fn bitmix_selects() {
        assert_eq!(bitmix(0xffff_0000, 0xaaaa_aaaa, 0x5555_5555), 0xaaaa_5555);
        assert_eq!(bitmix(0, 0xffff_ffff, 0x1234_5678), 0x1234_5678);
        assert_eq!(bitmix(!0, 0x1234_5678, 0), 0x1234_5678);
    }

    #[test]
    fn lane_masks() {
        // 4bpp: lanes 3.. are bits 12..
        assert_eq!(lanes_from(3, 4), 0xffff_f000);
        assert_eq!(lanes_from(0, 4), 0xffff_ffff);
        // 4bpp: lanes below 3 are bits 0..12
        assert_eq!(lanes_below(3, 4), 0x0000_0fff);
        assert_eq!(lanes_below(8, 4), 0xffff_ffff);
        // 1bpp
        assert_eq!(lanes_below(1, 1), 0x0000_0001);
        assert_eq!(lanes_from(31, 1), 0x8000_0000);
    }
}
