//! Performance measurement using the seven-segment display.
//!
//! Printing the raster line right after drawing shows how much of the frame
//! the drawing took. `mark_raster_line` does that, but only when the
//! `measurement` feature is enabled, so calls can be left in place.

use crate::mmio::{Mmio, Reg};

/// Segment patterns for the digits 0 through 9. Bit 0 is segment a, bit 6 is
/// segment g.
const SEVSEG_DIGITS: [u32; 10] =
    [0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f];

/// Segment pattern for a decimal digit. Values above 9 light nothing.
pub fn sevseg_encode(digit: u32) -> u32 {
    SEVSEG_DIGITS.get(digit as usize).copied().unwrap_or(0)
}

/// Shows `value` in decimal on the eight-digit display, right aligned, with
/// leading zeros blanked. Only the low eight digits are shown.
pub fn sevseg_print_dec(mmio: &impl Mmio, value: u32) {
    let mut rest = value;
    for (i, &reg) in Reg::SEGDISP.iter().enumerate() {
        let segments = if rest != 0 || i == 0 {
            sevseg_encode(rest % 10)
        } else {
            0
        };
        mmio.write(reg, segments);
        rest /= 10;
    }
}

/// Shows the current raster line on the seven-segment display.
///
/// If the `measurement` feature is not set, this is a no-op.
pub fn mark_raster_line(mmio: &impl Mmio) {
    #[cfg(feature = "measurement")]
    sevseg_print_dec(mmio, mmio.raster_line());
    #[cfg(not(feature = "measurement"))]
    let _ = mmio;
}
