//! Rectangle fill over packed pixel words.
//!
//! Each row of a rectangle splits into up to three zones: a partial head word
//! when the left edge is not word aligned, a run of whole words, and a partial
//! tail word when the right edge is not word aligned. Whole words are stored
//! outright; partial words are read, merged under a mask, and written back so
//! that pixels outside the rectangle keep their values.

use crate::bit::{bitmix, lanes_below, lanes_from};
use crate::ColorMode;

/// Word layout of a single rectangle row. Masks select the bits belonging to
/// the rectangle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct RowPlan {
    pub head: Option<u32>,
    pub whole_words: usize,
    pub tail: Option<u32>,
}

impl RowPlan {
    /// Plans a row of `w` pixels starting at column `x0`. `w` must be nonzero.
    pub fn new(mode: ColorMode, x0: usize, w: usize) -> Self {
        let log2_ppw = mode.log2_ppw();
        let ppw = 1 << log2_ppw;
        let bpp = mode.bpp();

        let align = x0 & (ppw - 1);
        let end = (x0 + w) & (ppw - 1);

        if align + w < ppw {
            // Head and tail land in the same word. Narrow the head mask so it
            // also excludes the tail region, and write that word once.
            let head = lanes_from(align, bpp) & lanes_below(align + w, bpp);
            return RowPlan {
                head: Some(head),
                whole_words: 0,
                tail: None,
            };
        }

        let head_pixels = if align != 0 { ppw - align } else { 0 };
        RowPlan {
            head: if align != 0 {
                Some(lanes_from(align, bpp))
            } else {
                None
            },
            whole_words: (w - head_pixels) >> log2_ppw,
            tail: if end != 0 {
                Some(lanes_below(end, bpp))
            } else {
                None
            },
        }
    }
}

/// Fills `h` rows of `w` pixels, starting at `(x0, y0)`, with `pattern`.
///
/// `pattern` must already hold the color replicated into every lane of the
/// word (see `ColorMode::replicate`). The rectangle must be clipped to the
/// buffer; `w` and `h` must be nonzero.
///
/// # Panics
///
/// If the rectangle does not fit in `words` given `stride_words`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rows(
    words: &mut [u32],
    stride_words: usize,
    mode: ColorMode,
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    pattern: u32,
) {
    let plan = RowPlan::new(mode, x0, w);
    let first_word = x0 >> mode.log2_ppw();

    for row in words.chunks_mut(stride_words).skip(y0).take(h) {
        let mut i = first_word;

        if let Some(mask) = plan.head {
            row[i] = bitmix(mask, pattern, row[i]);
            i += 1;
        }

        row[i..i + plan.whole_words].fill(pattern);
        i += plan.whole_words;

        if let Some(mask) = plan.tail {
            row[i] = bitmix(mask, pattern, row[i]);
        }
    }
}
