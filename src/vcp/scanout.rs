//! Programs that scan a bitmap out to the screen.
//!
//! Nearly every layer shows a bitmap the same way: set up the pixel format and
//! scaling, load the palette, then at the start of each displayed row point
//! `ADDR` at that row's pixels. Rows may be stretched over several scanlines;
//! the VCP keeps fetching from the same `ADDR` until told otherwise, so only
//! one wait and one load is needed per bitmap row.

use super::{Slot, Vcr, Writer, WAIT_FOREVER};
use gfx::ColorMode;
use smart_default::SmartDefault;

/// Parameters of a scanout program.
#[derive(Copy, Clone, Debug, SmartDefault)]
pub struct Scanout {
    #[default(ColorMode::Rgba8888)]
    pub mode: ColorMode,
    /// Source step per output pixel, 16.16 fixed point.
    #[default(0x1_0000)]
    pub xincr: u32,
    /// Value for the `RMODE` register, if it should be set.
    pub rmode: Option<u32>,
    /// Palette entries to load, starting at entry 0. The colors themselves are
    /// left zero for the caller to fill in.
    pub palette_len: u32,
    /// Scanline where the first row is displayed.
    pub first_line: u32,
    /// Scanlines per bitmap row, as the ratio `scale_num / scale_den`. Row
    /// `k` starts `k * scale_num / scale_den` lines below `first_line`.
    #[default(1)]
    pub scale_num: u32,
    #[default(1)]
    pub scale_den: u32,
    /// Number of bitmap rows.
    #[default(1080)]
    pub rows: u32,
    /// Distance between bitmap rows, in words.
    pub stride_words: u32,
    /// Value for `HSTOP` while the bitmap is displayed; the layer is hidden
    /// above and below it.
    #[default(1920)]
    pub hstop: u32,
    /// Emit an `XOFFS` load after the first row, for horizontal scrolling.
    pub xoffs: bool,
}

/// Words of an emitted program that the caller may rewrite between frames.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanoutSlots {
    /// First palette color word.
    pub palette: Option<Slot>,
    /// The `SETREG XOFFS` instruction.
    pub xoffs: Option<Slot>,
}

impl Scanout {
    /// Number of words `emit` will write.
    pub fn program_len(&self) -> usize {
        let prologue = 2 + self.rmode.is_some() as usize;
        let palette = if self.palette_len > 0 {
            1 + self.palette_len as usize
        } else {
            0
        };
        let rows = 2 * self.rows as usize + 1 + self.xoffs as usize;
        let epilogue = 3;
        prologue + palette + rows + epilogue
    }

    /// Scanline at which bitmap row `k` starts. `row_line(rows)` is the
    /// first line below the bitmap.
    ///
    /// # Panics
    ///
    /// If `scale_den` is zero.
    pub fn row_line(&self, k: u32) -> u32 {
        assert!(self.scale_den > 0, "scanout scale has zero denominator");
        let offset = u64::from(k) * u64::from(self.scale_num)
            / u64::from(self.scale_den);
        self.first_line + offset as u32
    }

    /// Number of scanlines the bitmap is stretched over.
    pub fn lines(&self) -> u32 {
        self.row_line(self.rows) - self.first_line
    }

    /// Writes the program, fetching row 0 from VCP word address `pixels`.
    ///
    /// # Panics
    ///
    /// If `rows` or `scale_den` is zero, or if `w` lacks room for
    /// `program_len` words.
    pub fn emit(&self, w: &mut Writer, pixels: u32) -> ScanoutSlots {
        assert!(self.rows > 0, "scanout needs at least one row");
        let mut slots = ScanoutSlots::default();

        if let Some(rmode) = self.rmode {
            w.set_register(Vcr::RMode, rmode);
        }
        w.set_register(Vcr::XIncr, self.xincr);
        w.set_register(Vcr::CMode, self.mode.cmode());

        if self.palette_len > 0 {
            slots.palette = Some(w.reserve_palette(0, self.palette_len));
        }

        let mut addr = pixels;
        for k in 0..self.rows {
            w.wait_y(self.row_line(k));
            w.set_register(Vcr::Addr, addr);
            if k == 0 {
                w.set_register(Vcr::HStop, self.hstop);
                if self.xoffs {
                    slots.xoffs = Some(w.set_register(Vcr::XOffs, 0));
                }
            }
            addr += self.stride_words;
        }

        w.wait_y(self.row_line(self.rows));
        w.set_register(Vcr::HStop, 0);
        w.wait_y(WAIT_FOREVER);
        slots
    }
}
