//! Video control processor programs.
//!
//! Each display layer is driven by a VCP program living in video RAM. Once
//! per frame the VCP restarts the program from the layer's entry point and
//! executes it in step with the raster: `WAITY` stalls until a scanline is
//! reached, `SETREG` loads a video register, and `SETPAL` loads a run of
//! palette entries from the words that follow it. Nothing checks that a
//! program is sensible; a program is expected to issue non-decreasing waits
//! and to end by waiting for a line that never comes.
//!
//! This module has the instruction encoders (`emit_*`), a cursor for writing
//! programs into a buffer (`Writer`), a decoder for inspecting them, and the
//! means of attaching a program to a layer. The common "one `ADDR` load per
//! pixel row" shape is generated by `scanout::Scanout`.

pub mod scanout;

use crate::vmem::{Region, VideoMemory};
use crate::VRAM_START;
use log::debug;

/// Scanline that is never reached. Waiting for it parks the program until the
/// next frame.
pub const WAIT_FOREVER: u32 = 32767;

/// Largest palette run a single `SETPAL` can load.
pub const MAX_PALETTE_RUN: u32 = 256;

const OP_JMP: u32 = 0x01;
const OP_JSR: u32 = 0x02;
const OP_RTS: u32 = 0x03;
const OP_WAITX: u32 = 0x04;
const OP_WAITY: u32 = 0x05;
const OP_SETPAL: u32 = 0x06;
const SETREG_FLAG: u32 = 0x8000_0000;

/// Video registers loadable with `SETREG`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Vcr {
    /// VCP word address of the pixel row to fetch.
    Addr = 0,
    /// Horizontal start offset into the row, 16.16 fixed point.
    XOffs = 1,
    /// Horizontal source step per output pixel, 16.16 fixed point.
    XIncr = 2,
    /// First output pixel of the layer on each line.
    HStrt = 3,
    /// Output pixel where the layer stops on each line. Zero hides the layer.
    HStop = 4,
    /// Pixel encoding; see `gfx::ColorMode::cmode`.
    CMode = 5,
    /// Render mode flags.
    RMode = 6,
}

impl Vcr {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Vcr::Addr),
            1 => Some(Vcr::XOffs),
            2 => Some(Vcr::XIncr),
            3 => Some(Vcr::HStrt),
            4 => Some(Vcr::HStop),
            5 => Some(Vcr::CMode),
            6 => Some(Vcr::RMode),
            _ => None,
        }
    }
}

/// Translates a CPU address in video RAM to the VCP's word addressing.
///
/// Every address embedded in a VCP program (`ADDR` loads, jumps) must be
/// passed through this.
///
/// # Panics
///
/// If `cpu_addr` is below `VRAM_START`.
pub fn to_vcp_addr(cpu_addr: u32) -> u32 {
    assert!(
        cpu_addr >= VRAM_START,
        "address {:#x} is not in VRAM",
        cpu_addr
    );
    (cpu_addr - VRAM_START) / 4
}

pub fn emit_nop() -> u32 {
    0
}

/// Continues execution at VCP word address `addr`.
pub fn emit_jmp(addr: u32) -> u32 {
    (OP_JMP << 24) | (addr & 0x00ff_ffff)
}

pub fn emit_jsr(addr: u32) -> u32 {
    (OP_JSR << 24) | (addr & 0x00ff_ffff)
}

pub fn emit_rts() -> u32 {
    OP_RTS << 24
}

/// Stalls until the raster reaches horizontal position `x`.
pub fn emit_wait_x(x: u32) -> u32 {
    (OP_WAITX << 24) | (x & 0xffff)
}

/// Stalls until the raster reaches scanline `y`.
pub fn emit_wait_y(y: u32) -> u32 {
    (OP_WAITY << 24) | (y & 0xffff)
}

/// Loads `value` (24 bits) into register `reg`.
pub fn emit_set_register(reg: Vcr, value: u32) -> u32 {
    SETREG_FLAG | ((reg as u32) << 24) | (value & 0x00ff_ffff)
}

/// Loads `count` palette entries starting at `first`. The instruction must be
/// followed by exactly `count` color words.
///
/// # Panics
///
/// If `count` is not in `1..=256` or the run extends past entry 255.
pub fn emit_set_palette(first: u32, count: u32) -> u32 {
    assert!(
        count >= 1 && first + count <= MAX_PALETTE_RUN,
        "bad palette run {}+{}",
        first,
        count
    );
    (OP_SETPAL << 24) | (first << 8) | (count - 1)
}

/// A decoded instruction word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Instr {
    Nop,
    Jmp(u32),
    Jsr(u32),
    Rts,
    WaitX(u32),
    WaitY(u32),
    SetPal { first: u32, count: u32 },
    SetReg(Vcr, u32),
    /// A word that isn't a valid instruction.
    Invalid(u32),
}

/// Decodes a single instruction word.
pub fn decode(word: u32) -> Instr {
    if word & SETREG_FLAG != 0 {
        let reg = (word >> 24) & 0x7f;
        return match Vcr::from_index(reg) {
            Some(r) => Instr::SetReg(r, word & 0x00ff_ffff),
            None => Instr::Invalid(word),
        };
    }
    let operand = word & 0x00ff_ffff;
    match word >> 24 {
        0 if operand == 0 => Instr::Nop,
        OP_JMP => Instr::Jmp(operand),
        OP_JSR => Instr::Jsr(operand),
        OP_RTS if operand == 0 => Instr::Rts,
        OP_WAITX => Instr::WaitX(operand & 0xffff),
        OP_WAITY => Instr::WaitY(operand & 0xffff),
        OP_SETPAL => Instr::SetPal {
            first: (operand >> 8) & 0xff,
            count: (operand & 0xff) + 1,
        },
        _ => Instr::Invalid(word),
    }
}

/// Iterator over the instructions of a program, yielding each with its word
/// index. Palette payload words are skipped.
pub struct Instructions<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> Instructions<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Instructions { words, pos: 0 }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = (usize, Instr);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.pos;
        let instr = decode(*self.words.get(pos)?);
        self.pos += 1;
        if let Instr::SetPal { count, .. } = instr {
            self.pos += count as usize;
        }
        Some((pos, instr))
    }
}

/// Index of a word written by a `Writer`, for patching it later.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot(pub usize);

/// Append cursor for building a program in a caller-provided buffer.
///
/// Appending past the end of the buffer is a programming error and panics;
/// size the buffer first (`scanout::Scanout::program_len` does this for the
/// common case).
pub struct Writer<'a> {
    buf: &'a mut [u32],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u32]) -> Self {
        Writer { buf, pos: 0 }
    }

    /// Number of words written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Appends a raw word.
    ///
    /// # Panics
    ///
    /// If the buffer is full.
    pub fn push(&mut self, word: u32) -> Slot {
        assert!(
            self.pos < self.buf.len(),
            "VCP program overflows {}-word buffer",
            self.buf.len()
        );
        self.buf[self.pos] = word;
        self.pos += 1;
        Slot(self.pos - 1)
    }

    pub fn wait_y(&mut self, y: u32) -> Slot {
        self.push(emit_wait_y(y))
    }

    pub fn set_register(&mut self, reg: Vcr, value: u32) -> Slot {
        self.push(emit_set_register(reg, value))
    }

    /// Appends a `SETPAL` loading `colors` starting at entry `first`. Returns
    /// the slot of the first color word.
    pub fn set_palette(&mut self, first: u32, colors: &[u32]) -> Slot {
        let slot = self.reserve_palette(first, colors.len() as u32);
        self.buf[slot.0..slot.0 + colors.len()].copy_from_slice(colors);
        slot
    }

    /// Appends a `SETPAL` for `count` entries with all colors zero, to be
    /// filled in later. Returns the slot of the first color word.
    pub fn reserve_palette(&mut self, first: u32, count: u32) -> Slot {
        self.push(emit_set_palette(first, count));
        let slot = Slot(self.pos);
        for _ in 0..count {
            self.push(0);
        }
        slot
    }

    /// Appends the terminating wait.
    pub fn wait_forever(&mut self) -> Slot {
        self.wait_y(WAIT_FOREVER)
    }

    /// Overwrites a previously written word.
    pub fn patch(&mut self, slot: Slot, word: u32) {
        assert!(slot.0 < self.pos, "slot {} not yet written", slot.0);
        self.buf[slot.0] = word;
    }

    /// The words written so far.
    pub fn words(&self) -> &[u32] {
        &self.buf[..self.pos]
    }
}

/// Display layers, each with a fixed program entry point in video RAM.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Layer {
    One,
    Two,
}

impl Layer {
    /// CPU address of the word the VCP starts executing for this layer.
    pub fn entry_addr(self) -> u32 {
        match self {
            Layer::One => VRAM_START + 0x10,
            Layer::Two => VRAM_START + 0x20,
        }
    }
}

/// Points `layer` at the program in `program`, or turns the layer off with
/// `None`.
///
/// Turning a layer off writes an idle program into the entry point itself:
/// palette entry 0 set to transparent, then wait forever. This takes three
/// words, which fit before the next layer's entry.
///
/// The switch takes effect at the start of a frame; callers replacing a
/// program that's on screen should wait for vertical blank before freeing or
/// rewriting the old one.
pub fn set_program(
    vmem: &mut VideoMemory,
    layer: Layer,
    program: Option<Region>,
) {
    let entry = layer.entry_addr();
    match program {
        Some(region) => {
            debug!("{:?} -> VCP program at {:#010x}", layer, region.base());
            vmem.write_word(entry, emit_jmp(region.vcp_addr()));
        }
        None => {
            debug!("{:?} off", layer);
            vmem.write_word(entry, emit_set_palette(0, 1));
            vmem.write_word(entry + 4, 0);
            vmem.write_word(entry + 8, emit_wait_y(WAIT_FOREVER));
        }
    }
}
