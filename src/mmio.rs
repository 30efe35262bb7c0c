//! Memory-mapped I/O registers.
//!
//! The MC1 exposes a block of 32-bit registers at `MMIO_BASE`. Code in this
//! crate accesses them through the `Mmio` trait rather than raw pointers, so
//! that the same logic runs against real hardware (`Hardware`, target only) or
//! an in-memory register file (`FakeMmio`, host only).

use smart_default::SmartDefault;

/// Base address of the MMIO register block.
pub const MMIO_BASE: u32 = 0xC000_0000;

/// Base address of the keyboard event ring buffer.
pub const KEYBUF_BASE: u32 = 0xC000_0080;

/// Number of entries in the keyboard event ring buffer.
pub const KEYBUF_SIZE: usize = 16;

/// Number of registers in the MMIO block.
pub const REG_COUNT: usize = 27;

/// MMIO registers, in address order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Reg {
    /// CPU clock cycle counter, low word.
    ClkCntLo = 0,
    /// CPU clock cycle counter, high word.
    ClkCntHi,
    /// CPU clock frequency in Hz.
    CpuClk,
    /// Size of video RAM in bytes.
    VramSize,
    /// Size of extended RAM in bytes.
    XramSize,
    /// Native video output width in pixels.
    VidWidth,
    /// Native video output height in pixels.
    VidHeight,
    /// Refresh rate, frames per second in 16.16 fixed point.
    VidFps,
    /// Frame counter, incremented once per vertical blank.
    VidFrameNo,
    /// Current raster line.
    VidY,
    Switches,
    Buttons,
    /// Write index into the keyboard event buffer.
    KeyPtr,
    MousePos,
    MouseBtns,
    SdIn,
    SegDisp0,
    SegDisp1,
    SegDisp2,
    SegDisp3,
    SegDisp4,
    SegDisp5,
    SegDisp6,
    SegDisp7,
    Leds,
    SdOut,
    SdWe,
}

impl Reg {
    /// Seven-segment digit registers, least significant digit first.
    pub const SEGDISP: [Reg; 8] = [
        Reg::SegDisp0,
        Reg::SegDisp1,
        Reg::SegDisp2,
        Reg::SegDisp3,
        Reg::SegDisp4,
        Reg::SegDisp5,
        Reg::SegDisp6,
        Reg::SegDisp7,
    ];

    /// Index of the register within the block.
    pub fn index(self) -> usize {
        self as usize
    }

    /// CPU address of the register.
    pub fn addr(self) -> u32 {
        MMIO_BASE + 4 * self as u32
    }
}

/// Access to the MMIO register block.
///
/// Registers are shared with hardware, so both reads and writes take `&self`.
pub trait Mmio {
    fn read(&self, reg: Reg) -> u32;
    fn write(&self, reg: Reg, value: u32);

    /// Number of frames displayed since reset. Wraps.
    fn frame_no(&self) -> u32 {
        self.read(Reg::VidFrameNo)
    }

    /// The scanline currently being displayed.
    fn raster_line(&self) -> u32 {
        self.read(Reg::VidY)
    }

    /// Native output resolution as `(width, height)`.
    fn video_size(&self) -> (u32, u32) {
        (self.read(Reg::VidWidth), self.read(Reg::VidHeight))
    }

    fn vram_size(&self) -> u32 {
        self.read(Reg::VramSize)
    }

    /// Reads the 64-bit cycle counter.
    ///
    /// The two halves are separate registers, so the high word is re-read
    /// until it is stable across the read of the low word.
    fn clock_cycles(&self) -> u64 {
        let mut hi = self.read(Reg::ClkCntHi);
        loop {
            let lo = self.read(Reg::ClkCntLo);
            let hi_again = self.read(Reg::ClkCntHi);
            if hi_again == hi {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
            hi = hi_again;
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        /// The real register block.
        pub struct Hardware(());

        impl Hardware {
            /// Creates a handle to the MMIO registers.
            ///
            /// # Safety
            ///
            /// This must only be used on an MC1, where the register block is
            /// mapped at `MMIO_BASE`.
            pub unsafe fn new() -> Self {
                Hardware(())
            }
        }

        impl Mmio for Hardware {
            fn read(&self, reg: Reg) -> u32 {
                // Safety: the register block is always mapped, and reads have
                // no side effects.
                unsafe { core::ptr::read_volatile(reg.addr() as *const u32) }
            }

            fn write(&self, reg: Reg, value: u32) {
                // Safety: the register block is always mapped.
                unsafe {
                    core::ptr::write_volatile(reg.addr() as *mut u32, value)
                }
            }
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use self::fake::FakeMmio;

#[cfg(any(test, feature = "std"))]
mod fake {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    /// In-memory register file for running against on the host.
    ///
    /// Every register reads back whatever was last written. To let code that
    /// waits for vertical blank make progress, the frame counter can be made
    /// to advance by itself every so many reads (see `advance_every`).
    #[derive(Debug, Default)]
    pub struct FakeMmio {
        regs: [AtomicU32; REG_COUNT],
        frame_period: AtomicU32,
        polls: AtomicU32,
    }

    impl FakeMmio {
        /// Creates a register file describing a 1920x1080, 60 Hz machine with
        /// `vram_size` bytes of video RAM.
        pub fn new(vram_size: u32) -> Self {
            let m = FakeMmio::default();
            m.write(Reg::VramSize, vram_size);
            m.write(Reg::VidWidth, 1920);
            m.write(Reg::VidHeight, 1080);
            m.write(Reg::VidFps, 60 << 16);
            m.write(Reg::CpuClk, 70_000_000);
            m
        }

        /// Makes `VidFrameNo` advance by one after every `polls` reads of it.
        /// Zero turns auto-advance off.
        pub fn advance_every(self, polls: u32) -> Self {
            self.frame_period.store(polls, Ordering::Relaxed);
            self
        }

        /// Advances the frame counter as the hardware would at vertical blank.
        pub fn next_frame(&self) {
            let r = &self.regs[Reg::VidFrameNo.index()];
            let n = r.load(Ordering::Relaxed).wrapping_add(1);
            r.store(n, Ordering::Relaxed);
            self.regs[Reg::VidY.index()].store(0, Ordering::Relaxed);
        }
    }

    impl Mmio for FakeMmio {
        fn read(&self, reg: Reg) -> u32 {
            if reg == Reg::VidFrameNo {
                let period = self.frame_period.load(Ordering::Relaxed);
                if period != 0 {
                    let polls = self.polls.load(Ordering::Relaxed) + 1;
                    if polls >= period {
                        self.polls.store(0, Ordering::Relaxed);
                        self.next_frame();
                    } else {
                        self.polls.store(polls, Ordering::Relaxed);
                    }
                }
            }
            self.regs[reg.index()].load(Ordering::Relaxed)
        }

        fn write(&self, reg: Reg, value: u32) {
            self.regs[reg.index()].store(value, Ordering::Relaxed)
        }
    }
}

/// Native video output parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq, SmartDefault)]
pub struct ScreenConfig {
    #[default(1920)]
    pub native_width: u32,
    #[default(1080)]
    pub native_height: u32,
    /// Whole frames per second.
    #[default(60)]
    pub fps: u32,
}

impl ScreenConfig {
    /// Reads the output parameters from the video registers. Registers that
    /// read as zero (video not yet running) keep their default values.
    pub fn from_mmio(mmio: &impl Mmio) -> Self {
        let default = ScreenConfig::default();
        let or_default = |v: u32, d: u32| if v == 0 { d } else { v };
        let (w, h) = mmio.video_size();
        ScreenConfig {
            native_width: or_default(w, default.native_width),
            native_height: or_default(h, default.native_height),
            fps: or_default(mmio.read(Reg::VidFps) >> 16, default.fps),
        }
    }
}
