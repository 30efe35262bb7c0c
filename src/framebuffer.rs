//! Framebuffers: a bitmap in video RAM plus the VCP program that shows it.
//!
//! A framebuffer takes two allocations from the LIFO allocator, pixels first
//! and then the program. Like any other allocation, anything allocated after
//! it must be freed before it can be destroyed.

use crate::mmio::ScreenConfig;
use crate::vcp::scanout::Scanout;
use crate::vcp::{self, Layer, Slot, Writer};
use crate::vmem::{AllocError, Region, VideoMemory};
use gfx::{Bitmap, BitmapError, ColorMode};
use log::{debug, warn};

/// A bitmap in video RAM, scaled to fill the width of the screen.
///
/// The handle is not `Copy`: `destroy` consumes it, so a framebuffer can't be
/// drawn into after its memory is released.
#[derive(Debug, Eq, PartialEq)]
pub struct Framebuffer {
    mode: ColorMode,
    width: usize,
    height: usize,
    stride: usize,
    pixels: Region,
    program: Region,
    palette: Option<Slot>,
}

impl Framebuffer {
    /// Allocates a `width` x `height` framebuffer and builds its program.
    ///
    /// The image is stretched horizontally to the screen width and vertically
    /// by the same factor, and centered vertically. Palette modes get a
    /// palette block inside the program, initially all zero (transparent
    /// black); see `palette_mut`.
    ///
    /// If either allocation fails, `vmem` is left as it was.
    ///
    /// # Panics
    ///
    /// If `width`, `height` or `screen.native_width` is zero.
    pub fn create(
        vmem: &mut VideoMemory,
        width: usize,
        height: usize,
        mode: ColorMode,
        screen: &ScreenConfig,
    ) -> Result<Self, AllocError> {
        assert!(width > 0 && height > 0, "empty framebuffer");
        assert!(screen.native_width > 0, "screen has zero width");

        let stride = mode.min_stride(width);
        let pixel_bytes = stride as u64 * height as u64;
        if pixel_bytes > u64::from(u32::MAX) {
            return Err(AllocError::OutOfMemory {
                requested: u32::MAX,
                available: vmem.query_free(),
            });
        }
        let pixels = vmem.alloc(pixel_bytes as u32)?;

        // Give the pixels back if anything below fails.
        let mut vmem = scopeguard::guard(vmem, |vm| {
            if let Err(e) = vm.free(pixels) {
                warn!("framebuffer rollback failed: {}", e);
            }
        });

        // Each row covers native_width / width scanlines, kept as a ratio so
        // rounding doesn't accumulate down the screen.
        let native_width = u64::from(screen.native_width);
        let lines = (height as u64 * native_width / width as u64) as u32;
        let scanout = Scanout {
            mode,
            xincr: (0x1_0000 * width as u64 / native_width) as u32,
            palette_len: mode.palette_len() as u32,
            first_line: screen.native_height.saturating_sub(lines) / 2,
            scale_num: screen.native_width,
            scale_den: width as u32,
            rows: height as u32,
            stride_words: (stride / 4) as u32,
            hstop: screen.native_width,
            ..Scanout::default()
        };
        let program = vmem.alloc(4 * scanout.program_len() as u32)?;
        let slots = {
            let mut w = Writer::new(vmem.words_mut(program));
            scanout.emit(&mut w, pixels.vcp_addr())
        };
        scopeguard::ScopeGuard::into_inner(vmem);

        debug!(
            "framebuffer {}x{} {:?} at {:#010x}, program at {:#010x}",
            width,
            height,
            mode,
            pixels.base(),
            program.base()
        );
        Ok(Framebuffer {
            mode,
            width,
            height,
            stride,
            pixels,
            program,
            palette: slots.palette,
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

    pub fn pixels(&self) -> Region {
        self.pixels
    }

    pub fn program(&self) -> Region {
        self.program
    }

    /// Displays this framebuffer on `layer`, from the next frame on.
    pub fn show(&self, vmem: &mut VideoMemory, layer: Layer) {
        vcp::set_program(vmem, layer, Some(self.program))
    }

    /// A bitmap view of the pixels, for drawing.
    ///
    /// This fails only if `vmem` is not the memory the framebuffer was created
    /// in (or its pixels were freed), which typically panics first.
    pub fn bitmap<'v>(
        &self,
        vmem: &'v mut VideoMemory,
    ) -> Result<Bitmap<'v>, BitmapError> {
        Bitmap::new(
            vmem.words_mut(self.pixels),
            self.width,
            self.height,
            self.stride,
            self.mode,
        )
    }

    /// The palette entries loaded by the program, as `0xAABBGGRR` words. Empty
    /// for the direct color modes.
    ///
    /// Entries may be changed at any time; changes are picked up on the next
    /// frame.
    pub fn palette_mut<'v>(&self, vmem: &'v mut VideoMemory) -> &'v mut [u32] {
        let words = vmem.words_mut(self.program);
        match self.palette {
            Some(Slot(first)) => {
                &mut words[first..first + self.mode.palette_len()]
            }
            None => &mut [],
        }
    }

    /// Frees the framebuffer's memory. It must be the most recent allocation
    /// in `vmem`, and should no longer be shown on any layer.
    ///
    /// If the program can't be freed, nothing is, and the framebuffer is
    /// handed back with the error.
    pub fn destroy(
        self,
        vmem: &mut VideoMemory,
    ) -> Result<(), (Framebuffer, AllocError)> {
        if let Err(e) = vmem.free(self.program) {
            return Err((self, e));
        }
        vmem.free(self.pixels).map_err(|e| (self, e))
    }
}
