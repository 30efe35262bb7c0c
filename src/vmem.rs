//! Video memory allocation.
//!
//! Video RAM is handed out by a stack-discipline bump allocator: each
//! allocation is placed at the current cursor, and blocks must be freed in
//! exactly the reverse order they were allocated. That's all the machinery
//! needed for the usual pattern of "framebuffer, then VCP program, then maybe
//! another layer", and it keeps the bookkeeping to one word per block.
//!
//! That word is a footer, stored in video RAM immediately after the block,
//! holding the block's start address. `free` checks it to make sure it's
//! being asked to release the block on top of the stack, and refuses (without
//! changing anything) otherwise.

use core::fmt;
use log::{debug, warn};

/// Bytes of bookkeeping stored after each block.
pub const FOOTER_BYTES: u32 = 4;

/// A block of video memory handed out by `VideoMemory::alloc`.
///
/// This is a handle, not a borrow: it stays valid (and refers to the same
/// addresses) until the block is passed to `VideoMemory::free`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    base: u32,
    size: u32,
}

impl Region {
    /// CPU address of the first byte.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size in bytes, rounded up to a whole number of words.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// CPU address one past the last byte.
    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    pub fn word_len(&self) -> usize {
        (self.size / 4) as usize
    }

    /// Address of the first word as seen by the VCP.
    pub fn vcp_addr(&self) -> u32 {
        crate::vcp::to_vcp_addr(self.base)
    }
}

/// Reasons an allocator operation can fail. Failed operations leave the
/// allocator unchanged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocError {
    /// Not enough space left in the window.
    OutOfMemory { requested: u32, available: u32 },
    /// The region is not the most recently allocated live block.
    NotMostRecent { base: u32 },
    /// There are no live blocks to free.
    NothingAllocated,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocError::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "out of video memory: requested {} bytes, {} available",
                requested, available
            ),
            AllocError::NotMostRecent { base } => write!(
                f,
                "block at {:#010x} is not the most recent allocation",
                base
            ),
            AllocError::NothingAllocated => {
                f.write_str("no video memory blocks are allocated")
            }
        }
    }
}

/// Rounds up to a multiple of 4, or `None` on overflow.
fn align4(x: u32) -> Option<u32> {
    Some(x.checked_add(3)? & !3)
}

/// Video RAM and the LIFO allocator that manages part of it.
///
/// The backing store is a word slice standing for the CPU addresses
/// `[base, base + 4 * words.len())`. Allocations come out of the window from
/// `free_start` to the end of the backing store; memory below the window
/// (boot data, fixed VCP entry points) is reachable with `read_word` and
/// `write_word` but never allocated.
pub struct VideoMemory<'a> {
    base: u32,
    words: &'a mut [u32],
    start: u32,
    end: u32,
    next: u32,
}

impl<'a> VideoMemory<'a> {
    /// Creates an allocator over `words`, located at CPU address `base`, with
    /// the allocation window beginning at `free_start`.
    ///
    /// # Panics
    ///
    /// If `base` or `free_start` is not word aligned, if `free_start` lies
    /// outside the backing store, or if the backing store would extend past
    /// the end of the address space.
    pub fn new(base: u32, words: &'a mut [u32], free_start: u32) -> Self {
        assert!(base % 4 == 0, "VRAM base {:#x} is unaligned", base);
        assert!(
            free_start % 4 == 0,
            "free start {:#x} is unaligned",
            free_start
        );
        let end = u64::from(base) + 4 * words.len() as u64;
        assert!(
            end <= u64::from(u32::MAX),
            "VRAM backing store exceeds address space"
        );
        let end = end as u32;
        assert!(
            free_start >= base && free_start <= end,
            "free start {:#x} outside VRAM {:#x}..{:#x}",
            free_start,
            base,
            end
        );
        debug!("vmem window {:#010x}..{:#010x}", free_start, end);
        VideoMemory {
            base,
            words,
            start: free_start,
            end,
            next: free_start,
        }
    }

    /// Allocates `size` bytes, rounded up to a multiple of four.
    ///
    /// The block is placed at the current cursor, which then advances past it
    /// and its footer. On failure nothing changes.
    pub fn alloc(&mut self, size: u32) -> Result<Region, AllocError> {
        let fail = AllocError::OutOfMemory {
            requested: size,
            available: self.query_free(),
        };
        let footer = self
            .next
            .checked_add(size)
            .and_then(align4)
            .ok_or(fail)?;
        let new_next = footer.checked_add(FOOTER_BYTES).ok_or(fail)?;
        if new_next > self.end {
            warn!("{}", fail);
            return Err(fail);
        }

        let region = Region {
            base: self.next,
            size: footer - self.next,
        };
        let i = self.index(footer);
        self.words[i] = region.base;
        self.next = new_next;

        debug!(
            "vmem alloc {:#010x}+{} ({} free)",
            region.base,
            region.size,
            self.query_free()
        );
        Ok(region)
    }

    /// Releases `region`, which must be the most recently allocated block
    /// that's still live.
    pub fn free(&mut self, region: Region) -> Result<(), AllocError> {
        if self.next == self.start {
            warn!("vmem free {:#010x} with nothing allocated", region.base);
            return Err(AllocError::NothingAllocated);
        }

        let top = self.words[self.index(self.next - FOOTER_BYTES)];
        if top != region.base {
            warn!(
                "vmem free {:#010x} out of order (top is {:#010x})",
                region.base, top
            );
            return Err(AllocError::NotMostRecent { base: region.base });
        }

        self.next = top;
        debug!("vmem free {:#010x} ({} free)", top, self.query_free());
        Ok(())
    }

    /// Bytes available to the next allocation, after its footer.
    pub fn query_free(&self) -> u32 {
        (self.end - self.next).saturating_sub(FOOTER_BYTES)
    }

    /// CPU address where the next allocation will start.
    pub fn cursor(&self) -> u32 {
        self.next
    }

    /// Whether any blocks are live.
    pub fn is_empty(&self) -> bool {
        self.next == self.start
    }

    /// The words of a live block.
    ///
    /// # Panics
    ///
    /// If `region` is not a live block. A freed block's handle is rejected
    /// once its space has been handed out again, unless the new block has the
    /// same base and size.
    pub fn words(&self, region: Region) -> &[u32] {
        let r = self.region_range(region);
        &self.words[r]
    }

    /// The words of a live block, for writing.
    ///
    /// # Panics
    ///
    /// If `region` is not a live block. A freed block's handle is rejected
    /// once its space has been handed out again, unless the new block has the
    /// same base and size.
    pub fn words_mut(&mut self, region: Region) -> &mut [u32] {
        let r = self.region_range(region);
        &mut self.words[r]
    }

    /// Reads the word at CPU address `addr`.
    ///
    /// # Panics
    ///
    /// If `addr` is unaligned or outside video RAM.
    pub fn read_word(&self, addr: u32) -> u32 {
        self.words[self.index(addr)]
    }

    /// Writes the word at CPU address `addr`.
    ///
    /// # Panics
    ///
    /// If `addr` is unaligned or outside video RAM.
    pub fn write_word(&mut self, addr: u32, value: u32) {
        let i = self.index(addr);
        self.words[i] = value;
    }

    fn index(&self, addr: u32) -> usize {
        assert!(
            addr % 4 == 0 && addr >= self.base && addr < self.end,
            "address {:#x} is not a word in VRAM",
            addr
        );
        ((addr - self.base) / 4) as usize
    }

    /// Word range of a live block. A live block ends in a footer naming its
    /// base; handles to freed blocks whose space was reused don't.
    fn region_range(&self, region: Region) -> core::ops::Range<usize> {
        let live = region.base >= self.start
            && u64::from(region.base)
                + u64::from(region.size)
                + u64::from(FOOTER_BYTES)
                <= u64::from(self.next)
            && self.words[self.index(region.end())] == region.base;
        assert!(
            live,
            "region {:#x}+{} is not allocated",
            region.base,
            region.size
        );
        let first = ((region.base - self.base) / 4) as usize;
        first..first + region.word_len()
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        extern "C" {
            /// Provided by the linker script: first byte of video RAM not
            /// occupied by the program image.
            static __vram_free_start: u32;
        }

        impl VideoMemory<'static> {
            /// Creates the allocator for the machine's video RAM, with the
            /// window running from the end of the program image to the size
            /// reported by the `VRAMSIZE` register.
            ///
            /// # Safety
            ///
            /// This must be called at most once, and nothing else may access
            /// video RAM above `__vram_free_start` while the result exists.
            pub unsafe fn from_hardware(mmio: &impl crate::mmio::Mmio) -> Self {
                let free_start = &__vram_free_start as *const u32 as u32;
                let size = mmio.vram_size();
                let words = core::slice::from_raw_parts_mut(
                    crate::VRAM_START as *mut u32,
                    (size / 4) as usize,
                );
                VideoMemory::new(crate::VRAM_START, words, free_start)
            }
        }
    }
}
