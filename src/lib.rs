//! Board support for the MC1 computer's video hardware.
//!
//! The MC1 has no framebuffer in the usual sense. Instead, a video control
//! processor (VCP) replays a small program out of video RAM once per frame,
//! waiting for scanlines and loading registers that tell the pixel pipeline
//! where to fetch from and how to decode it. This crate provides:
//!
//! - A LIFO allocator for video RAM (`vmem`).
//! - An encoder for VCP programs, and the scanout pattern that nearly every
//!   program follows (`vcp`).
//! - Synchronization with the vertical blanking interval (`vblank`).
//! - Framebuffers tying the above together with the pixel engine from the
//!   `gfx` crate (`framebuffer`).
//!
//! Hardware access goes through the `mmio::Mmio` trait, so everything other
//! than the actual register block can be exercised on the host.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod framebuffer;
pub mod measurement;
pub mod mmio;
pub mod vblank;
pub mod vcp;
pub mod vmem;

pub use gfx::{Bitmap, BitmapError, ColorMode};

/// Start of boot ROM in the CPU address space.
pub const ROM_START: u32 = 0x0000_0000;

/// Start of video RAM in the CPU address space. The VCP addresses the same
/// memory in words, counting from here.
pub const VRAM_START: u32 = 0x4000_0000;

/// Start of extended RAM in the CPU address space.
pub const XRAM_START: u32 = 0x8000_0000;
