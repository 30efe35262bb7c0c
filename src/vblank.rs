//! Synchronization with vertical blank.
//!
//! The hardware bumps `VIDFRAMENO` once per frame, as the raster leaves the
//! visible area. Polling it is the only way to wait for anything on this
//! machine, and it doubles as the clock for animation.

use crate::mmio::Mmio;

/// Busy-waits for the frame counter to change, and returns its new value.
///
/// Because this waits for the *change*, calling it anywhere in a frame waits
/// until the start of the next vertical blank. The usual pattern is:
///
/// ```ignore
/// loop {
///     wait_vblank(&mmio);
///     update_palettes_and_offsets();
///     draw_some_pixels();
/// }
/// ```
pub fn wait_vblank(mmio: &impl Mmio) -> u32 {
    let old = mmio.frame_no();
    loop {
        let now = mmio.frame_no();
        if now != old {
            return now;
        }
        core::hint::spin_loop();
    }
}

/// Frames a blink phase lasts, by default.
pub const BLINK_INTERVAL: u32 = 32;

/// Frame-counting clock built on `wait_vblank`.
///
/// Tracks elapsed frames, including frames missed because the caller took too
/// long between waits, and a blink phase for cursors and the like: visible for
/// `blink_interval` frames, then hidden for as many.
#[derive(Copy, Clone, Debug)]
pub struct FrameClock {
    frame_no: u32,
    blink_count: u32,
    blink_interval: u32,
}

impl FrameClock {
    /// Starts a clock at the current frame.
    pub fn new(mmio: &impl Mmio) -> Self {
        Self::starting_at(mmio.frame_no(), BLINK_INTERVAL)
    }

    /// Starts a clock at frame `frame_no`.
    ///
    /// # Panics
    ///
    /// If `blink_interval` is zero.
    pub fn starting_at(frame_no: u32, blink_interval: u32) -> Self {
        assert!(blink_interval > 0, "blink interval must be nonzero");
        FrameClock {
            frame_no,
            blink_count: 0,
            blink_interval,
        }
    }

    /// Waits for the next vertical blank and advances the clock. Returns the
    /// number of frames elapsed since the last tick, which is more than one if
    /// frames were missed.
    pub fn tick(&mut self, mmio: &impl Mmio) -> u32 {
        let now = wait_vblank(mmio);
        self.advance_to(now)
    }

    /// Advances the clock to frame `frame_no` without waiting. Returns the
    /// number of frames elapsed.
    pub fn advance_to(&mut self, frame_no: u32) -> u32 {
        let elapsed = frame_no.wrapping_sub(self.frame_no);
        let period = 2 * self.blink_interval;
        let count = u64::from(self.blink_count) + u64::from(elapsed);
        self.blink_count = (count % u64::from(period)) as u32;
        self.frame_no = frame_no;
        elapsed
    }

    /// The frame number at the last tick.
    pub fn frame_no(&self) -> u32 {
        self.frame_no
    }

    /// Whether blinking things should be shown this frame.
    pub fn blink_on(&self) -> bool {
        self.blink_count < self.blink_interval
    }

    /// Restarts the blink phase in the visible state, e.g. after the cursor
    /// moves.
    pub fn reset_blink(&mut self) {
        self.blink_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::{FakeMmio, Reg};

    #[test]
    fn wait_returns_next_frame() {
        let m = FakeMmio::new(0).advance_every(5);
        m.write(Reg::VidFrameNo, 41);
        assert_eq!(wait_vblank(&m), 42);
        assert_eq!(wait_vblank(&m), 43);
    }

    #[test]
    fn wait_across_wrap() {
        let m = FakeMmio::new(0).advance_every(2);
        m.write(Reg::VidFrameNo, u32::MAX);
        assert_eq!(wait_vblank(&m), 0);
    }

    #[test]
    fn clock_counts_elapsed_frames() {
        let m = FakeMmio::new(0).advance_every(2);
        let mut clock = FrameClock::new(&m);
        let elapsed = clock.tick(&m);
        assert!(elapsed >= 1);
        assert_eq!(clock.frame_no(), elapsed);

        // Missed frames are reported.
        assert_eq!(clock.advance_to(clock.frame_no() + 4), 4);
        // Elapsed frames survive counter wrap.
        let mut clock = FrameClock::starting_at(u32::MAX - 1, 4);
        assert_eq!(clock.advance_to(2), 4);
    }

    #[test]
    fn blink_phase() {
        let mut clock = FrameClock::starting_at(100, 3);
        let mut seen = vec![];
        for f in 101..=110 {
            clock.advance_to(f);
            seen.push(clock.blink_on());
        }
        assert_eq!(
            seen,
            [true, true, false, false, false, true, true, true, false, false]
        );

        clock.reset_blink();
        assert!(clock.blink_on());
        // A long stall lands in the right phase.
        clock.advance_to(110 + 6 * 1000 + 4);
        assert!(!clock.blink_on());
    }
}
