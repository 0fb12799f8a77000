//! Ring of CPU-visible readback slots.
//!
//! Frame `f` copies into slot `f % len`. A slot stays mapped from the copy
//! until the export job holding its [`SlotLease`] is dropped; a copy into a
//! mapped slot blocks until then. That wait is the only backpressure on the
//! render thread.

use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::util::{to_rgba8, ColorImage};

#[derive(Debug, Default)]
struct SlotState {
    mapped: bool,
    frame: Option<u64>,
    width: u32,
    height: u32,
    /// sRGB RGBA8 staging pixels.
    pixels: Vec<u8>,
}

/// One readback buffer.
#[derive(Debug)]
pub struct ReadbackSlot {
    index: usize,
    state: Mutex<SlotState>,
    idle: Condvar,
}

impl ReadbackSlot {
    fn new(index: usize) -> Self {
        Self { index, state: Mutex::new(SlotState::default()), idle: Condvar::new() }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_mapped(&self) -> bool {
        self.state.lock().mapped
    }

    /// Frame last copied into this slot.
    pub fn frame(&self) -> Option<u64> {
        self.state.lock().frame
    }

    /// Wait until the slot is unmapped, copy `source` into it and map it.
    ///
    /// Returns the lease that unmaps on drop and the time spent waiting.
    pub fn copy_from(self: &Arc<Self>, source: &ColorImage, frame: u64) -> (SlotLease, Duration) {
        let start = Instant::now();
        let mut state = self.state.lock();
        while state.mapped {
            self.idle.wait(&mut state);
        }
        let waited = start.elapsed();

        let (width, height) = source.dimensions();
        state.pixels.resize(width as usize * height as usize * 4, 0);
        state
            .pixels
            .par_chunks_mut(4)
            .zip(source.pixels().par_iter())
            .for_each(|(dst, c)| dst.copy_from_slice(&to_rgba8(*c)));
        state.width = width;
        state.height = height;
        state.frame = Some(frame);
        state.mapped = true;

        (SlotLease { slot: Arc::clone(self) }, waited)
    }

    fn unmap(&self) {
        let mut state = self.state.lock();
        state.mapped = false;
        drop(state);
        self.idle.notify_all();
    }
}

/// Mapped access to a slot; unmaps when dropped.
#[derive(Debug)]
pub struct SlotLease {
    slot: Arc<ReadbackSlot>,
}

impl SlotLease {
    pub fn slot_index(&self) -> usize {
        self.slot.index
    }

    /// Run `f` over the staged RGBA8 pixels and their dimensions.
    pub fn read<R>(&self, f: impl FnOnce(&[u8], u32, u32) -> R) -> R {
        let state = self.slot.state.lock();
        f(&state.pixels, state.width, state.height)
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slot.unmap();
    }
}

/// Fixed ring of readback slots.
#[derive(Debug)]
pub struct ReadbackRing {
    slots: Vec<Arc<ReadbackSlot>>,
}

impl ReadbackRing {
    pub fn new(len: usize) -> Self {
        Self { slots: (0..len.max(1)).map(|i| Arc::new(ReadbackSlot::new(i))).collect() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot used by `frame`.
    pub fn slot_for(&self, frame: u64) -> &Arc<ReadbackSlot> {
        &self.slots[(frame % self.slots.len() as u64) as usize]
    }

    pub fn mapped_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_mapped()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_frames_map_round_robin() {
        let ring = ReadbackRing::new(3);
        assert_eq!(ring.slot_for(0).index(), 0);
        assert_eq!(ring.slot_for(4).index(), 1);
        assert_eq!(ring.slot_for(5).index(), 2);
    }

    #[test]
    fn test_copy_converts_to_rgba8() {
        let ring = ReadbackRing::new(1);
        let img = ColorImage::filled(2, 1, Vec4::new(1.0, 0.0, 1.0, 7.0));
        let (lease, _) = ring.slot_for(0).copy_from(&img, 0);
        assert!(ring.slot_for(0).is_mapped());
        lease.read(|px, w, h| {
            assert_eq!((w, h), (2, 1));
            assert_eq!(px, &[255, 0, 255, 255, 255, 0, 255, 255]);
        });
        drop(lease);
        assert!(!ring.slot_for(0).is_mapped());
        assert_eq!(ring.slot_for(0).frame(), Some(0));
    }

    #[test]
    fn test_copy_waits_for_unmap() {
        let ring = ReadbackRing::new(1);
        let slot = Arc::clone(ring.slot_for(0));
        let img = ColorImage::new(4, 4);
        let (lease, _) = slot.copy_from(&img, 0);

        let copied = Arc::new(AtomicBool::new(false));
        let waiter = {
            let slot = Arc::clone(&slot);
            let copied = Arc::clone(&copied);
            let img = img.clone();
            thread::spawn(move || {
                let (lease, waited) = slot.copy_from(&img, 1);
                copied.store(true, Ordering::SeqCst);
                drop(lease);
                waited
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!copied.load(Ordering::SeqCst));
        drop(lease);
        let waited = waiter.join().unwrap();
        assert!(copied.load(Ordering::SeqCst));
        assert!(waited >= Duration::from_millis(40));
    }
}
