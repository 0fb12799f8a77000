//! Asynchronous frame capture and export.
//!
//! The render thread copies a finished frame into the readback ring and
//! hands an [`ExportJob`] to a small worker pool; workers encode and write
//! the file, then drop the job, which unmaps the ring slot and releases the
//! job's reference to the source image. Failures stay on the worker side:
//! they are logged, counted and the frame is dropped.

mod encode;
mod pool;
mod ring;

pub use encode::{FrameEncoder, PngFrameEncoder};
pub use pool::WorkerPool;
pub use ring::{ReadbackRing, ReadbackSlot, SlotLease};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CaptureSettings;
use crate::util::{ColorImage, Error, Result};

/// One captured frame on its way to disk.
#[derive(Debug)]
pub struct ExportJob {
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    /// Keeps the captured image alive until the job is done.
    pub source: Arc<ColorImage>,
    /// Mapped readback slot holding the staged pixels.
    pub staging: SlotLease,
    pub encoded: Vec<u8>,
    pub processed: bool,
    pub path: PathBuf,
}

/// Export counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub submitted: u64,
    pub written: u64,
    pub failed: u64,
    pub bytes_written: u64,
    /// Total time the render thread waited on busy ring slots.
    pub stall: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
    bytes_written: AtomicU64,
    stall_nanos: AtomicU64,
    in_flight: AtomicUsize,
}

/// Non-blocking capture of finished frames to numbered image files.
pub struct AsyncCaptureExport {
    settings: CaptureSettings,
    width: u32,
    height: u32,
    extension: String,
    ring: ReadbackRing,
    pool: WorkerPool<ExportJob>,
    counters: Arc<Counters>,
}

impl AsyncCaptureExport {
    /// PNG export into `settings.output_dir`, created if missing.
    pub fn new(settings: CaptureSettings, width: u32, height: u32) -> Result<Self> {
        Self::with_encoder(settings, width, height, Arc::new(PngFrameEncoder))
    }

    pub fn with_encoder(
        settings: CaptureSettings,
        width: u32,
        height: u32,
        encoder: Arc<dyn FrameEncoder>,
    ) -> Result<Self> {
        if let Err(e) = std::fs::create_dir_all(&settings.output_dir) {
            tracing::error!(dir = %settings.output_dir.display(), error = %e, "cannot create capture directory");
            return Err(Error::OutputDir(settings.output_dir.clone()));
        }

        let ring_size = settings.ring_size.max(1);
        let counters = Arc::new(Counters::default());
        let extension = encoder.extension().to_string();
        let pool = {
            let counters = Arc::clone(&counters);
            WorkerPool::spawn("capture", settings.workers, ring_size, move |job: ExportJob| {
                export_job(job, encoder.as_ref(), &counters);
            })
            .inspect_err(|e| tracing::error!(error = %e, "capture pool startup failed"))?
        };

        tracing::info!(
            dir = %settings.output_dir.display(),
            ring = ring_size,
            workers = pool.workers(),
            "capture export ready"
        );
        Ok(Self {
            width,
            height,
            extension,
            ring: ReadbackRing::new(ring_size),
            pool,
            counters,
            settings,
        })
    }

    /// Ring slot that `frame_index` copies into.
    pub fn slot_index(&self, frame_index: u64) -> usize {
        self.ring.slot_for(frame_index).index()
    }

    /// Output path for a frame, e.g. `frames/output_003.png`.
    pub fn file_path(&self, frame_index: u64) -> PathBuf {
        self.settings.output_dir.join(format!(
            "{}_{:0width$}.{}",
            self.settings.file_prefix,
            frame_index,
            self.extension,
            width = self.settings.index_digits
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    /// Stage `source` and queue it for export.
    ///
    /// Returns as soon as the pixels are staged. Blocks only while the ring
    /// slot for this frame is still mapped by an earlier export.
    pub fn capture(&self, source: &Arc<ColorImage>, frame_index: u64) -> Result<()> {
        source.expect_dimensions((self.width, self.height))?;
        if !self.pool.is_running() {
            return Err(Error::ShuttingDown);
        }

        let (staging, waited) = self.ring.slot_for(frame_index).copy_from(source, frame_index);
        if waited > Duration::from_millis(1) {
            tracing::debug!(frame_index, slot = staging.slot_index(), ?waited, "waited on readback slot");
        }
        self.counters.stall_nanos.fetch_add(waited.as_nanos() as u64, Ordering::Relaxed);

        let job = ExportJob {
            frame_index,
            width: self.width,
            height: self.height,
            source: Arc::clone(source),
            staging,
            encoded: Vec::new(),
            processed: false,
            path: self.file_path(frame_index),
        };
        self.counters.in_flight.fetch_add(1, Ordering::AcqRel);
        match self.pool.submit(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CaptureStats {
        let c = &self.counters;
        CaptureStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            written: c.written.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            bytes_written: c.bytes_written.load(Ordering::Relaxed),
            stall: Duration::from_nanos(c.stall_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Stop accepting frames and wait for every queued export to finish.
    pub fn shutdown(&mut self) -> CaptureStats {
        self.pool.shutdown();
        let stats = self.stats();
        tracing::info!(
            written = stats.written,
            failed = stats.failed,
            bytes = stats.bytes_written,
            "capture export drained"
        );
        stats
    }
}

/// Settles one in-flight job. Counts it as failed unless marked done,
/// which also covers a panicking encoder.
struct JobGuard<'a> {
    counters: &'a Counters,
    frame_index: u64,
    done: bool,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            if std::thread::panicking() {
                tracing::error!(frame = self.frame_index, "frame export panicked");
            }
        }
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Worker side: encode, write, then drop the job (unmap + release source).
fn export_job(job: ExportJob, encoder: &dyn FrameEncoder, counters: &Counters) {
    let mut guard = JobGuard { counters, frame_index: job.frame_index, done: false };
    // Declared after the guard so an unwinding job still unmaps its slot first.
    let mut job = job;
    let _span = tracing::debug_span!("export", frame = job.frame_index).entered();
    match write_job(&mut job, encoder) {
        Ok(()) => {
            counters.written.fetch_add(1, Ordering::Relaxed);
            counters.bytes_written.fetch_add(job.encoded.len() as u64, Ordering::Relaxed);
            tracing::trace!(path = %job.path.display(), bytes = job.encoded.len(), "frame written");
            guard.done = true;
        }
        Err(e) => {
            tracing::error!(frame = job.frame_index, path = %job.path.display(), error = %e, "frame export dropped");
        }
    }
    drop(job);
}

fn write_job(job: &mut ExportJob, encoder: &dyn FrameEncoder) -> Result<()> {
    let ExportJob { staging, encoded, width, height, .. } = job;
    staging.read(|pixels, w, h| {
        if (w, h) != (*width, *height) {
            return Err(Error::DimensionMismatch { expected: (*width, *height), actual: (w, h) });
        }
        encoder.encode(pixels, w, h, encoded)
    })?;
    std::fs::write(&job.path, &job.encoded)?;
    job.processed = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn settings(dir: &Path) -> CaptureSettings {
        CaptureSettings { output_dir: dir.to_path_buf(), ..Default::default() }
    }

    #[test]
    fn test_file_names_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let export = AsyncCaptureExport::new(settings(dir.path()), 4, 4).unwrap();
        assert_eq!(export.file_path(3), dir.path().join("output_003.png"));
        assert_eq!(export.file_path(1234), dir.path().join("output_1234.png"));
        assert_eq!(export.slot_index(4), 1);
    }

    #[test]
    fn test_capture_writes_png_and_releases_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut export = AsyncCaptureExport::new(settings(dir.path()), 4, 2).unwrap();
        let image = Arc::new(ColorImage::filled(4, 2, Vec4::new(1.0, 0.5, 0.0, 1.0)));
        for f in 0..5 {
            export.capture(&image, f).unwrap();
        }
        let stats = export.shutdown();
        assert_eq!(stats.submitted, 5);
        assert_eq!(stats.written, 5);
        assert_eq!(stats.failed, 0);
        assert_eq!(Arc::strong_count(&image), 1);

        let decoded = image::open(dir.path().join("output_004.png")).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 188, 0, 255]);
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let export = AsyncCaptureExport::new(settings(dir.path()), 4, 4).unwrap();
        let image = Arc::new(ColorImage::new(2, 2));
        assert!(matches!(export.capture(&image, 0), Err(Error::DimensionMismatch { .. })));
        assert_eq!(export.stats().submitted, 0);
    }

    #[test]
    fn test_capture_after_shutdown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut export = AsyncCaptureExport::new(settings(dir.path()), 2, 2).unwrap();
        export.shutdown();
        let image = Arc::new(ColorImage::new(2, 2));
        assert!(matches!(export.capture(&image, 0), Err(Error::ShuttingDown)));
    }
}
