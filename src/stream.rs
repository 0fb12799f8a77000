//! Ordered per-frame command stream.
//!
//! Stages never run out of order: each [`CommandStream::dispatch`] executes
//! its kernel immediately and appends a [`Dispatch`] record naming the
//! resources it read and wrote. A later dispatch therefore always observes
//! the complete output of an earlier one, and the record doubles as the
//! frame's execution trace.

use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// Kernel launched by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PrimaryVisibility,
    PhotonCull,
    PhotonGenerate,
    PhotonIndexBuild,
    PhotonCollect,
    PhotonUpdateRadius,
    Tonemap,
    PreBlurH,
    PreBlurV,
    TemporalAccumulation,
    SpatialBlurH,
    SpatialBlurV,
    PostBlurH,
    PostBlurV,
    TemporalStabilization,
    TaaResolve,
    CaptureCopy,
}

/// Opaque handle of a stage resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    RawRadiance,
    GBuffer,
    Visibility,
    WorkList,
    GlobalPhotons,
    CausticPhotons,
    GlobalIndex,
    CausticIndex,
    Radius,
    Indirect,
    Tonemapped,
    /// Intermediate image between the two passes of a separable blur.
    BlurScratch,
    Denoised,
    Accumulation(usize),
    Stabilization(usize),
    FinalColor(usize),
    Readback(usize),
}

/// One recorded kernel launch.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub stage: Stage,
    pub reads: SmallVec<[ResourceId; 4]>,
    pub writes: SmallVec<[ResourceId; 2]>,
    pub elapsed: Duration,
}

/// Linear list of dispatches for one frame.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    frame_index: u64,
    dispatches: Vec<Dispatch>,
}

impl CommandStream {
    pub fn begin(frame_index: u64) -> Self {
        Self {
            frame_index,
            dispatches: Vec::with_capacity(24),
        }
    }

    /// Execute `kernel` and record it after all previously recorded work.
    pub fn dispatch<R>(
        &mut self,
        stage: Stage,
        reads: &[ResourceId],
        writes: &[ResourceId],
        kernel: impl FnOnce() -> R,
    ) -> R {
        let _span = tracing::trace_span!("dispatch", ?stage, frame = self.frame_index).entered();
        let start = Instant::now();
        let out = kernel();
        self.dispatches.push(Dispatch {
            stage,
            reads: reads.iter().copied().collect(),
            writes: writes.iter().copied().collect(),
            elapsed: start.elapsed(),
        });
        out
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn dispatches(&self) -> &[Dispatch] {
        &self.dispatches
    }

    /// Stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.dispatches.iter().map(|d| d.stage)
    }

    /// Dispatches that wrote `resource`.
    pub fn writers_of(&self, resource: ResourceId) -> impl Iterator<Item = &Dispatch> + '_ {
        self.dispatches
            .iter()
            .filter(move |d| d.writes.contains(&resource))
    }

    /// True when every history slot written this frame has a single writer.
    pub fn history_single_writer(&self) -> bool {
        let mut seen: SmallVec<[ResourceId; 8]> = SmallVec::new();
        for d in &self.dispatches {
            for &w in &d.writes {
                let is_history = matches!(
                    w,
                    ResourceId::Accumulation(_) | ResourceId::Stabilization(_) | ResourceId::FinalColor(_)
                );
                if is_history {
                    if seen.contains(&w) {
                        return false;
                    }
                    seen.push(w);
                }
            }
        }
        true
    }

    /// Sum of kernel time recorded this frame.
    pub fn total_time(&self) -> Duration {
        self.dispatches.iter().map(|d| d.elapsed).sum()
    }
}
