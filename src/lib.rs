//! # photon-refine
//!
//! Per-frame progressive-refinement core of a path tracer.
//!
//! Each frame the core decides whether accumulated results are still valid,
//! advances a stochastic progressive photon-mapping estimate, runs a fixed
//! chain of temporal and spatial denoise stages and hands the finished frame
//! to a non-blocking export path.
//!
//! ## Modules
//!
//! - [`progressive`] - Reset policy, SPPM radius decay, TAA jitter
//! - [`photon`] - Photon tracing, per-frame BVH index, density estimate
//! - [`denoise`] - Tonemap, edge-aware blurs, reprojection stages, TAA
//! - [`capture`] - Readback ring, worker pool, PNG export
//! - [`renderer`] - Frame orchestration and batch runs
//! - [`frame`] - Per-frame context and ping-pong history slots
//! - [`stream`] - Ordered per-frame command stream
//! - [`scene`] - Read-only scene and camera interfaces, demo scene
//! - [`config`] - Render configuration and settings
//! - [`util`] - Errors, images, color helpers
//!
//! ## Example
//!
//! ```no_run
//! use photon_refine::prelude::*;
//! use photon_refine::scene::demo::{BoxScene, ShotCamera};
//!
//! let settings = RendererSettings::default();
//! let aspect = settings.render.width as f32 / settings.render.height as f32;
//! let mut renderer = ProgressiveRenderer::new(settings)?;
//! let summary = renderer.run(&BoxScene::default(), &ShotCamera::front(aspect))?;
//! println!("{} frames", summary.frames);
//! # Ok::<(), photon_refine::Error>(())
//! ```

pub mod capture;
pub mod config;
pub mod denoise;
pub mod frame;
pub mod photon;
pub mod primary;
pub mod progressive;
pub mod renderer;
pub mod sampling;
pub mod scene;
pub mod stream;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::capture::{AsyncCaptureExport, CaptureStats};
    pub use crate::config::{CaptureSettings, DenoiseSettings, PhotonSettings, RenderConfig, RendererSettings};
    pub use crate::denoise::{GBuffer, TemporalDenoiseChain};
    pub use crate::frame::{FrameContext, FrameState, HistorySlotPair, ResetCause};
    pub use crate::photon::PhotonDensityEstimator;
    pub use crate::progressive::{ProgressiveStateController, RadiusState};
    pub use crate::renderer::{FrameReport, ProgressiveRenderer, RunSummary};
    pub use crate::scene::{CameraFrame, CameraSource, SceneView};
    pub use crate::stream::CommandStream;
    pub use crate::util::{ColorImage, Error, Image, Result};
}
