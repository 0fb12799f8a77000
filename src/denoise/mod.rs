//! Temporal denoise chain.
//!
//! Turns the noisy per-frame radiance into a stable image:
//!
//! ```text
//! Tonemap -> PreBlur(H,V) -> TemporalAccumulation -> SpatialBlur(H,V)
//!         -> PostBlur(H,V) -> TemporalStabilization -> TAAResolve
//! ```
//!
//! Blur stages are separable and edge-aware ([`blur`]); the reprojection
//! stages ([`temporal`], [`taa`]) blend with the previous frame's history
//! and become exact pass-throughs when the frame resets history.

pub mod blur;
mod chain;
mod gbuffer;
pub mod taa;
pub mod temporal;
pub mod tonemap;

pub use chain::TemporalDenoiseChain;
pub use gbuffer::GBuffer;
