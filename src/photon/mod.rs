//! Stochastic progressive photon mapping.
//!
//! Each frame the estimator culls the visibility buffer into a work list,
//! traces a global and a caustic photon stream from the scene lights, builds
//! one BVH per class over the photon bounds and gathers a density estimate
//! at every work item. Photons are never kept across frames; convergence
//! comes from the shrinking gather radius in [`crate::progressive`].

pub mod build;
pub mod bvh;
pub mod collect;
pub mod cull;
mod estimator;
pub mod generate;
mod index;
mod record;

pub use estimator::{PhotonDensityEstimator, PhotonFrameOutput, PhotonFrameStats};
pub use index::PhotonIndex;
pub use record::{GpuPhoton, PhotonBuffer, PhotonClass, PhotonRecord};
