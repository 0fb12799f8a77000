//! Progressive state control: reset policy, SPPM radius schedule and
//! temporal antialiasing jitter.
//!
//! ```text
//! ResetCause ──► ProgressiveStateController::advance ──► FrameContext
//!                   ├─ reset decision / accumulated frames
//!                   ├─ RadiusState (per photon class)
//!                   └─ jitter offset (8-entry LP sequence)
//! ```

mod controller;
pub mod jitter;
mod radius;

pub use controller::ProgressiveStateController;
pub use radius::{decay_radius, RadiusState};
