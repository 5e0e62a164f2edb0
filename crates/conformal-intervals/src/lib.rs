//! Conformal Intervals
//!
//! The `split_conformal` uncertainty strategy: distribution-free intervals
//! from order statistics of held-out forecast residuals.

pub mod conformal;
pub mod settings;

pub use conformal::{conformal_rank, SplitConformal, SplitConformalModel, SplitConformalState};
pub use settings::SplitConformalSettings;
