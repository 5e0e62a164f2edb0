//! Residual Spread
//!
//! The `residual_spread_regression` uncertainty strategy: normal intervals
//! whose width follows a linear model of the residual spread.

pub mod settings;
pub mod spread;

pub use settings::{Center, ResidualSpreadSettings, SpreadTarget};
pub use spread::{ResidualSpread, ResidualSpreadModel, ResidualSpreadState};
