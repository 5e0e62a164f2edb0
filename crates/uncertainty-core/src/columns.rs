//! Stable column names shared with the forecasting pipeline and any reporting
//! code downstream of it.

/// Default time index column.
pub const TIME_COL: &str = "ts";
/// Default actual value column.
pub const VALUE_COL: &str = "y";
/// Default point forecast column.
pub const FORECAST_COL: &str = "forecast";
/// Lower interval bound at the configured coverage (first quantile).
pub const LOWER_COL: &str = "forecast_lower";
/// Upper interval bound at the configured coverage (last quantile).
pub const UPPER_COL: &str = "forecast_upper";
/// Residual spread used to build the bounds, for strategies that have one.
pub const ERR_STD_COL: &str = "forecast_err_std";

/// Name of the per-quantile column, e.g. `forecast_quantile_0.1`.
pub fn quantile_column(quantile: f64) -> String {
    format!("{FORECAST_COL}_quantile_{quantile}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_column() {
        assert_eq!(quantile_column(0.1), "forecast_quantile_0.1");
        assert_eq!(quantile_column(0.975), "forecast_quantile_0.975");
    }
}
