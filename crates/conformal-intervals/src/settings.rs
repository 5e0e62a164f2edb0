use uncertainty_core::columns::TIME_COL;
use uncertainty_core::{CommonParams, DataFrame, Params, Result, UncertaintyError, UncertaintyMethod};

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConformalSettings {
    pub common: CommonParams,
    /// Score `|r|` and mirror the radius, instead of using signed tails.
    pub symmetric: bool,
    /// Keep only the most recent residuals.
    pub recent_window: Option<usize>,
    pub time_col: String,
}

impl SplitConformalSettings {
    pub const KEYS: &'static [&'static str] = &["symmetric", "recent_window", "time_col"];

    pub fn parse(params: &Params) -> Result<Self> {
        params.warn_unknown(UncertaintyMethod::SplitConformal, Self::KEYS);

        let recent_window = params.count("recent_window")?;
        if recent_window == Some(0) {
            return Err(UncertaintyError::invalid_param("recent_window", "must be at least 1"));
        }

        Ok(Self {
            common: CommonParams::parse(params)?,
            symmetric: params.flag("symmetric")?.unwrap_or(true),
            recent_window,
            time_col: params.text("time_col")?.unwrap_or_else(|| TIME_COL.to_string()),
        })
    }

    pub fn check_columns(&self, frame: &DataFrame, with_actuals: bool) -> Result<()> {
        if with_actuals {
            frame.floats(&self.common.value_col)?;
            if frame.has_column(&self.time_col) {
                frame.times(&self.time_col)?;
            }
        }
        frame.floats(&self.common.forecast_col)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uncertainty_core::ErrorKind;

    #[test]
    fn test_defaults() {
        let settings = SplitConformalSettings::parse(&Params::new()).unwrap();
        assert!(settings.symmetric);
        assert_eq!(settings.recent_window, None);
        assert_eq!(settings.common.quantiles.len(), 2);
    }

    #[test]
    fn test_window_must_be_positive() {
        let err = SplitConformalSettings::parse(&Params::new().with("recent_window", 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = SplitConformalSettings::parse(&Params::new().with("recent_window", -3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
