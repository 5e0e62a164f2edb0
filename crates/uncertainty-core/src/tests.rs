#[cfg(test)]
mod lifecycle_tests {
    use crate::columns::{quantile_column, LOWER_COL, UPPER_COL};
    use crate::{
        Column, CommonParams, DataFrame, ErrorKind, Estimator, FrameError, FrameRole,
        IntervalBounds, Params, Result, UncertaintyConfig, UncertaintyError, UncertaintyMethod,
        UncertaintyModel, UncertaintyStrategy,
    };

    /// Bounds at `forecast + mean residual +/- width * (q - 0.5)`.
    #[derive(Debug, Clone, Copy)]
    struct ShiftedBand;

    #[derive(Debug, Clone)]
    struct BandSettings {
        common: CommonParams,
        width: f64,
    }

    impl UncertaintyStrategy for ShiftedBand {
        const METHOD: UncertaintyMethod = UncertaintyMethod::SplitConformal;
        type Settings = BandSettings;
        type State = f64;

        fn validate(params: &Params, train: &DataFrame) -> Result<BandSettings> {
            let common = CommonParams::parse(params)?;
            train.floats(&common.value_col)?;
            train.floats(&common.forecast_col)?;
            Ok(BandSettings {
                common,
                width: params.number("width")?.unwrap_or(2.0),
            })
        }

        fn common(settings: &BandSettings) -> &CommonParams {
            &settings.common
        }

        fn fit(settings: &BandSettings, train: &DataFrame) -> Result<f64> {
            let y = train.floats(&settings.common.value_col)?;
            let f = train.floats(&settings.common.forecast_col)?;
            let residuals: Vec<f64> = y.iter().zip(f).map(|(a, b)| a - b).collect();
            Ok(crate::stats::mean(&residuals))
        }

        fn predict(settings: &BandSettings, shift: &f64, future: &DataFrame) -> Result<IntervalBounds> {
            let f = future.floats(&settings.common.forecast_col)?;
            Ok(IntervalBounds {
                quantiles: settings
                    .common
                    .quantiles
                    .iter()
                    .map(|q| f.iter().map(|x| x + shift + settings.width * (q - 0.5)).collect())
                    .collect(),
                auxiliary: vec![("band_shift", vec![*shift; f.len()])],
            })
        }
    }

    fn config(params: Params) -> UncertaintyConfig {
        UncertaintyConfig::new(UncertaintyMethod::SplitConformal).with_params(params)
    }

    fn train(shift: f64) -> DataFrame {
        DataFrame::from_columns(vec![
            ("y", Column::from(vec![10.0 + shift, 11.0 + shift])),
            ("forecast", Column::from(vec![10.0, 11.0])),
        ])
        .unwrap()
    }

    fn future() -> DataFrame {
        DataFrame::from_columns(vec![("forecast", vec![20.0, 30.0, 40.0])]).unwrap()
    }

    #[test]
    fn test_predict_before_fit_is_usage_error() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        let err = model.predict(&future()).unwrap_err();
        assert_eq!(err, UncertaintyError::NotFitted);
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(model.prediction().is_none());
    }

    #[test]
    fn test_fit_then_predict() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new().with("coverage", 0.5)));
        model.fit(train(1.0)).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.train_frame().unwrap().height(), 2);

        let pred = model.predict(&future()).unwrap();
        assert_eq!(pred.height(), 3);
        assert_eq!(pred.lower(), &[20.5, 30.5, 40.5]);
        assert_eq!(pred.upper(), &[21.5, 31.5, 41.5]);
        assert_eq!(pred.coverage, 0.5);
        assert!(pred.frame.has_column("band_shift"));
        assert_eq!(pred.interval_columns(), vec![LOWER_COL.to_string(), UPPER_COL.to_string()]);
        assert!(model.prediction().is_some());
    }

    #[test]
    fn test_configuration_is_validated_lazily() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new().with("width", "wide")));
        // construction never fails; the bad param surfaces at fit
        let err = model.fit(train(0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_missing_column_leaves_model_unfitted() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        model.fit(train(0.0)).unwrap();
        model.predict(&future()).unwrap();

        let no_forecast = DataFrame::from_columns(vec![("y", vec![1.0, 2.0])]).unwrap();
        let err = model.fit(no_forecast).unwrap_err();
        assert_eq!(
            err,
            UncertaintyError::Frame(FrameError::MissingColumn("forecast".to_string()))
        );
        assert_eq!(err.kind(), ErrorKind::Fit);
        assert!(!model.is_fitted());
        assert!(model.state().is_none());
        assert!(model.prediction().is_none());
        assert_eq!(model.predict(&future()).unwrap_err(), UncertaintyError::NotFitted);
    }

    #[test]
    fn test_refit_replaces_state() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        model.fit(train(5.0)).unwrap();
        assert_eq!(model.state(), Some(&5.0));
        model.fit(train(-1.0)).unwrap();
        assert_eq!(model.state(), Some(&-1.0));
        let pred = model.predict(&future()).unwrap();
        assert!(pred.lower()[0] < 20.0);
    }

    #[test]
    fn test_empty_frames() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        let err = model.fit(DataFrame::new()).unwrap_err();
        assert_eq!(err, UncertaintyError::EmptyFrame(FrameRole::Training));

        model.fit(train(0.0)).unwrap();
        let empty_future = DataFrame::from_columns(vec![("forecast", Vec::<f64>::new())]).unwrap();
        let err = model.predict(&empty_future).unwrap_err();
        assert_eq!(err, UncertaintyError::EmptyFrame(FrameRole::Future));
    }

    #[test]
    fn test_future_missing_column() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        model.fit(train(0.0)).unwrap();
        let wrong = DataFrame::from_columns(vec![("yhat", vec![1.0])]).unwrap();
        let err = model.predict(&wrong).unwrap_err();
        assert!(err.is_recoverable());
        assert!(model.is_fitted());
    }

    #[test]
    fn test_method_mismatch_is_configuration_error() {
        let cfg = UncertaintyConfig::new(UncertaintyMethod::QuantileRegression);
        let mut model = Estimator::<ShiftedBand>::new(cfg.clone());
        assert_eq!(model.config(), &cfg);
        let err = model.fit(train(0.0)).unwrap_err();
        assert!(matches!(err, UncertaintyError::InvalidConfig(_)));
    }

    #[test]
    fn test_extra_quantiles_get_their_own_columns() {
        let params = Params::new().with("quantiles", vec![0.1, 0.5, 0.9]);
        let mut model = Estimator::<ShiftedBand>::new(config(params));
        model.fit(train(0.0)).unwrap();
        let pred = model.predict(&future()).unwrap();
        assert_eq!(pred.interval_columns().len(), 5);
        assert_eq!(pred.frame.floats(&quantile_column(0.5)).unwrap(), &[20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_repredict_replaces_stored_prediction_and_columns() {
        let mut model = Estimator::<ShiftedBand>::new(config(Params::new()));
        model.fit(train(0.0)).unwrap();
        let first = model.predict(&future()).unwrap().clone();
        // predicting on an already merged frame overwrites the interval columns
        let second = model.predict(&first.frame).unwrap();
        assert_eq!(second.frame.width(), first.frame.width());
        let other = DataFrame::from_columns(vec![("forecast", vec![1.0])]).unwrap();
        model.predict(&other).unwrap();
        assert_eq!(model.prediction().unwrap().height(), 1);
    }

    #[test]
    fn test_models_are_usable_as_trait_objects() {
        let mut model: Box<dyn UncertaintyModel> =
            Box::new(Estimator::<ShiftedBand>::new(config(Params::new())));
        model.fit(train(0.0)).unwrap();
        assert_eq!(model.method(), UncertaintyMethod::SplitConformal);
        assert_eq!(model.predict(&future()).unwrap().height(), 3);
    }
}
