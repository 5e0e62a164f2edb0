#[cfg(test)]
mod pipeline_tests {
    use approx::assert_relative_eq;
    use rand::distributions::Distribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::Normal;
    use uncertainty_core::columns::{quantile_column, LOWER_COL, UPPER_COL};
    use uncertainty_core::{
        Column, DataFrame, ErrorKind, UncertaintyConfig, UncertaintyError, UncertaintyMethod,
    };

    use crate::adapter::UncertaintyAdapter;
    use crate::config::PipelineConfig;
    use crate::folds::{evaluate_folds, evaluate_folds_with, summarize, Fold};
    use crate::registry::build_model;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    fn pipeline_config(vars: &[(&str, &str)]) -> PipelineConfig {
        PipelineConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    fn config(json: &str) -> UncertaintyConfig {
        UncertaintyConfig::from_json(json).unwrap().unwrap()
    }

    /// Forecast plus N(0, sigma * load) noise, with a `load` feature column.
    fn history(n: usize, sigma: f64, seed: u64) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, sigma).unwrap();
        let load: Vec<f64> = (0..n).map(|i| 1.0 + (i % 4) as f64).collect();
        let forecast: Vec<f64> = (0..n).map(|i| 100.0 + (i % 24) as f64).collect();
        let actual: Vec<f64> = forecast
            .iter()
            .zip(&load)
            .map(|(f, l)| f + l * noise.sample(&mut rng))
            .collect();
        DataFrame::from_columns(vec![
            ("y", Column::from(actual)),
            ("forecast", Column::from(forecast)),
            ("load", Column::from(load)),
        ])
        .unwrap()
    }

    #[test]
    fn test_every_method_end_to_end() {
        init_tracing();
        let configs = [
            r#"{"method": "simple_conditional_residuals", "params": {"coverage": 0.9, "conditional_cols": ["load"]}}"#,
            r#"{"method": "quantile_regression", "params": {"coverage": 0.9, "is_residual_based": true, "feature_cols": ["load"]}}"#,
            r#"{"method": "residual_spread_regression", "params": {"coverage": 0.9, "feature_cols": ["load"], "center": "zero"}}"#,
            r#"{"method": "split_conformal", "params": {"coverage": 0.9}}"#,
        ];
        let train = history(800, 1.0, 42);
        let future = history(50, 1.0, 43);

        for json in configs {
            let cfg = config(json);
            let mut model = build_model(cfg.clone()).unwrap();
            model.fit(train.clone()).unwrap();
            let pred = model.predict(&future).unwrap();
            assert_eq!(pred.method, cfg.method);
            assert_eq!(pred.height(), future.height());
            assert_relative_eq!(pred.coverage, 0.9);
            let forecast = pred.frame.floats("forecast").unwrap();
            for ((lo, hi), f) in pred.lower().iter().zip(pred.upper()).zip(forecast) {
                assert!(lo <= f && f <= hi, "{}: {lo} <= {f} <= {hi}", cfg.method);
            }
        }
    }

    #[test]
    fn test_full_coverage_ecdf_worked_example() {
        let cfg = config(
            r#"{"uncertainty_method": "simple_conditional_residuals",
                "params": {"coverage": 1.0, "quantile_estimation_method": "ecdf"}}"#,
        );
        let train = DataFrame::from_columns(vec![("y", vec![3.0, 5.0, 6.0]), ("forecast", vec![2.0, 4.0, 7.0])])
            .unwrap();
        let future = DataFrame::from_columns(vec![("forecast", vec![12.0])]).unwrap();
        let output = UncertaintyAdapter::new(Some(cfg))
            .fail_on_error(true)
            .attach_intervals(train, future)
            .unwrap();
        assert_eq!(output.frame.floats(LOWER_COL).unwrap(), &[11.0]);
        assert_eq!(output.frame.floats(UPPER_COL).unwrap(), &[13.0]);
    }

    #[test]
    fn test_unknown_method_rejected_before_data() {
        let err = UncertaintyConfig::from_json(r#"{"method": "gaussian_process", "params": {"coverage": 0.9}}"#)
            .unwrap_err();
        assert!(matches!(err, UncertaintyError::UnknownMethod { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(UncertaintyConfig::from_json("null").unwrap().is_none());
    }

    #[test]
    fn test_predict_before_fit_is_usage_error() {
        for method in UncertaintyMethod::ALL {
            let mut model = build_model(UncertaintyConfig::new(method)).unwrap();
            let err = model.predict(&history(5, 1.0, 1)).unwrap_err();
            assert_eq!(err, UncertaintyError::NotFitted);
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn test_missing_column_leaves_every_model_unfitted() {
        let train = history(200, 1.0, 5);
        let mut broken = train.clone();
        broken.set_column("forecast", Column::from(vec!["n/a"; 200])).unwrap();

        for method in UncertaintyMethod::ALL {
            let mut model = build_model(UncertaintyConfig::new(method)).unwrap();
            model.fit(train.clone()).unwrap();
            let err = model.fit(broken.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Fit, "{method}");
            assert!(!model.is_fitted());
            assert!(model.train_frame().is_none());
        }
    }

    #[test]
    fn test_extra_quantile_columns_through_adapter() {
        let cfg = config(r#"{"method": "split_conformal", "params": {"quantiles": [0.1, 0.5, 0.9]}}"#);
        let output = UncertaintyAdapter::new(Some(cfg))
            .attach_intervals(history(300, 1.0, 8), history(10, 1.0, 9))
            .unwrap();
        assert_eq!(output.interval_columns.len(), 5);
        assert!(output.frame.has_column(&quantile_column(0.5)));
        assert_relative_eq!(output.coverage.unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_fold_evaluation_parallel_matches_sequential() {
        init_tracing();
        let cfg = config(r#"{"method": "split_conformal", "params": {"coverage": 0.8}}"#);
        let mut folds: Vec<Fold> = (0..4)
            .map(|i| Fold {
                train: history(400, 2.0, 100 + i),
                test: history(400, 2.0, 200 + i),
            })
            .collect();
        // a fold without actuals fails on its own
        folds.push(Fold {
            train: history(400, 2.0, 300),
            test: DataFrame::from_columns(vec![("forecast", vec![1.0, 2.0])]).unwrap(),
        });

        let parallel = evaluate_folds(&cfg, &folds, true);
        let sequential = evaluate_folds(&cfg, &folds, false);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 5);
        assert!(parallel[4].error.as_deref().unwrap().contains("actual"));

        let summary = summarize(&cfg, &parallel).unwrap();
        assert_eq!(summary.failed, 1);
        assert!((summary.mean_coverage - 0.8).abs() < 0.05, "{summary:?}");
        assert!(summary.mean_interval_score >= summary.mean_width);
    }

    #[test]
    fn test_environment_settings_reach_the_adapter() {
        let method = r#"{"method": "split_conformal", "params": {"coverage": 0.8}}"#;
        let strict = pipeline_config(&[
            ("UNCERTAINTY_CONFIG", method),
            ("UNCERTAINTY_FAIL_ON_ERROR", "true"),
            ("UNCERTAINTY_MIN_TRAIN_ROWS", "500"),
        ]);
        let adapter = UncertaintyAdapter::from_pipeline_config(&strict);
        assert_eq!(adapter.config().map(|c| c.method), Some(UncertaintyMethod::SplitConformal));

        let err = adapter
            .attach_intervals(history(100, 1.0, 20), history(10, 1.0, 21))
            .unwrap_err();
        assert!(matches!(
            err,
            UncertaintyError::InsufficientSamples { needed: 500, found: 100, .. }
        ));

        let lenient = pipeline_config(&[
            ("UNCERTAINTY_CONFIG", method),
            ("UNCERTAINTY_MIN_TRAIN_ROWS", "500"),
        ]);
        let output = UncertaintyAdapter::from_pipeline_config(&lenient)
            .attach_intervals(history(100, 1.0, 20), history(10, 1.0, 21))
            .unwrap();
        assert!(!output.has_intervals());
        assert!(output.fallback_reason.is_some());

        let output = UncertaintyAdapter::from_pipeline_config(&lenient)
            .attach_intervals(history(600, 1.0, 20), history(10, 1.0, 21))
            .unwrap();
        assert!(output.has_intervals());
    }

    #[test]
    fn test_fold_evaluation_follows_pipeline_config() {
        let method = r#"{"method": "split_conformal", "params": {"coverage": 0.8}}"#;
        let folds: Vec<Fold> = (0..3)
            .map(|i| Fold {
                train: history(300, 1.0, 400 + i),
                test: history(100, 1.0, 500 + i),
            })
            .collect();

        let sequential = pipeline_config(&[
            ("UNCERTAINTY_CONFIG", method),
            ("UNCERTAINTY_PARALLEL_FOLDS", "false"),
        ]);
        assert!(!sequential.parallel_folds);
        let reports = evaluate_folds_with(&sequential, &folds).unwrap();
        assert_eq!(reports, evaluate_folds(&config(method), &folds, true));
        assert!(reports.iter().all(|r| r.is_ok()));

        assert!(evaluate_folds_with(&pipeline_config(&[]), &folds).is_err());
    }
}
