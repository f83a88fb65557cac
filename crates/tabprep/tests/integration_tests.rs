//! Integration tests for the cleaning pipeline and analysis routines.
//!
//! These tests run the public API end to end on small hand-built datasets.

use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tabprep::analysis::{
    CorrelationMethod, KMeansConfig, RegressionOptions, TTestKind, anova, box_plot,
    correlation_matrix, describe, histogram, kmeans, linear_regression, t_test, value_counts,
};
use tabprep::{
    CellValue, CleaningConfig, CleaningPipeline, CleaningStage, CoercionFailurePolicy,
    ColumnSelector, Dataset, Deduplicator, ErrorKind, FillValue, KeepPolicy, MissingStrategy,
    MissingValueResolver, NormalizationMethod, Normalizer, OutlierFilter, StageStatus,
    StageUpdate, TargetType, TextCleaningConfig, TextNormalizer,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Helper Functions
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Survey export with formatted numbers, missing markers and messy text.
fn raw_survey() -> Dataset {
    Dataset::new(
        df![
            "income" => ["$42,000", "51000", "n/a", "38,500", "1,000,000", "47000", "51000"],
            "age" => [Some(34.0), Some(45.0), Some(29.0), Some(52.0), Some(41.0), None, Some(45.0)],
            "city" => ["  New York", "boston", "Chicago!", "new york", "Boston ", "chicago", "BOSTON"],
        ]
        .unwrap(),
    )
    .unwrap()
}

fn survey_config() -> CleaningConfig {
    CleaningConfig::builder()
        .coerce("income", TargetType::Float)
        .missing_strategy(MissingStrategy::Median)
        .remove_outliers(ColumnSelector::column("income"))
        .normalize_text(ColumnSelector::column("city"))
        .deduplicate(ColumnSelector::columns(["city", "income"]))
        .build()
        .unwrap()
}

fn rows(dataset: &Dataset) -> Vec<Vec<CellValue>> {
    let columns: Vec<Vec<CellValue>> = dataset
        .column_names()
        .iter()
        .map(|name| dataset.cells(name).unwrap())
        .collect();
    (0..dataset.height())
        .map(|r| columns.iter().map(|c| c[r].clone()).collect())
        .collect()
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_on_survey() {
    init_tracing();
    let outcome = CleaningPipeline::builder()
        .config(survey_config())
        .build()
        .unwrap()
        .run(raw_survey())
        .unwrap();

    let ds = &outcome.dataset;
    assert_eq!(ds.height(), 5);
    for column in ["income", "age", "city"] {
        assert_eq!(ds.missing_count(column).unwrap(), 0, "column {column}");
    }

    // median of the parsed incomes fills the n/a row, the million is an outlier
    assert_eq!(
        ds.present_values("income").unwrap(),
        vec![42000.0, 51000.0, 49000.0, 38500.0, 47000.0]
    );
    assert_eq!(
        ds.text_values("city").unwrap(),
        vec![
            Some("new york".to_string()),
            Some("boston".to_string()),
            Some("chicago".to_string()),
            Some("new york".to_string()),
            Some("chicago".to_string()),
        ]
    );
    assert_eq!(ds.present_values("age").unwrap()[4], 43.0);
}

#[test]
fn test_pipeline_summaries() {
    let outcome = CleaningPipeline::builder()
        .config(survey_config())
        .build()
        .unwrap()
        .run(raw_survey())
        .unwrap();

    let stages: Vec<CleaningStage> = outcome.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, CleaningStage::ORDER.to_vec());

    let normalization = outcome.stage(CleaningStage::Normalization).unwrap();
    assert!(normalization.skipped);

    assert_eq!(outcome.stage(CleaningStage::Outliers).unwrap().rows_removed(), 1);
    assert_eq!(outcome.stage(CleaningStage::Dedup).unwrap().rows_removed(), 1);
    assert_eq!(outcome.stage(CleaningStage::Coercion).unwrap().rows_removed(), 0);

    let coercion = outcome.coercion.as_ref().unwrap();
    assert_eq!(coercion.total_failures(), 0);

    let bounds = outcome.outliers.as_ref().unwrap().bounds_for("income").unwrap();
    assert_eq!((bounds.q1, bounds.q3), (44500.0, 51000.0));
    assert_eq!((bounds.lower, bounds.upper), (34750.0, 60750.0));

    assert!(outcome.scaler.is_none());
    assert!(!outcome.steps().is_empty());
}

#[test]
fn test_pipeline_with_default_config_is_identity() {
    let raw = raw_survey();
    let outcome = CleaningPipeline::builder()
        .config(CleaningConfig::default())
        .build()
        .unwrap()
        .run(raw.clone())
        .unwrap();

    assert!(outcome.stages.iter().all(|s| s.skipped));
    assert_eq!(rows(&outcome.dataset), rows(&raw));
}

#[test]
fn test_pipeline_failure_keeps_last_good_dataset() {
    init_tracing();
    let ds = Dataset::new(
        df![
            "score" => [Some(1.0), None, Some(3.0)],
            "flat" => [5.0, 5.0, 5.0],
        ]
        .unwrap(),
    )
    .unwrap();
    let config = CleaningConfig::builder()
        .missing_strategy(MissingStrategy::Mean)
        .normalize(NormalizationMethod::Standard, ColumnSelector::All)
        .build()
        .unwrap();

    let failure = CleaningPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run(ds)
        .unwrap_err();

    assert_eq!(failure.stage, CleaningStage::Normalization);
    assert_eq!(failure.error.kind(), ErrorKind::DegenerateColumn);
    assert_eq!(failure.last_good.missing_count("score").unwrap(), 0);
    assert_eq!(failure.completed.len(), 3);
    assert!(failure.to_string().contains("Normalizing Columns"));
}

#[test]
fn test_pipeline_coercion_abort() {
    let ds = Dataset::new(df!["price" => ["10", "abc", "30"]].unwrap()).unwrap();
    let config = CleaningConfig::builder()
        .coerce("price", TargetType::Float)
        .coercion_failure_policy(CoercionFailurePolicy::Abort)
        .build()
        .unwrap();

    let failure = CleaningPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run(ds)
        .unwrap_err();

    assert_eq!(failure.stage, CleaningStage::Coercion);
    assert_eq!(failure.error.kind(), ErrorKind::Coercion);
    assert!(failure.error.to_string().contains("abc"));
    assert!(failure.completed.is_empty());
    assert_eq!(failure.last_good.height(), 3);
}

#[test]
fn test_pipeline_progress_reporting() {
    let updates: Arc<Mutex<Vec<StageUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();

    CleaningPipeline::builder()
        .config(survey_config())
        .on_progress(move |update| sink.lock().unwrap().push(update))
        .build()
        .unwrap()
        .run(raw_survey())
        .unwrap();

    let updates = updates.lock().unwrap();
    let skipped: Vec<CleaningStage> = updates
        .iter()
        .filter(|u| u.status == StageStatus::Skipped)
        .map(|u| u.stage)
        .collect();
    assert_eq!(skipped, vec![CleaningStage::Normalization]);

    let completed = updates
        .iter()
        .filter(|u| u.status == StageStatus::Completed)
        .count();
    assert_eq!(completed, 5);

    let progress: Vec<f32> = updates.iter().map(|u| u.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(updates.last().unwrap().progress, 1.0);
}

#[test]
fn test_pipeline_runs_on_worker_thread() {
    let pipeline = CleaningPipeline::builder()
        .config(survey_config())
        .build()
        .unwrap();
    let raw = raw_survey();

    let handle = std::thread::spawn(move || pipeline.run(raw).map(|o| o.dataset.height()));
    assert_eq!(handle.join().unwrap().unwrap(), 5);
}

// ============================================================================
// Stage Properties
// ============================================================================

#[test]
fn test_mean_fill_example() {
    let ds = Dataset::new(df!["x" => [Some(10.0), None, Some(30.0)]].unwrap()).unwrap();
    let out = MissingValueResolver::new(MissingStrategy::Mean, ColumnSelector::All)
        .resolve(&ds)
        .unwrap();
    assert_eq!(out.present_values("x").unwrap(), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_every_missing_strategy_leaves_no_missing_cells() {
    let ds = Dataset::new(
        df![
            "x" => [Some(1.0), None, Some(3.0), Some(3.0)],
            "t" => [Some("a"), None, Some("b"), Some("a")],
        ]
        .unwrap(),
    )
    .unwrap();

    let cases = [
        (MissingStrategy::Mean, ColumnSelector::column("x")),
        (MissingStrategy::Median, ColumnSelector::column("x")),
        (MissingStrategy::Mode, ColumnSelector::All),
        (
            MissingStrategy::Constant(FillValue::Number(0.0)),
            ColumnSelector::column("x"),
        ),
        (
            MissingStrategy::Constant(FillValue::Text("unknown".to_string())),
            ColumnSelector::column("t"),
        ),
        (MissingStrategy::Drop, ColumnSelector::All),
    ];

    for (strategy, columns) in cases {
        let out = MissingValueResolver::new(strategy.clone(), columns.clone())
            .resolve(&ds)
            .unwrap();
        let targets = match &columns {
            ColumnSelector::All => vec!["x".to_string(), "t".to_string()],
            ColumnSelector::Columns(names) => names.clone(),
        };
        for column in targets {
            assert_eq!(
                out.missing_count(&column).unwrap(),
                0,
                "{} left missing cells in '{}'",
                strategy.name(),
                column
            );
        }
    }
}

#[test]
fn test_mean_on_text_column_is_strategy_error() {
    let ds = Dataset::new(df!["t" => [Some("a"), None]].unwrap()).unwrap();
    let err = MissingValueResolver::new(MissingStrategy::Mean, ColumnSelector::column("t"))
        .resolve(&ds)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Strategy);
}

#[test]
fn test_outlier_example_and_monotonicity() {
    let ds = Dataset::new(df!["v" => [1.0, 2.0, 3.0, 4.0, 100.0]].unwrap()).unwrap();
    let (out, report) = OutlierFilter::new(ColumnSelector::All, 1.5)
        .unwrap()
        .apply(&ds)
        .unwrap();
    assert_eq!(out.present_values("v").unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(report.rows_removed, 1);

    let wide = Dataset::new(
        df!["v" => (0..40).map(|i| ((i * 37) % 23) as f64 * if i % 7 == 0 { 4.0 } else { 1.0 }).collect::<Vec<_>>()]
            .unwrap(),
    )
    .unwrap();
    let mut last = 0;
    for k in [0.0, 0.5, 1.0, 1.5, 3.0, 10.0] {
        let (kept, _) = OutlierFilter::new(ColumnSelector::All, k)
            .unwrap()
            .apply(&wide)
            .unwrap();
        assert!(kept.height() >= last, "k = {k} kept fewer rows");
        last = kept.height();
    }
}

#[test]
fn test_standardization_round_trip() {
    let ds = Dataset::new(
        df![
            "a" => [Some(3.5), Some(-1.0), None, Some(8.25), Some(0.0)],
            "b" => [10i64, 20, 35, 5, 0],
        ]
        .unwrap(),
    )
    .unwrap();
    let (scaled, scaler) = Normalizer::new(NormalizationMethod::Standard, ColumnSelector::All)
        .fit_transform(&ds)
        .unwrap();
    let restored = scaler.inverse_transform(&scaled).unwrap();

    for column in ["a", "b"] {
        let before = ds.numeric_values(column).unwrap();
        let after = restored.numeric_values(column).unwrap();
        for (b, a) in before.iter().zip(&after) {
            match (b, a) {
                (Some(b), Some(a)) => approx::assert_relative_eq!(*b, *a, epsilon = 1e-9),
                (None, None) => {}
                _ => panic!("missing pattern changed in '{column}'"),
            }
        }
    }
}

#[test]
fn test_constant_columns_rejected_despite_rounding() {
    // the mean of three or six 0.1s is not exactly 0.1
    let ds = Dataset::new(
        df![
            "tenth" => [0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
            "group" => ["a", "a", "a", "b", "b", "b"],
        ]
        .unwrap(),
    )
    .unwrap();
    let err = Normalizer::new(NormalizationMethod::Standard, ColumnSelector::All)
        .fit_transform(&ds)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateColumn);

    let stats = describe(&ds, &ColumnSelector::All).unwrap();
    assert_eq!(stats.get("tenth").unwrap().std, Some(0.0));

    let err = anova(&ds, "tenth", "group").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateColumn);
}

#[test]
fn test_text_normalization_is_idempotent() {
    let ds = Dataset::new(
        df!["s" => [Some("  Hello,   World!! "), Some("ÉCOLE\tNormale"), None, Some("a - b")]]
            .unwrap(),
    )
    .unwrap();
    let normalizer = TextNormalizer::new(TextCleaningConfig::default());
    let once = normalizer.apply(&ds).unwrap();
    let twice = normalizer.apply(&once).unwrap();

    assert_eq!(once.text_values("s").unwrap(), twice.text_values("s").unwrap());
    assert_eq!(
        once.text_values("s").unwrap(),
        vec![
            Some("hello world".to_string()),
            Some("école normale".to_string()),
            None,
            Some("a b".to_string()),
        ]
    );
}

#[test]
fn test_dedup_size_and_uniqueness() {
    let ds = Dataset::new(
        df![
            "k" => [1, 2, 1, 3, 2, 1],
            "v" => ["x", "y", "x", "z", "w", "x"],
        ]
        .unwrap(),
    )
    .unwrap();

    let distinct: HashSet<Vec<CellValue>> = rows(&ds).into_iter().collect();
    let out = Deduplicator::new(ColumnSelector::All, KeepPolicy::First)
        .apply(&ds)
        .unwrap();
    assert_eq!(out.height(), distinct.len());

    let survivors = rows(&out);
    let unique: HashSet<&Vec<CellValue>> = survivors.iter().collect();
    assert_eq!(unique.len(), survivors.len());

    let none = Deduplicator::new(ColumnSelector::column("k"), KeepPolicy::None)
        .apply(&ds)
        .unwrap();
    assert_eq!(none.present_values("k").unwrap(), vec![3.0]);
}

// ============================================================================
// Analysis on Cleaned Data
// ============================================================================

fn cleaned_survey() -> Dataset {
    CleaningPipeline::builder()
        .config(survey_config())
        .build()
        .unwrap()
        .run(raw_survey())
        .unwrap()
        .dataset
}

#[test]
fn test_describe_cleaned_data() {
    let summary = describe(&cleaned_survey(), &ColumnSelector::All).unwrap();
    let names: Vec<&str> = summary.columns.iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["income", "age"]);

    let income = summary.get("income").unwrap();
    assert_eq!(income.count, 5);
    assert_eq!(income.missing, 0);
    assert_eq!(income.min, 38500.0);
    assert_eq!(income.max, 51000.0);
    assert_eq!(income.median, 47000.0);
}

#[test]
fn test_correlation_methods_agree_on_structure() {
    let ds = Dataset::new(
        df![
            "a" => [Some(1.0), Some(3.0), Some(2.0), Some(5.0), Some(4.0), None],
            "b" => [Some(2.0), Some(2.5), Some(2.0), Some(7.0), Some(6.5), Some(1.0)],
            "c" => [Some(9.0), Some(1.0), Some(4.0), Some(2.0), None, Some(3.0)],
        ]
        .unwrap(),
    )
    .unwrap();

    for method in [
        CorrelationMethod::Pearson,
        CorrelationMethod::Spearman,
        CorrelationMethod::Kendall,
    ] {
        let m = correlation_matrix(&ds, &ColumnSelector::All, method).unwrap();
        assert_eq!(m.method, method);
        for i in 0..m.columns.len() {
            assert_eq!(m.values[i][i], 1.0);
            for j in 0..m.columns.len() {
                assert_eq!(m.values[i][j], m.values[j][i]);
                assert_eq!(m.sample_sizes[i][j], m.sample_sizes[j][i]);
            }
        }
        assert_eq!(m.sample_size("a", "c"), Some(4));
    }
}

#[test]
fn test_hypothesis_tests_on_dataset() {
    let ds = Dataset::new(
        df![
            "control" => [12.1, 11.8, 12.4, 12.0, 11.9, 12.2],
            "treated" => [13.0, 13.4, 12.9, 13.3, 13.1, 13.6],
            "site" => ["north", "south", "north", "south", "east", "east"],
        ]
        .unwrap(),
    )
    .unwrap();

    let welch = t_test(&ds, "control", "treated", TTestKind::Welch).unwrap();
    assert!(welch.statistic < 0.0);
    assert!(welch.p_value < 0.001);

    let student = t_test(&ds, "control", "treated", TTestKind::Student).unwrap();
    assert_eq!(student.df, 10.0);

    let by_site = anova(&ds, "treated", "site").unwrap();
    assert_eq!(by_site.groups, vec!["north", "south", "east"]);
    assert_eq!(by_site.sizes, vec![2, 2, 2]);
    assert_eq!((by_site.df_between, by_site.df_within), (2, 3));
    assert!((0.0..=1.0).contains(&by_site.p_value));

    let err = t_test(&ds, "control", "site", TTestKind::Welch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_regression_on_dataset() {
    let ds = Dataset::new(
        df![
            "hours" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0), None],
            "sleep" => [8.0, 7.0, 7.5, 6.0, 6.5, 5.0, 7.0],
            "score" => [52.0, 58.0, 61.0, 70.0, 71.0, 80.0, 90.0],
        ]
        .unwrap(),
    )
    .unwrap();

    let fit = linear_regression(&ds, "score", &["hours", "sleep"], RegressionOptions::default())
        .unwrap();
    assert_eq!(fit.n_observations, 6);
    assert_eq!(fit.df_residual, 3);
    assert!(fit.r_squared > 0.9 && fit.r_squared <= 1.0);
    assert!(fit.adj_r_squared < fit.r_squared);
    assert!(fit.coefficient("hours").unwrap().estimate > 0.0);

    let json = serde_json::to_string(&fit).unwrap();
    assert!(json.contains("\"response\":\"score\""));
}

#[test]
fn test_kmeans_two_groups() {
    init_tracing();
    let ds = Dataset::new(
        df![
            "x" => [Some(0.0), Some(0.2), Some(0.1), Some(5.0), Some(5.1), Some(4.9), None],
            "y" => [0.0, 0.1, 0.3, 5.0, 4.8, 5.2, 2.5],
        ]
        .unwrap(),
    )
    .unwrap();

    let result = kmeans(&ds, &["x", "y"], &KMeansConfig::new(2).n_init(4)).unwrap();
    let labels = &result.labels;
    assert_eq!(labels[6], None);
    assert!(labels[..3].iter().all(|l| *l == labels[0]));
    assert!(labels[3..6].iter().all(|l| *l == labels[3]));
    assert_ne!(labels[0], labels[3]);

    // every label is the nearest centroid
    let xs = ds.numeric_values("x").unwrap();
    let ys = ds.present_values("y").unwrap();
    for row in 0..6 {
        let point = [xs[row].unwrap(), ys[row]];
        let dist = |c: &Vec<f64>| (point[0] - c[0]).powi(2) + (point[1] - c[1]).powi(2);
        let own = dist(&result.centroids[labels[row].unwrap()]);
        assert!(result.centroids.iter().all(|c| own <= dist(c)));
    }
    assert!(result.silhouette.unwrap() > 0.9);
}

#[test]
fn test_distribution_summaries() {
    let ds = cleaned_survey();

    let h = histogram(&ds, "income", 5).unwrap();
    assert_eq!(h.counts.iter().sum::<usize>(), ds.height());
    assert_eq!(h.edges.len(), 6);
    assert_eq!(h.edges[0], 38500.0);
    assert_eq!(h.edges[5], 51000.0);

    let cities = value_counts(&ds, "city").unwrap();
    let pairs: Vec<(&str, usize)> = cities
        .values
        .iter()
        .map(|v| (v.value.as_str(), v.count))
        .collect();
    assert_eq!(pairs, vec![("new york", 2), ("chicago", 2), ("boston", 1)]);

    let b = box_plot(&ds, "age").unwrap();
    assert!(b.lower_whisker <= b.q1 && b.q3 <= b.upper_whisker);
}
