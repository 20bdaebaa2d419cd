use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::forest::{ClassWeightMode, ForestParams, MaxFeatures, N_CLASSES, RandomForest};
use crate::play_dataset::FEATURE_NAMES;
use crate::tables::EventKind;

pub const ARTIFACT_VERSION: u32 = 1;
pub const COMPARE_SEED: u64 = 1;
pub const SEARCH_SEED: u64 = 42;
pub const MODEL_SEED: u64 = 42;

/// Zero-mean, unit-variance scaling; constant columns are left centred only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>], rows: &[usize]) -> Self {
        let width = rows.first().map(|i| x[*i].len()).unwrap_or(0);
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; width];
        for &i in rows {
            for (m, v) in means.iter_mut().zip(&x[i]) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut vars = vec![0.0; width];
        for &i in rows {
            for ((var, v), m) in vars.iter_mut().zip(&x[i]).zip(&means) {
                *var += (v - m).powi(2);
            }
        }
        let scales = vars
            .into_iter()
            .map(|var| {
                let sd = (var / n).sqrt();
                if sd > 0.0 { sd } else { 1.0 }
            })
            .collect();
        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform(row)).collect()
    }
}

/// Scaler followed by a forest, fit on the same rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotPipeline {
    pub scaler: StandardScaler,
    pub forest: RandomForest,
}

impl ShotPipeline {
    pub fn fit(x: &[Vec<f64>], y: &[usize], rows: &[usize], params: &ForestParams) -> Result<Self> {
        let scaler = StandardScaler::fit(x, rows);
        let scaled = scaler.transform_all(x);
        let forest = RandomForest::fit(&scaled, y, rows, params)?;
        Ok(Self { scaler, forest })
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        self.forest.predict(&self.scaler.transform(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> [f64; N_CLASSES] {
        self.forest.predict_proba(&self.scaler.transform(row))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub repeat: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Each repeat shuffles every class with its own seed and deals its rows
/// round-robin into `n_splits` test folds, so class shares match across folds.
pub fn repeated_stratified_kfold(
    y: &[usize],
    n_splits: usize,
    n_repeats: usize,
    seed: u64,
) -> Result<Vec<Fold>> {
    if n_splits < 2 {
        bail!("n_splits must be at least 2, got {n_splits}");
    }
    if y.len() < n_splits {
        bail!("{} rows cannot fill {n_splits} folds", y.len());
    }

    let mut by_class: [Vec<usize>; N_CLASSES] = Default::default();
    for (i, class) in y.iter().enumerate() {
        let Some(bucket) = by_class.get_mut(*class) else {
            bail!("row {i} has class {class} outside 0..{N_CLASSES}");
        };
        bucket.push(i);
    }

    let mut folds = Vec::with_capacity(n_splits * n_repeats);
    for repeat in 0..n_repeats {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(repeat as u64));
        let mut assignment = vec![0usize; y.len()];
        let mut dealt = 0usize;
        for class_rows in &by_class {
            let mut shuffled = class_rows.clone();
            shuffled.shuffle(&mut rng);
            for i in shuffled {
                assignment[i] = dealt % n_splits;
                dealt += 1;
            }
        }
        for k in 0..n_splits {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|i| assignment[*i] == k);
            folds.push(Fold {
                repeat,
                train,
                test,
            });
        }
    }
    Ok(folds)
}

pub fn accuracy(predicted: &[usize], truth: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / truth.len() as f64
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Rows are true classes, columns predicted classes, both in `EventKind::ALL` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: [[u64; N_CLASSES]; N_CLASSES],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self {
            labels: EventKind::ALL.iter().map(|e| e.label().to_string()).collect(),
            counts: [[0; N_CLASSES]; N_CLASSES],
        }
    }

    pub fn record(&mut self, truth: usize, predicted: usize) {
        if truth < N_CLASSES && predicted < N_CLASSES {
            self.counts[truth][predicted] += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let diag: u64 = (0..N_CLASSES).map(|c| self.counts[c][c]).sum();
        diag as f64 / total as f64
    }

    pub fn to_text(&self) -> String {
        let width = self.labels.iter().map(String::len).max().unwrap_or(0).max(8);
        let mut out = format!("{:width$}", "true \\ pred");
        for label in &self.labels {
            out.push_str(&format!(" {label:>width$}"));
        }
        out.push('\n');
        for (label, row) in self.labels.iter().zip(&self.counts) {
            out.push_str(&format!("{label:width$}"));
            for count in row {
                out.push_str(&format!(" {count:>width$}"));
            }
            out.push('\n');
        }
        out
    }
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

/// Fits on each fold's training rows and scores accuracy on its test rows.
pub fn cross_val_scores(
    x: &[Vec<f64>],
    y: &[usize],
    params: &ForestParams,
    folds: &[Fold],
) -> Result<Vec<f64>> {
    folds
        .par_iter()
        .map(|fold| -> Result<f64> {
            let model = ShotPipeline::fit(x, y, &fold.train, params)?;
            let predicted: Vec<usize> = fold.test.iter().map(|i| model.predict(&x[*i])).collect();
            let truth: Vec<usize> = fold.test.iter().map(|i| y[*i]).collect();
            Ok(accuracy(&predicted, &truth))
        })
        .collect()
}

/// Confusion matrix over out-of-fold predictions from the first repeat, so
/// every row is predicted exactly once.
pub fn out_of_fold_confusion(
    x: &[Vec<f64>],
    y: &[usize],
    params: &ForestParams,
    folds: &[Fold],
) -> Result<ConfusionMatrix> {
    let first: Vec<&Fold> = folds.iter().filter(|f| f.repeat == 0).collect();
    let pairs: Vec<Vec<(usize, usize)>> = first
        .par_iter()
        .map(|fold| -> Result<Vec<(usize, usize)>> {
            let model = ShotPipeline::fit(x, y, &fold.train, params)?;
            Ok(fold
                .test
                .iter()
                .map(|i| (y[*i], model.predict(&x[*i])))
                .collect())
        })
        .collect::<Result<_>>()?;

    let mut matrix = ConfusionMatrix::new();
    for (truth, predicted) in pairs.into_iter().flatten() {
        matrix.record(truth, predicted);
    }
    Ok(matrix)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub split_scores: Vec<f64>,
}

/// The three candidates scored side by side by `compare`.
pub fn named_candidates(seed: u64) -> Vec<(String, ForestParams)> {
    let rf = ForestParams {
        n_estimators: 10,
        ..ForestParams::default()
    }
    .with_seed(seed);
    vec![
        (
            "BalancedBaggingClassifier".to_string(),
            ForestParams::balanced_bagging().with_seed(seed),
        ),
        (
            "RandomForestClassWeight".to_string(),
            ForestParams {
                class_weight: ClassWeightMode::Balanced,
                ..rf
            },
        ),
        (
            "RandomForestBootstrapClassWeight".to_string(),
            ForestParams {
                class_weight: ClassWeightMode::BalancedSubsample,
                ..rf
            },
        ),
    ]
}

pub fn compare_models(
    x: &[Vec<f64>],
    y: &[usize],
    candidates: &[(String, ForestParams)],
    folds: &[Fold],
) -> Result<Vec<ModelScore>> {
    let mut out = Vec::with_capacity(candidates.len());
    for (name, params) in candidates {
        let scores = cross_val_scores(x, y, params, folds)?;
        let (mean, std) = mean_std(&scores);
        info!(model = %name, mean, std, "cross-validated");
        out.push(ModelScore {
            model: name.clone(),
            mean_accuracy: mean,
            std_accuracy: std,
            split_scores: scores,
        });
    }
    Ok(out)
}

pub fn scores_table(scores: &[ModelScore]) -> String {
    let width = scores.iter().map(|s| s.model.len()).max().unwrap_or(5).max(5);
    let mut out = format!("| {:width$} | mean   | std    |\n", "model");
    out.push_str(&format!("|{}|--------|--------|\n", "-".repeat(width + 2)));
    for s in scores {
        out.push_str(&format!(
            "| {:width$} | {:.4} | {:.4} |\n",
            s.model, s.mean_accuracy, s.std_accuracy
        ));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl GridParams {
    pub fn apply(self, base: &ForestParams) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: Some(self.max_depth),
            min_samples_leaf: self.min_samples_leaf,
            ..*base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: (10..=35).step_by(5).collect(),
            max_depth: (5..=25).step_by(5).collect(),
            min_samples_leaf: (1..=5).collect(),
        }
    }
}

impl ParamGrid {
    /// Cartesian product, `min_samples_leaf` varying fastest.
    pub fn candidates(&self) -> Vec<GridParams> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_leaf in &self.min_samples_leaf {
                    out.push(GridParams {
                        n_estimators,
                        max_depth,
                        min_samples_leaf,
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRow {
    pub params: GridParams,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    pub rank_test_score: usize,
    pub split_scores: Vec<f64>,
}

/// Dense-from-one ranking by descending mean; tied means share the smallest rank.
pub fn rank_rows(rows: &mut [GridRow]) {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|a, b| rows[*b].mean_test_score.total_cmp(&rows[*a].mean_test_score));
    let mut prev: Option<(f64, usize)> = None;
    for (pos, idx) in order.into_iter().enumerate() {
        let score = rows[idx].mean_test_score;
        let rank = match prev {
            Some((p, r)) if p == score => r,
            _ => pos + 1,
        };
        rows[idx].rank_test_score = rank;
        prev = Some((score, rank));
    }
}

pub fn grid_search(
    x: &[Vec<f64>],
    y: &[usize],
    grid: &ParamGrid,
    base: &ForestParams,
    folds: &[Fold],
) -> Result<Vec<GridRow>> {
    let candidates = grid.candidates();
    if candidates.is_empty() {
        bail!("parameter grid is empty");
    }
    info!(candidates = candidates.len(), folds = folds.len(), "grid search");

    let mut rows = candidates
        .par_iter()
        .map(|params| -> Result<GridRow> {
            let scores = cross_val_scores(x, y, &params.apply(base), folds)?;
            let (mean, std) = mean_std(&scores);
            debug!(?params, mean, "candidate scored");
            Ok(GridRow {
                params: *params,
                mean_test_score: mean,
                std_test_score: std,
                rank_test_score: 0,
                split_scores: scores,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    rank_rows(&mut rows);
    Ok(rows)
}

/// First row in grid order among those ranked 1.
pub fn best_row(rows: &[GridRow]) -> Option<&GridRow> {
    rows.iter().find(|r| r.rank_test_score == 1)
}

pub fn default_search_base(seed: u64) -> ForestParams {
    ForestParams {
        max_features: MaxFeatures::Sqrt,
        class_weight: ClassWeightMode::Balanced,
        ..ForestParams::default()
    }
    .with_seed(seed)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub params: ForestParams,
    pub mean_test_score: f64,
    pub confusion: ConfusionMatrix,
    pub pipeline: ShotPipeline,
}

impl ShotModelArtifact {
    pub fn new(
        params: ForestParams,
        mean_test_score: f64,
        confusion: ConfusionMatrix,
        pipeline: ShotPipeline,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            classes: EventKind::ALL.iter().map(|e| e.label().to_string()).collect(),
            params,
            mean_test_score,
            confusion,
            pipeline,
        }
    }

    pub fn predict_event(&self, features: &[f64]) -> Option<EventKind> {
        EventKind::from_index(self.pipeline.predict(features))
    }
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let raw = serde_json::to_string_pretty(value).context("serialize json")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<ShotModelArtifact> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let artifact: ShotModelArtifact =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    if artifact.version != ARTIFACT_VERSION {
        bail!(
            "artifact version {} not supported (expected {ARTIFACT_VERSION})",
            artifact.version
        );
    }
    Ok(artifact)
}
