use anyhow::{Result, bail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Goal, Shot, Missed Shot.
pub const N_CLASSES: usize = 3;

const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeightMode {
    Uniform,
    /// Inverse class frequency over the training rows.
    Balanced,
    /// Inverse class frequency over each tree's bootstrap draw.
    BalancedSubsample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    Bootstrap,
    /// Undersample every class to the rarest class, then bootstrap.
    BalancedUndersample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).clamp(1, n_features.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeightMode,
    pub sampling: Sampling,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeightMode::Uniform,
            sampling: Sampling::Bootstrap,
            seed: 0,
        }
    }
}

impl ForestParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bagged full-depth trees over class-balanced undersamples.
    pub fn balanced_bagging() -> Self {
        Self {
            n_estimators: 10,
            max_features: MaxFeatures::All,
            sampling: Sampling::BalancedUndersample,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        proba: [f64; N_CLASSES],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn predict_proba(&self, row: &[f64]) -> [f64; N_CLASSES] {
        let mut at = 0usize;
        loop {
            match self.nodes.get(at) {
                Some(TreeNode::Leaf { proba }) => return *proba,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    at = if v <= *threshold { *left } else { *right };
                }
                None => return [1.0 / N_CLASSES as f64; N_CLASSES],
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], at: usize) -> usize {
            match nodes.get(at) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeSettings {
    max_depth: usize,
    min_samples_leaf: usize,
    max_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

fn gini(weights: &[f64; N_CLASSES]) -> (f64, f64) {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    let sum_sq: f64 = weights.iter().map(|w| (w / total).powi(2)).sum();
    (1.0 - sum_sq, total)
}

fn class_totals(rows: &[usize], y: &[usize], class_weight: &[f64; N_CLASSES]) -> [f64; N_CLASSES] {
    let mut totals = [0.0; N_CLASSES];
    for &i in rows {
        totals[y[i]] += class_weight[y[i]];
    }
    totals
}

fn best_split(
    x: &[Vec<f64>],
    y: &[usize],
    rows: &[usize],
    class_weight: &[f64; N_CLASSES],
    settings: &TreeSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let n_features = x.get(rows[0]).map(Vec::len).unwrap_or(0);
    if n_features == 0 {
        return None;
    }
    let parent = class_totals(rows, y, class_weight);
    let (parent_gini, parent_weight) = gini(&parent);
    let leaf = settings.min_samples_leaf.max(1);

    let mut best: Option<SplitCandidate> = None;
    // Draw features in random order; past `max_features`, keep drawing only
    // while every feature so far was constant.
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);
    let mut order = rows.to_vec();
    for (visited, feature) in features.into_iter().enumerate() {
        if visited >= settings.max_features && best.is_some() {
            break;
        }
        order.sort_by(|a, b| x[*a][feature].total_cmp(&x[*b][feature]));

        let mut left = [0.0; N_CLASSES];
        for pos in 0..order.len() - 1 {
            let i = order[pos];
            left[y[i]] += class_weight[y[i]];
            let here = x[i][feature];
            let next = x[order[pos + 1]][feature];
            if here == next {
                continue;
            }
            let n_left = pos + 1;
            if n_left < leaf || order.len() - n_left < leaf {
                continue;
            }
            let mut right = parent;
            for c in 0..N_CLASSES {
                right[c] -= left[c];
            }
            let (gini_l, w_l) = gini(&left);
            let (gini_r, w_r) = gini(&right);
            let decrease = parent_gini * parent_weight - (gini_l * w_l + gini_r * w_r);
            if decrease <= MIN_IMPURITY_DECREASE {
                continue;
            }
            if best.as_ref().is_none_or(|b| decrease > b.decrease) {
                let mid = here + (next - here) / 2.0;
                let threshold = if mid < next { mid } else { here };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    decrease,
                });
            }
        }
    }
    best
}

fn normalized(totals: [f64; N_CLASSES]) -> [f64; N_CLASSES] {
    let sum: f64 = totals.iter().sum();
    if sum <= 0.0 {
        return [1.0 / N_CLASSES as f64; N_CLASSES];
    }
    totals.map(|w| w / sum)
}

// In-place partition; returns the size of the `<= threshold` half.
fn partition(rows: &mut [usize], x: &[Vec<f64>], feature: usize, threshold: f64) -> usize {
    let mut split = 0;
    for i in 0..rows.len() {
        if x[rows[i]][feature] <= threshold {
            rows.swap(i, split);
            split += 1;
        }
    }
    split
}

fn grow_tree(
    x: &[Vec<f64>],
    y: &[usize],
    mut rows: Vec<usize>,
    class_weight: &[f64; N_CLASSES],
    settings: &TreeSettings,
    rng: &mut StdRng,
) -> DecisionTree {
    let mut nodes = vec![TreeNode::Leaf {
        proba: [0.0; N_CLASSES],
    }];
    let mut stack = vec![(0usize, 0usize, rows.len(), 0usize)];

    while let Some((slot, start, end, depth)) = stack.pop() {
        let totals = class_totals(&rows[start..end], y, class_weight);
        let pure = totals.iter().filter(|w| **w > 0.0).count() <= 1;
        let splittable = !pure
            && depth < settings.max_depth
            && end - start >= 2 * settings.min_samples_leaf.max(1);

        let split = if splittable {
            best_split(x, y, &rows[start..end], class_weight, settings, rng)
        } else {
            None
        };

        let Some(split) = split else {
            nodes[slot] = TreeNode::Leaf {
                proba: normalized(totals),
            };
            continue;
        };

        let mid = start + partition(&mut rows[start..end], x, split.feature, split.threshold);
        let left = nodes.len();
        let right = left + 1;
        nodes.push(TreeNode::Leaf {
            proba: [0.0; N_CLASSES],
        });
        nodes.push(TreeNode::Leaf {
            proba: [0.0; N_CLASSES],
        });
        nodes[slot] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        stack.push((right, mid, end, depth + 1));
        stack.push((left, start, mid, depth + 1));
    }

    DecisionTree { nodes }
}

/// `n / (k * n_c)` over the classes present in `rows`; absent classes keep weight 1.
pub fn balanced_class_weight(y: &[usize], rows: &[usize]) -> [f64; N_CLASSES] {
    let mut counts = [0usize; N_CLASSES];
    for &i in rows {
        counts[y[i]] += 1;
    }
    let present = counts.iter().filter(|c| **c > 0).count().max(1);
    let n = rows.len() as f64;
    counts.map(|c| {
        if c == 0 {
            1.0
        } else {
            n / (present as f64 * c as f64)
        }
    })
}

fn bootstrap(pool: &[usize], rng: &mut StdRng) -> Vec<usize> {
    (0..pool.len())
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect()
}

fn undersample(y: &[usize], rows: &[usize], rng: &mut StdRng) -> Vec<usize> {
    let mut by_class: [Vec<usize>; N_CLASSES] = Default::default();
    for &i in rows {
        by_class[y[i]].push(i);
    }
    let floor = by_class
        .iter()
        .map(Vec::len)
        .filter(|n| *n > 0)
        .min()
        .unwrap_or(0);
    let mut out = Vec::with_capacity(floor * N_CLASSES);
    for class_rows in &by_class {
        out.extend(class_rows.choose_multiple(rng, floor).copied());
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fits on the subset `rows` of `x`/`y`. Trees are grown in parallel, each
    /// from its own seed, so the result does not depend on thread scheduling.
    pub fn fit(x: &[Vec<f64>], y: &[usize], rows: &[usize], params: &ForestParams) -> Result<Self> {
        if rows.is_empty() {
            bail!("no training rows");
        }
        if params.n_estimators == 0 {
            bail!("n_estimators must be at least 1");
        }
        if let Some(bad) = rows.iter().find(|i| y.get(**i).is_none_or(|c| *c >= N_CLASSES)) {
            bail!("row {bad} has no valid class label");
        }
        let n_features = x[rows[0]].len();
        let settings = TreeSettings {
            max_depth: params.max_depth.unwrap_or(usize::MAX),
            min_samples_leaf: params.min_samples_leaf.max(1),
            max_features: params.max_features.resolve(n_features),
        };
        let global_weight = match params.class_weight {
            ClassWeightMode::Balanced => balanced_class_weight(y, rows),
            _ => [1.0; N_CLASSES],
        };

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let sample = match params.sampling {
                    Sampling::Bootstrap => bootstrap(rows, &mut rng),
                    Sampling::BalancedUndersample => {
                        let pool = undersample(y, rows, &mut rng);
                        bootstrap(&pool, &mut rng)
                    }
                };
                let weight = match params.class_weight {
                    ClassWeightMode::BalancedSubsample => balanced_class_weight(y, &sample),
                    _ => global_weight,
                };
                grow_tree(x, y, sample, &weight, &settings, &mut rng)
            })
            .collect();

        Ok(Self {
            params: *params,
            n_features,
            trees,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> [f64; N_CLASSES] {
        let mut acc = [0.0; N_CLASSES];
        for tree in &self.trees {
            let p = tree.predict_proba(row);
            for c in 0..N_CLASSES {
                acc[c] += p[c];
            }
        }
        let n = self.trees.len().max(1) as f64;
        acc.map(|v| v / n)
    }

    /// Most probable class; ties go to the lower index.
    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }
}

pub fn argmax(values: &[f64; N_CLASSES]) -> usize {
    let mut best = 0;
    for c in 1..N_CLASSES {
        if values[c] > values[best] {
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.1;
            x.push(vec![0.0 + jitter, 5.0]);
            y.push(0);
            x.push(vec![10.0 + jitter, 5.0]);
            y.push(1);
            x.push(vec![20.0 + jitter, 5.0]);
            y.push(2);
        }
        (x, y)
    }

    #[test]
    fn forest_learns_separable_classes() {
        let (x, y) = separable();
        let rows: Vec<usize> = (0..x.len()).collect();
        let params = ForestParams {
            n_estimators: 5,
            max_features: MaxFeatures::All,
            ..ForestParams::default()
        }
        .with_seed(7);
        let forest = RandomForest::fit(&x, &y, &rows, &params).unwrap();
        assert_eq!(forest.predict(&[0.2, 5.0]), 0);
        assert_eq!(forest.predict(&[10.1, 5.0]), 1);
        assert_eq!(forest.predict(&[19.9, 5.0]), 2);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = separable();
        let rows: Vec<usize> = (0..x.len()).collect();
        let params = ForestParams {
            n_estimators: 4,
            class_weight: ClassWeightMode::BalancedSubsample,
            ..ForestParams::default()
        }
        .with_seed(3);
        let a = RandomForest::fit(&x, &y, &rows, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &rows, &params).unwrap();
        let a_nodes: Vec<_> = a.trees.iter().map(|t| t.nodes.clone()).collect();
        let b_nodes: Vec<_> = b.trees.iter().map(|t| t.nodes.clone()).collect();
        assert_eq!(a_nodes, b_nodes);
    }

    #[test]
    fn max_depth_bounds_tree_depth() {
        let (x, y) = separable();
        let rows: Vec<usize> = (0..x.len()).collect();
        let params = ForestParams {
            n_estimators: 3,
            max_depth: Some(1),
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, &rows, &params).unwrap();
        assert!(forest.trees.iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn balanced_weight_inverts_frequency() {
        let y = vec![0, 0, 0, 1];
        let rows: Vec<usize> = (0..4).collect();
        let w = balanced_class_weight(&y, &rows);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert_eq!(w[2], 1.0);
    }

    #[test]
    fn undersample_equalises_classes() {
        let y = vec![0, 0, 0, 0, 1, 1, 2, 2, 2];
        let rows: Vec<usize> = (0..y.len()).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let sample = undersample(&y, &rows, &mut rng);
        let mut counts = [0; N_CLASSES];
        for i in sample {
            counts[y[i]] += 1;
        }
        assert_eq!(counts, [2, 2, 2]);
    }

    #[test]
    fn fit_rejects_empty_rows() {
        let (x, y) = separable();
        assert!(RandomForest::fit(&x, &y, &[], &ForestParams::default()).is_err());
    }
}
