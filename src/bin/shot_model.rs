use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use nhl_explorer::logging;
use nhl_explorer::model_search::{
    self, COMPARE_SEED, MODEL_SEED, ParamGrid, SEARCH_SEED, ShotModelArtifact, ShotPipeline,
};
use nhl_explorer::play_dataset;

const DEFAULT_FEATURES: &str = "SavedData/model_df.parquet";

#[derive(Parser)]
#[command(name = "shot_model")]
#[command(about = "Offline shot-outcome model: extract features, compare models, grid search", long_about = None)]
struct Cli {
    /// Worker threads for cross-validation (defaults to one per core)
    #[arg(long, global = true, env = "NHL_TRAIN_THREADS")]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull shot events from the play-by-play database into a Parquet feature table
    Extract {
        #[arg(long, env = "NHL_PLAYS_DB", default_value = "nhl-data.db")]
        db: PathBuf,
        #[arg(long, default_value = DEFAULT_FEATURES)]
        out: PathBuf,
    },
    /// Cross-validate the candidate classifiers and report mean accuracy
    Compare {
        #[arg(long, default_value = DEFAULT_FEATURES)]
        features: PathBuf,
        #[arg(long, default_value_t = 5)]
        splits: usize,
        #[arg(long, default_value_t = 2)]
        repeats: usize,
        #[arg(long, default_value_t = COMPARE_SEED)]
        seed: u64,
        /// Also write the scores as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Grid-search forest hyperparameters, then refit and save the best model
    Search {
        #[arg(long, default_value = DEFAULT_FEATURES)]
        features: PathBuf,
        #[arg(long, env = "NHL_MODEL_DIR", default_value = "SavedModels")]
        out_dir: PathBuf,
        #[arg(long, value_delimiter = ',')]
        n_estimators: Vec<usize>,
        #[arg(long, value_delimiter = ',')]
        max_depth: Vec<usize>,
        #[arg(long, value_delimiter = ',')]
        min_samples_leaf: Vec<usize>,
        #[arg(long, default_value_t = 5)]
        splits: usize,
        #[arg(long, default_value_t = 2)]
        repeats: usize,
        #[arg(long, default_value_t = SEARCH_SEED)]
        seed: u64,
        #[arg(long, default_value_t = MODEL_SEED)]
        model_seed: u64,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_stderr_logging();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads.filter(|n| *n > 0) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configure rayon pool")?;
    }

    match cli.command {
        Commands::Extract { db, out } => run_extract(&db, &out),
        Commands::Compare {
            features,
            splits,
            repeats,
            seed,
            out,
        } => run_compare(&features, splits, repeats, seed, out.as_deref()),
        Commands::Search {
            features,
            out_dir,
            n_estimators,
            max_depth,
            min_samples_leaf,
            splits,
            repeats,
            seed,
            model_seed,
        } => {
            let defaults = ParamGrid::default();
            let grid = ParamGrid {
                n_estimators: or_default(n_estimators, defaults.n_estimators),
                max_depth: or_default(max_depth, defaults.max_depth),
                min_samples_leaf: or_default(min_samples_leaf, defaults.min_samples_leaf),
            };
            run_search(&features, &out_dir, &grid, splits, repeats, seed, model_seed)
        }
    }
}

fn or_default(values: Vec<usize>, fallback: Vec<usize>) -> Vec<usize> {
    if values.is_empty() { fallback } else { values }
}

fn run_extract(db: &Path, out: &Path) -> Result<()> {
    let conn = play_dataset::open_db(db)?;
    let extract = play_dataset::extract_plays(&conn)?;
    if extract.rows.is_empty() {
        return Err(anyhow!("query returned no usable rows from {}", db.display()));
    }
    play_dataset::write_feature_table(out, &extract.rows)?;
    println!(
        "feature table written: {} ({} rows, {} skipped)",
        out.display(),
        extract.rows.len(),
        extract.skipped
    );
    Ok(())
}

fn load_design(features: &Path) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    let rows = play_dataset::read_feature_table(features)?;
    if rows.is_empty() {
        return Err(anyhow!("feature table {} is empty", features.display()));
    }
    info!(rows = rows.len(), path = %features.display(), "loaded feature table");
    Ok(play_dataset::design_matrix(&rows))
}

fn run_compare(
    features: &Path,
    splits: usize,
    repeats: usize,
    seed: u64,
    out: Option<&Path>,
) -> Result<()> {
    let (x, y) = load_design(features)?;
    let folds = model_search::repeated_stratified_kfold(&y, splits, repeats, seed)?;
    let candidates = model_search::named_candidates(MODEL_SEED);
    let scores = model_search::compare_models(&x, &y, &candidates, &folds)?;

    for s in &scores {
        println!(
            "{}---Mean Accuracy: {:.3} ({:.3})",
            s.model, s.mean_accuracy, s.std_accuracy
        );
    }
    println!();
    print!("{}", model_search::scores_table(&scores));

    if let Some(path) = out {
        model_search::save_json(path, &scores)?;
        println!("scores written: {}", path.display());
    }
    Ok(())
}

fn run_search(
    features: &Path,
    out_dir: &Path,
    grid: &ParamGrid,
    splits: usize,
    repeats: usize,
    seed: u64,
    model_seed: u64,
) -> Result<()> {
    let (x, y) = load_design(features)?;
    let folds = model_search::repeated_stratified_kfold(&y, splits, repeats, seed)?;
    let base = model_search::default_search_base(model_seed);

    let rows = model_search::grid_search(&x, &y, grid, &base, &folds)?;
    let grid_path = out_dir.join("grid_results.json");
    model_search::save_json(&grid_path, &rows)?;
    println!("grid results written: {}", grid_path.display());

    let best = model_search::best_row(&rows).ok_or_else(|| anyhow!("grid produced no ranked rows"))?;
    let params = best.params.apply(&base);
    println!(
        "best: n_estimators={} max_depth={} min_samples_leaf={} mean={:.4} std={:.4}",
        best.params.n_estimators,
        best.params.max_depth,
        best.params.min_samples_leaf,
        best.mean_test_score,
        best.std_test_score
    );

    let confusion = model_search::out_of_fold_confusion(&x, &y, &params, &folds)?;
    print!("{}", confusion.to_text());
    if (confusion.accuracy() - best.mean_test_score).abs() > 0.05 {
        warn!(
            oof = confusion.accuracy(),
            cv = best.mean_test_score,
            "out-of-fold accuracy drifts from the cross-validated mean"
        );
    }

    let all_rows: Vec<usize> = (0..y.len()).collect();
    let pipeline = ShotPipeline::fit(&x, &y, &all_rows, &params)?;
    let artifact = ShotModelArtifact::new(params, best.mean_test_score, confusion, pipeline);
    let model_path = out_dir.join("best_rf.json");
    model_search::save_json(&model_path, &artifact)?;
    println!("model written: {}", model_path.display());
    Ok(())
}
