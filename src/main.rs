//! rust_rfpipe command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_rfpipe::cli::{Cli, Commands, InputArgs, QcArgs};
use rust_rfpipe::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["qc", "select", "train", "classify", "help"];
    let has_subcommand = first_positional.is_some_and(|a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_rfpipe {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Qc { input, qc, output }) => run_qc(&input, &qc, &output),
        Some(Commands::Select {
            input,
            qc,
            alpha,
            output,
        }) => run_select(&input, &qc, alpha, &output),
        Some(Commands::Train {
            input,
            qc,
            alpha,
            trees,
            max_depth,
            mtry,
            min_node_size,
            train_fraction,
            schedule,
            max_rounds,
            seed,
            labels,
            output,
            importance,
            metrics,
            threads,
        }) => {
            let overrides = TrainOverrides {
                alpha,
                trees,
                max_depth,
                mtry,
                min_node_size,
                train_fraction,
                schedule,
                max_rounds,
                seed,
                labels,
                threads,
            };
            run_train(&input, &qc, overrides, &output, &importance, &metrics)
        }
        Some(Commands::Classify {
            model,
            input,
            qc,
            output,
            confusion,
            threads,
        }) => run_classify(&model, &input, &qc, &output, &confusion, threads),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_rfpipe v{}", VERSION);
    println!("Run `rust_rfpipe -h` for usage or `rust_rfpipe --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_rfpipe v{}", VERSION);
    println!();
    println!("Usage: rust_rfpipe <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  qc         Correlation clustering sample QC");
    println!("  select     QC plus ANOVA feature selection");
    println!("  train      Full pipeline: QC, selection, random forest, pruning");
    println!("  classify   Classify new samples with a trained model");
    println!();
    println!("Run `rust_rfpipe <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_rfpipe v{}", VERSION);
    println!("Sample QC clustering and class-imbalance-aware random forest classification");
    println!();
    println!("Usage: rust_rfpipe <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  qc         Correlation clustering sample QC");
    println!("               - Pearson 1 - r distances within every class");
    println!("               - complete, average or single linkage");
    println!("               - largest cluster kept, under-sized classes dropped");
    println!("  select     QC plus one-way ANOVA with Benjamini-Hochberg adjustment");
    println!("  train      Full pipeline");
    println!("               - inverse-frequency class weights for the bootstrap");
    println!("               - random forest with OOB permutation importance");
    println!("               - feature pruning over a schedule of rounds");
    println!("  classify   Classify new samples with a trained model (JSON)");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_rfpipe qc -e expression.tsv -m samples.tsv -o retained.tsv");
    println!();
    println!("  rust_rfpipe train -e expression.tsv -m samples.tsv -o model.json \\");
    println!("    --trees 500 --schedule 2000,200");
    println!();
    println!("  rust_rfpipe classify --model model.json -e external.tsv -m external_samples.tsv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// `train` flags that override the configuration file
struct TrainOverrides {
    alpha: Option<f64>,
    trees: Option<usize>,
    max_depth: Option<usize>,
    mtry: Option<usize>,
    min_node_size: Option<usize>,
    train_fraction: Option<f64>,
    schedule: Option<Vec<usize>>,
    max_rounds: Option<usize>,
    seed: Option<u32>,
    labels: Option<Vec<String>>,
    threads: Option<usize>,
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

/// Configuration file (or defaults) with QC flags applied
fn load_config(input: &InputArgs, qc: &QcArgs) -> Result<PipelineConfig> {
    let mut config = match &input.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(h) = qc.cut_height {
        config.correlation_cut_height = h;
    }
    if let Some(n) = qc.min_group_size {
        config.min_group_size = n;
    }
    if let Some(linkage) = &qc.linkage {
        config.linkage = linkage.parse()?;
    }
    Ok(config)
}

fn load_dataset(input: &InputArgs, config: &PipelineConfig) -> Result<LabeledDataset> {
    info!("Loading expression table from: {}", input.expression);
    let matrix = read_expression_matrix(&input.expression, input.features_as_rows)?;
    info!("  {} samples, {} features", matrix.n_samples(), matrix.n_features());

    let label_set = match &config.label_order {
        Some(order) => Some(LabelSet::new(order.clone())?),
        None => None,
    };

    info!("Loading metadata from: {}", input.metadata);
    let metadata = read_metadata(
        &input.metadata,
        &input.class_column,
        &input.batch_column,
        label_set,
    )?;
    info!("  classes: {:?}", metadata.label_set().labels());

    LabeledDataset::new(matrix, metadata)
}

fn run_qc(input: &InputArgs, qc: &QcArgs, output_path: &str) -> Result<()> {
    let config = load_config(input, qc)?;
    config.validate()?;
    let dataset = load_dataset(input, &config)?;

    let outcome = config.correlation_filter().apply(&dataset)?;
    info!(
        "Retained {} of {} samples, {} classes dropped",
        outcome.dataset.n_samples(),
        dataset.n_samples(),
        outcome.dropped.len()
    );

    info!("Writing retained samples to: {}", output_path);
    write_retained_samples(output_path, &outcome)?;
    info!("Done!");
    Ok(())
}

fn run_select(input: &InputArgs, qc: &QcArgs, alpha: Option<f64>, output_path: &str) -> Result<()> {
    let mut config = load_config(input, qc)?;
    if let Some(a) = alpha {
        config.anova_alpha = a;
    }
    config.validate()?;
    configure_threads(config.threads);
    let dataset = load_dataset(input, &config)?;

    let outcome = config.correlation_filter().apply(&dataset)?;
    let table = anova_select(&outcome.dataset, config.anova_alpha)?;

    info!("Writing ANOVA table to: {}", output_path);
    write_selection(output_path, &table)?;
    info!("Done! {} features selected.", table.selected.len());
    Ok(())
}

fn run_train(
    input: &InputArgs,
    qc: &QcArgs,
    overrides: TrainOverrides,
    model_path: &str,
    importance_path: &str,
    metrics_path: &str,
) -> Result<()> {
    let mut config = load_config(input, qc)?;
    if let Some(a) = overrides.alpha {
        config.anova_alpha = a;
    }
    if let Some(t) = overrides.trees {
        config.tree_count = t;
    }
    if let Some(d) = overrides.max_depth {
        config.max_depth = d;
    }
    if overrides.mtry.is_some() {
        config.split_candidates = overrides.mtry;
    }
    if let Some(n) = overrides.min_node_size {
        config.min_node_size = n;
    }
    if let Some(f) = overrides.train_fraction {
        config.train_fraction = f;
    }
    if let Some(schedule) = overrides.schedule {
        config.prune_schedule = schedule;
    }
    if overrides.max_rounds.is_some() {
        config.max_rounds = overrides.max_rounds;
    }
    if let Some(seed) = overrides.seed {
        config.random_seed = seed;
    }
    if overrides.labels.is_some() {
        config.label_order = overrides.labels;
    }
    if let Some(t) = overrides.threads {
        config.threads = t;
    }
    config.validate()?;
    configure_threads(config.threads);

    let dataset = load_dataset(input, &config)?;
    let result = run_pipeline(&dataset, &config)?;

    for round in &result.pruning.rounds {
        info!(
            "Round {}: {} features, mtry {}, accuracy {:.4}, kappa {:.4}",
            round.index,
            round.n_features,
            round.split_candidates,
            round.performance.accuracy,
            round.performance.kappa
        );
    }
    info!("Final held-out performance:{}", result.pruning.final_round().performance);

    info!("Writing model to: {}", model_path);
    save_model(model_path, &result.pruning.model)?;
    info!("Writing feature importance to: {}", importance_path);
    write_importance(importance_path, result.pruning.importance())?;
    info!("Writing round metrics to: {}", metrics_path);
    write_round_metrics(metrics_path, &result.pruning.rounds)?;

    info!("Done!");
    Ok(())
}

fn run_classify(
    model_path: &str,
    input: &InputArgs,
    qc: &QcArgs,
    output_path: &str,
    confusion_path: &str,
    threads: Option<usize>,
) -> Result<()> {
    let mut config = load_config(input, qc)?;
    if let Some(t) = threads {
        config.threads = t;
    }
    config.validate()?;
    configure_threads(config.threads);

    info!("Loading model from: {}", model_path);
    let model = load_model(model_path)?;
    info!(
        "  {} trees, {} features, classes {:?}",
        model.n_trees(),
        model.feature_schema().len(),
        model.label_set().labels()
    );

    // Recorded classes of new data may lie outside the model's label set
    let external_config = PipelineConfig {
        label_order: None,
        ..config.clone()
    };
    let dataset = load_dataset(input, &external_config)?;

    let classifier = ExternalClassifier::new(&model, config.correlation_filter());
    let prediction = classifier.classify(&dataset)?;

    info!("Writing predictions to: {}", output_path);
    write_predictions(output_path, &prediction)?;

    if let Some(confusion) = &prediction.confusion {
        info!(
            "Generalization accuracy: {:.4} ({}/{})",
            confusion.accuracy(),
            confusion.correct(),
            confusion.total()
        );
        info!("Writing confusion matrix to: {}", confusion_path);
        write_confusion(confusion_path, confusion)?;
    }

    info!("Done! {} samples classified.", prediction.predictions.len());
    Ok(())
}
