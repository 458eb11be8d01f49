//! Command-line interface for rust_rfpipe

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_rfpipe")]
#[command(version)]
#[command(about = "Sample QC clustering and random forest classification of expression data")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Input tables shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to expression table (CSV or TSV)
    #[arg(short, long,
        long_help = "Path to the normalized, log-scale expression table.\n\
            Format: first column = sample IDs, header row = feature IDs.\n\
            Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
    pub expression: String,

    /// Expression table is features x samples
    #[arg(long,
        long_help = "Read the expression table transposed: first column = feature IDs,\n\
            header row = sample IDs (the usual genes x samples layout).")]
    pub features_as_rows: bool,

    /// Path to sample metadata table (CSV or TSV)
    #[arg(short, long,
        long_help = "Path to the sample metadata table.\n\
            Format: first column = sample IDs (matching the expression table),\n\
            plus a class column and a batch column.")]
    pub metadata: String,

    /// Metadata column holding the class label [default: class]
    #[arg(long, default_value = "class")]
    pub class_column: String,

    /// Metadata column holding the batch id [default: batch]
    #[arg(long, default_value = "batch")]
    pub batch_column: String,

    /// JSON configuration file
    #[arg(long,
        long_help = "JSON configuration file. Keys not present take their defaults;\n\
            flags given on the command line override the file.")]
    pub config: Option<String>,
}

/// Correlation QC overrides
#[derive(Args, Debug, Clone, Default)]
pub struct QcArgs {
    /// Dendrogram cut height in 1 - r units [default: 0.25]
    #[arg(long)]
    pub cut_height: Option<f64>,

    /// Minimum samples per class [default: 5]
    #[arg(long)]
    pub min_group_size: Option<usize>,

    /// Linkage criterion: complete, average, single [default: complete]
    #[arg(long)]
    pub linkage: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Correlation clustering QC only
    #[command(
        long_about = "Correlation clustering QC.\n\n\
            For every class, clusters samples on 1 - Pearson r, cuts the dendrogram\n\
            and keeps the largest cluster. Writes the retained samples with their\n\
            class and batch, ready for batch correction.",
        after_long_help = "\
Examples:
  rust_rfpipe qc -e expression.tsv -m samples.tsv -o retained.tsv
  rust_rfpipe qc -e genes_by_samples.tsv --features-as-rows -m samples.tsv \\
    --cut-height 0.2 --linkage average"
    )]
    Qc {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        qc: QcArgs,

        /// Output file path [default: retained_samples.tsv]
        #[arg(short, long, default_value = "retained_samples.tsv")]
        output: String,
    },

    /// QC plus ANOVA feature selection
    #[command(
        long_about = "QC plus one-way ANOVA feature selection.\n\n\
            Tests every feature against the class label, adjusts p-values with\n\
            Benjamini-Hochberg and writes F, p and adjusted p for every feature.",
        after_long_help = "\
Examples:
  rust_rfpipe select -e expression.tsv -m samples.tsv -o anova.tsv --alpha 0.01"
    )]
    Select {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        qc: QcArgs,

        /// Adjusted p-value threshold [default: 0.05]
        #[arg(short, long)]
        alpha: Option<f64>,

        /// Output file path [default: anova_selection.tsv]
        #[arg(short, long, default_value = "anova_selection.tsv")]
        output: String,
    },

    /// Full training pipeline
    #[command(
        long_about = "Full training pipeline.\n\n\
            QC, ANOVA selection, class-weighted random forest, permutation\n\
            importance and schedule-driven feature pruning. Writes the final model\n\
            (JSON), its ranked features and per-round held-out metrics.",
        after_long_help = "\
Examples:
  rust_rfpipe train -e expression.tsv -m samples.tsv -o model.json

  # Smaller forest, custom pruning schedule
  rust_rfpipe train -e expression.tsv -m samples.tsv -o model.json \\
    --trees 500 --schedule 2000,200 --seed 7

  # Explicit class order
  rust_rfpipe train -e expression.tsv -m samples.tsv \\
    --labels M0,IFN,LPS,LPS_IFN -t 8"
    )]
    Train {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        qc: QcArgs,

        /// Adjusted p-value threshold [default: 0.05]
        #[arg(short, long)]
        alpha: Option<f64>,

        /// Number of trees [default: 1500]
        #[arg(long)]
        trees: Option<usize>,

        /// Maximum tree depth [default: 15]
        #[arg(long)]
        max_depth: Option<usize>,

        /// Features tried per split [default: ceil(sqrt(features))]
        #[arg(long)]
        mtry: Option<usize>,

        /// Minimum samples per child node [default: 1]
        #[arg(long)]
        min_node_size: Option<usize>,

        /// Fraction of samples used for training [default: 0.7]
        #[arg(long)]
        train_fraction: Option<f64>,

        /// Pruning schedule, comma separated [default: 10000,1000]
        #[arg(long, value_delimiter = ',')]
        schedule: Option<Vec<usize>>,

        /// Maximum number of pruning rounds
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Random seed [default: 42]
        #[arg(long)]
        seed: Option<u32>,

        /// Class label order, comma separated
        #[arg(long, value_delimiter = ',',
            long_help = "Class label order, comma separated (e.g. M0,IFN,LPS,LPS_IFN).\n\
                Without this, classes are ordered by first appearance in the metadata.")]
        labels: Option<Vec<String>>,

        /// Model output path [default: model.json]
        #[arg(short, long, default_value = "model.json")]
        output: String,

        /// Ranked feature importance output [default: importance.tsv]
        #[arg(long, default_value = "importance.tsv")]
        importance: String,

        /// Per-round metrics output [default: rounds.tsv]
        #[arg(long, default_value = "rounds.tsv")]
        metrics: String,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },

    /// Classify new samples with a trained model
    #[command(
        long_about = "Classify independently collected samples.\n\n\
            The new data passes its own correlation QC, is aligned to the model's\n\
            feature schema and classified by majority vote. When every recorded\n\
            class is one the model knows, a confusion matrix is written as well.",
        after_long_help = "\
Examples:
  rust_rfpipe classify --model model.json -e external.tsv -m external_samples.tsv \\
    -o predictions.tsv --confusion generalization.tsv"
    )]
    Classify {
        /// Trained model (JSON)
        #[arg(long)]
        model: String,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        qc: QcArgs,

        /// Predictions output [default: predictions.tsv]
        #[arg(short, long, default_value = "predictions.tsv")]
        output: String,

        /// Confusion matrix output [default: confusion.tsv]
        #[arg(long, default_value = "confusion.tsv")]
        confusion: String,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },
}
