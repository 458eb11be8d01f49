//! File input/output: delimited tables and the JSON model artifact

mod csv;
mod model;

pub use self::csv::{
    read_expression_matrix, read_metadata, write_confusion, write_importance, write_predictions,
    write_retained_samples, write_round_metrics, write_selection,
};
pub use model::{load_model, save_model};
