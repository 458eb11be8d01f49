//! Training-set sampling: row partition and class weights

mod split;
mod weights;

pub use split::TrainTestSplit;
pub use weights::ClassWeights;
