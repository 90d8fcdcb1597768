mod error;
mod vector;
mod vocab;
mod store;
mod sampler;
mod update;
mod scanner;
mod progress;
mod train;
mod similarity;
mod config;
mod pipeline;

pub use error::{EmbeddingError, Result};
pub use vector::EmbeddingVector;
pub use vocab::{tokenize, Vocabulary};
pub use store::EmbeddingStore;
pub use sampler::NegativeSampler;
pub use update::{sigmoid, UpdateRule};
pub use scanner::{line_aligned, partitions, CorpusScanner, ScanSummary};
pub use progress::{ProgressFiles, TrainingProgress};
pub use train::{TrainingController, TrainingState, TrainingSummary};
pub use similarity::{Neighbor, Similarity};
pub use config::{files_handling, Config, TrainParams};
pub use pipeline::Pipeline;
