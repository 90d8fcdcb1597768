
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::error::{EmbeddingError, Result};
use crate::vocab::Vocabulary;


/// Draws negative example tokens uniformly from the vocabulary.
pub struct NegativeSampler {
    rng: StdRng,
}

impl NegativeSampler {

    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// `count` token ids drawn with replacement, none equal to `exclude`.
    pub fn sample(&mut self, vocab: &Vocabulary, exclude: usize, count: usize) -> Result<Vec<usize>> {
        self.sample_ids(vocab.len(), exclude, count)
    }

    pub(crate) fn sample_ids(&mut self, vocab_size: usize, exclude: usize, count: usize) -> Result<Vec<usize>> {
        if vocab_size < 2 {
            return Err(EmbeddingError::VocabularyTooSmall(vocab_size));
        }

        let mut negatives = Vec::with_capacity(count);
        while negatives.len() < count {
            let id = self.rng.gen_range(0..vocab_size);
            if id != exclude {
                negatives.push(id);
            }
        }
        Ok(negatives)
    }

}
