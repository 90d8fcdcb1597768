
use crate::error::Result;
use crate::store::EmbeddingStore;
use crate::vector::EmbeddingVector;


/// Result of a nearest neighbour lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Neighbor {
    Found(String, f64),
    /// The store holds no other token with a finite score.
    NotFound,
}

/// Brute force cosine similarity search over a trained table.
pub struct Similarity<'s> {
    store: &'s EmbeddingStore,
}

impl<'s> Similarity<'s> {

    pub fn new(store: &'s EmbeddingStore) -> Similarity<'s> {
        Self { store }
    }

    pub fn extract_vec_from_word(&self, token: &str) -> Result<EmbeddingVector> {
        self.store.get(token)
    }

    /// Token with the highest cosine similarity to `token`, ties go to the token seen first.
    /// Tokens whose score is not finite are skipped.
    pub fn most_similar(&self, token: &str) -> Result<Neighbor> {

        let reference = self.extract_vec_from_word(token)?;

        let mut best: Option<(&str, f64)> = None;
        for (other, vec) in self.store.iter() {
            if other == token {
                continue;
            }
            let score = reference.cosine_similarity(&vec)?;
            // a diverged vector scores NaN and never ranks
            if !score.is_finite() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {},
                _ => best = Some((other, score)),
            }
        }

        Ok(match best {
            Some((other, score)) => Neighbor::Found(other.to_owned(), score),
            None => Neighbor::NotFound,
        })
    }

    /// The `k` tokens most similar to `token`, best first.
    pub fn most_similar_k(&self, token: &str, k: usize) -> Result<Vec<(String, f64)>> {

        let reference = self.extract_vec_from_word(token)?;

        let mut scored: Vec<(String, f64)> = Vec::with_capacity(self.store.len());
        for (other, vec) in self.store.iter() {
            if other == token {
                continue;
            }
            let score = reference.cosine_similarity(&vec)?;
            if score.is_finite() {
                scored.push((other.to_owned(), score));
            }
        }

        // sort by most similar in descending order, stable so ties keep store order
        scored.sort_by(|(_, s), (_, t)| t.total_cmp(s));
        scored.truncate(k);
        Ok(scored)
    }

}
