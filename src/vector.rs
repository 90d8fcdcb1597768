
use ndarray::{Array1, Zip};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::{Distribution, Uniform};
use rand::Rng;
use std::fmt::Display;
use crate::error::{EmbeddingError, Result};

// coordinates are drawn from (-INIT_RANGE, INIT_RANGE) and scaled down by the dimension
const INIT_RANGE: f64 = 0.5;


/// A fixed-length real vector. The length is set once at construction and never changes,
/// every binary operation checks it and fails with `DimensionMismatch` instead of truncating.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingVector {
    data: Array1<f64>,
}

impl EmbeddingVector {

    /// Builds a vector from explicit values, which must hold exactly `length` coordinates.
    pub fn from_values(length: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != length {
            return Err(EmbeddingError::dimension_mismatch(length, values.len()));
        }
        Ok(Self { data: Array1::from(values) })
    }

    /// Random vector of `length` coordinates, none of which is exactly zero.
    pub fn random<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Self {

        let dist = Uniform::new(-INIT_RANGE, INIT_RANGE);
        let mut data: Array1<f64> = Array1::random_using(length, dist, rng);

        // a zero coordinate gives a dead gradient, redraw until it is not
        for x in data.iter_mut() {
            while *x == 0.0 {
                *x = dist.sample(rng);
            }
        }

        data.mapv_inplace(|x| x / length as f64);
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.data.get(index).copied().ok_or(EmbeddingError::IndexOutOfRange { index, len: self.len() })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut f64> {
        let len = self.len();
        self.data.get_mut(index).ok_or(EmbeddingError::IndexOutOfRange { index, len })
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    fn check_len(&self, other: &EmbeddingVector) -> Result<()> {
        if self.len() != other.len() {
            return Err(EmbeddingError::dimension_mismatch(self.len(), other.len()));
        }
        Ok(())
    }

    pub fn dot(&self, other: &EmbeddingVector) -> Result<f64> {
        self.check_len(other)?;
        Ok(self.data.dot(&other.data))
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.data.dot(&self.data).sqrt()
    }

    /// Cosine of the angle between the two vectors.
    ///
    /// If either vector has a norm of exactly zero the similarity is `0.0`, so a degenerate
    /// entry never aborts a nearest neighbour scan. This is the only place the policy lives.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Result<f64> {
        let dot = self.dot(other)?;
        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_a * norm_b))
    }

    pub fn checked_add(&self, other: &EmbeddingVector) -> Result<EmbeddingVector> {
        self.check_len(other)?;
        Ok(Self { data: &self.data + &other.data })
    }

    pub fn checked_sub(&self, other: &EmbeddingVector) -> Result<EmbeddingVector> {
        self.check_len(other)?;
        Ok(Self { data: &self.data - &other.data })
    }

    /// Elementwise product.
    pub fn checked_mul(&self, other: &EmbeddingVector) -> Result<EmbeddingVector> {
        self.check_len(other)?;
        Ok(Self { data: &self.data * &other.data })
    }

    /// Elementwise quotient, fails on the first divisor coordinate that is exactly zero.
    pub fn checked_div(&self, other: &EmbeddingVector) -> Result<EmbeddingVector> {
        self.check_len(other)?;
        if let Some(index) = other.data.iter().position(|x| *x == 0.0) {
            return Err(EmbeddingError::DivisionByZero { index });
        }
        Ok(Self { data: &self.data / &other.data })
    }

    pub fn checked_add_assign(&mut self, other: &EmbeddingVector) -> Result<()> {
        self.check_len(other)?;
        Zip::from(&mut self.data).and(&other.data).for_each(|a, b| *a += *b);
        Ok(())
    }

    pub fn scale(&self, s: f64) -> EmbeddingVector {
        Self { data: &self.data * s }
    }

}

impl From<Vec<f64>> for EmbeddingVector {
    fn from(values: Vec<f64>) -> Self {
        Self { data: Array1::from(values) }
    }
}

impl Display for EmbeddingVector {
    // `{}` on f64 prints the shortest representation that parses back to the same bits
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", x)?;
        }
        write!(f, "]")
    }
}
