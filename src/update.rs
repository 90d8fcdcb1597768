
use crate::error::Result;
use crate::store::EmbeddingStore;


pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Skip-gram with negative sampling gradient step.
#[derive(Clone, Copy, Debug)]
pub struct UpdateRule {
    learning_rate: f64,
}

impl UpdateRule {

    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Pulls `target` and `context` together, then pushes `target` away from every negative.
    ///
    /// Each step moves the target first and then moves the other vector using the already
    /// moved target, in this exact order.
    pub fn apply(&self, store: &EmbeddingStore, target: usize, context: usize, negatives: &[usize]) -> Result<()> {
        self.step(store, target, context, 1.0)?;
        for &n in negatives {
            self.step(store, target, n, 0.0)?;
        }
        Ok(())
    }

    // at most one vector lock is held at any time, so concurrent callers cannot deadlock
    fn step(&self, store: &EmbeddingStore, target: usize, other: usize, label: f64) -> Result<()> {

        let other_vec = store.entry(other)?.clone();

        let (gradient, moved_target) = {
            let mut t = store.entry(target)?;
            let dot = t.dot(&other_vec)?;
            let gradient = self.learning_rate * (label - sigmoid(dot));
            t.checked_add_assign(&other_vec.scale(gradient))?;
            (gradient, t.clone())
        };

        let mut o = store.entry(other)?;
        o.checked_add_assign(&moved_target.scale(gradient))
    }

}


#[cfg(test)]
mod tests {

    use super::{sigmoid, UpdateRule};
    use crate::store::EmbeddingStore;
    use crate::vector::EmbeddingVector;

    const TOL: f64 = 1e-12;

    fn store_of(entries: &[(&str, &[f64])]) -> EmbeddingStore {
        EmbeddingStore::from_entries(entries.iter()
            .map(|(t, v)| (t.to_string(), EmbeddingVector::from(v.to_vec())))
            .collect()).unwrap()
    }

    fn values(store: &EmbeddingStore, token: &str) -> Vec<f64> {
        store.get(token).unwrap().iter().copied().collect()
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < TOL, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn sigmoid_values() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < TOL);
        assert!(sigmoid(30.0) > 0.999);
    }

    #[test]
    fn positive_step_uses_moved_target() {
        let store = store_of(&[("t", &[1.0, 0.0]), ("c", &[0.0, 1.0])]);
        UpdateRule::new(0.5).apply(&store, 0, 1, &[]).unwrap();

        // dot = 0, gradient = 0.5 * (1 - 0.5) = 0.25
        assert_close(&values(&store, "t"), &[1.0, 0.25]);
        // context moves along the updated target [1.0, 0.25]
        assert_close(&values(&store, "c"), &[0.25, 1.0625]);
    }

    #[test]
    fn negative_step_follows_positive_step() {
        let store = store_of(&[("t", &[0.2, -0.1]), ("c", &[0.3, 0.4]), ("n", &[-0.5, 0.25])]);
        let lr = 0.1;
        UpdateRule::new(lr).apply(&store, 0, 1, &[2]).unwrap();

        let (mut t, mut c, mut n) = ([0.2, -0.1], [0.3, 0.4], [-0.5, 0.25]);
        let g = lr * (1.0 - sigmoid(t[0] * c[0] + t[1] * c[1]));
        for k in 0..2 { t[k] += c[k] * g; }
        for k in 0..2 { c[k] += t[k] * g; }
        let g = lr * (0.0 - sigmoid(t[0] * n[0] + t[1] * n[1]));
        for k in 0..2 { t[k] += n[k] * g; }
        for k in 0..2 { n[k] += t[k] * g; }

        assert_close(&values(&store, "t"), &t);
        assert_close(&values(&store, "c"), &c);
        assert_close(&values(&store, "n"), &n);
    }

    #[test]
    fn repeated_negative_is_applied_twice() {
        let once = store_of(&[("t", &[0.2, 0.1]), ("c", &[0.3, 0.4]), ("n", &[-0.5, 0.25])]);
        let twice = store_of(&[("t", &[0.2, 0.1]), ("c", &[0.3, 0.4]), ("n", &[-0.5, 0.25])]);
        let rule = UpdateRule::new(0.05);
        rule.apply(&once, 0, 1, &[2]).unwrap();
        rule.apply(&twice, 0, 1, &[2, 2]).unwrap();
        assert!(values(&once, "n") != values(&twice, "n"));
    }

    #[test]
    fn target_equal_to_context() {
        let store = store_of(&[("w", &[1.0, 0.0])]);
        let lr = 0.1;
        UpdateRule::new(lr).apply(&store, 0, 0, &[]).unwrap();

        let g = lr * (1.0 - sigmoid(1.0));
        let x = (1.0 + g) * (1.0 + g);
        assert_close(&values(&store, "w"), &[x, 0.0]);
    }

    #[test]
    fn dimension_mismatch_propagates() {
        let store = store_of(&[("a", &[1.0, 0.0]), ("b", &[1.0])]);
        assert!(UpdateRule::new(0.1).apply(&store, 0, 1, &[]).is_err());
    }

    #[test]
    fn bad_id_propagates() {
        let store = store_of(&[("a", &[1.0]), ("b", &[1.0])]);
        assert!(UpdateRule::new(0.1).apply(&store, 0, 1, &[7]).is_err());
    }
}
