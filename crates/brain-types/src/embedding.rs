use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// A fixed-length numeric vector attached to one node (§3).
///
/// `schema_version` distinguishes revisions of the input text schema
/// used to produce the embedding, so the consolidation scheduler knows
/// when an old embedding should be treated as stale input rather than
/// a stale model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub node_id: NodeId,
    pub model: String,
    pub input_text: String,
    pub schema_version: u32,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Cosine similarity between two equal-length vectors, clamped to
/// `[0, 1]` per §4.3's `similarity := 1 − distance, clamped` rule
/// applied to a cosine distance.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_maximally_similar() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_are_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
