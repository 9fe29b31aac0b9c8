/// Access-recency factor (§4.8): 1 for a node accessed today, linear
/// decay of 0.05/day out to day 7, then a log-decaying tail clamped at
/// zero.
fn access_recency(d_access: f64) -> f64 {
    if d_access <= 0.0 {
        1.0
    } else if d_access <= 7.0 {
        1.0 - 0.05 * d_access
    } else {
        (0.65 - 0.2 * (d_access - 6.0).log10()).max(0.0)
    }
}

/// Edge-count density factor (§4.8), saturating at 5 edges.
fn density(edge_count: u32) -> f64 {
    0.5 + 0.1 * edge_count.min(5) as f64
}

/// Inputs to the relevance formula (§4.8). `importance` and
/// `confidence` come from the analyzer's accreted optional fields
/// (§9); a node that never reported them defaults to neutral values
/// (importance 0, confidence 1) rather than being penalized.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceInputs {
    pub age_days: f64,
    pub access_days: f64,
    pub edge_count: u32,
    pub importance: f64,
    pub confidence: f64,
}

/// Decay rate. Not specified upstream; chosen so a 90-day-old,
/// never-revisited, edgeless node falls below the archive threshold
/// while a fresh, well-connected node stays well above it (§8, decay
/// test vectors).
pub const DEFAULT_DECAY_K: f64 = 0.01;

/// Compute `relevance` per the §4.8 formula, clamped to `[0, 1]`.
pub fn compute_relevance(inputs: RelevanceInputs, k: f64) -> f64 {
    let age_factor = (-k * inputs.age_days).exp();
    let recency_factor = 0.3 + 0.3 * access_recency(inputs.access_days);
    let density_factor = density(inputs.edge_count);
    let importance_factor = 0.5 + inputs.importance;
    let confidence_factor = 0.7 + 0.3 * inputs.confidence;
    (age_factor * recency_factor * density_factor * importance_factor * confidence_factor).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_untouched_edgeless_node_is_archived() {
        let inputs = RelevanceInputs {
            age_days: 90.0,
            access_days: 90.0,
            edge_count: 0,
            importance: 0.0,
            confidence: 0.5,
        };
        let r = compute_relevance(inputs, DEFAULT_DECAY_K);
        assert!(r < 0.2, "expected archival, got {r}");
    }

    #[test]
    fn fresh_connected_important_node_is_not_archived() {
        let inputs = RelevanceInputs {
            age_days: 0.0,
            access_days: 0.0,
            edge_count: 3,
            importance: 0.8,
            confidence: 0.5,
        };
        let r = compute_relevance(inputs, DEFAULT_DECAY_K);
        assert!(r > 0.3, "expected to survive archival, got {r}");
    }

    #[test]
    fn relevance_is_always_in_unit_range() {
        let inputs = RelevanceInputs {
            age_days: 0.0,
            access_days: 0.0,
            edge_count: 50,
            importance: 10.0,
            confidence: 10.0,
        };
        let r = compute_relevance(inputs, DEFAULT_DECAY_K);
        assert!((0.0..=1.0).contains(&r));
    }
}
