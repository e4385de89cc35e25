//! Weighted min-max score fusion: an alternative to RRF when callers want
//! to tune the relative influence of the lexical and semantic legs instead
//! of relying on rank position alone.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct WeightedConfig {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
}

impl Default for WeightedConfig {
    fn default() -> Self {
        Self { lexical_weight: 0.5, semantic_weight: 0.5 }
    }
}

fn min_max_normalize(scores: &[(String, f32)]) -> HashMap<String, f32> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    scores
        .iter()
        .map(|(doc_id, score)| {
            let normalized = if range > 0.0 { (score - min) / range } else { 1.0 };
            (doc_id.clone(), normalized)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WeightedHit {
    pub doc_id: String,
    pub score: f32,
}

/// Min-max normalizes each input list to `[0, 1]` then combines with the
/// configured weights; a document unseen in a list contributes `0` for
/// that list's term. Output sorted by descending score, ties broken by
/// ascending `doc_id`.
pub fn fuse_weighted(lexical: &[(String, f32)], semantic: &[(String, f32)], config: WeightedConfig) -> Vec<WeightedHit> {
    let lexical_norm = min_max_normalize(lexical);
    let semantic_norm = min_max_normalize(semantic);

    let mut doc_ids: Vec<String> = lexical_norm.keys().chain(semantic_norm.keys()).cloned().collect();
    doc_ids.sort();
    doc_ids.dedup();

    let mut hits: Vec<WeightedHit> = doc_ids
        .into_iter()
        .map(|doc_id| {
            let score = config.lexical_weight * lexical_norm.get(&doc_id).copied().unwrap_or(0.0)
                + config.semantic_weight * semantic_norm.get(&doc_id).copied().unwrap_or(0.0);
            WeightedHit { doc_id, score }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.doc_id.cmp(&b.doc_id)));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_in_one_list_contributes_zero_for_that_term() {
        let lexical = vec![("a".to_string(), 1.0), ("b".to_string(), 0.0)];
        let semantic = vec![("a".to_string(), 1.0)];
        let hits = fuse_weighted(&lexical, &semantic, WeightedConfig::default());
        let a = hits.iter().find(|h| h.doc_id == "a").unwrap();
        let b = hits.iter().find(|h| h.doc_id == "b").unwrap();
        assert!(a.score > b.score);
    }

    #[test]
    fn flat_scores_normalize_to_one() {
        let lexical = vec![("a".to_string(), 5.0), ("b".to_string(), 5.0)];
        let hits = fuse_weighted(&lexical, &[], WeightedConfig::default());
        for hit in &hits {
            assert!((hit.score - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn ties_broken_by_ascending_doc_id() {
        let lexical = vec![("b".to_string(), 1.0), ("a".to_string(), 1.0)];
        let hits = fuse_weighted(&lexical, &[], WeightedConfig::default());
        assert_eq!(hits[0].doc_id, "a");
    }
}
