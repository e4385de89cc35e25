//! Maximal Marginal Relevance diversification: greedily selects `top_k`
//! candidates trading off relevance against redundancy with what has
//! already been selected.

use std::collections::HashSet;

use docrank_retrieve::tokenize;

#[derive(Debug, Clone)]
pub struct MmrCandidate {
    pub doc_id: String,
    pub relevance: f32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn jaccard(a: &str, b: &str) -> f32 {
    let a_tokens: HashSet<String> = tokenize(a).into_iter().collect();
    let b_tokens: HashSet<String> = tokenize(b).into_iter().collect();
    if a_tokens.is_empty() && b_tokens.is_empty() {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn similarity(a: &MmrCandidate, b: &MmrCandidate) -> f32 {
    match (&a.embedding, &b.embedding) {
        (Some(ea), Some(eb)) => cosine(ea, eb),
        _ => jaccard(&a.content, &b.content),
    }
}

/// Greedily selects `top_k` candidates from `candidates` (assumed already
/// ordered by descending relevance, which fixes tie-break precedence).
/// Returns the selected candidates' indices into `candidates`, in
/// selection order. `lambda = 1.0` degenerates to pure relevance order;
/// `lambda = 0.0` still anchors on the top-relevance seed, then diversifies.
pub fn mmr_select(candidates: &[MmrCandidate], top_k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut selected: Vec<usize> = Vec::new();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // Seed with the highest-relevance candidate; ties by lower original
    // index (candidates are assumed pre-sorted by relevance, so this is
    // index 0 among relevance-maximal entries).
    let seed_index = remaining
        .iter()
        .copied()
        .max_by(|&a, &b| {
            candidates[a]
                .relevance
                .partial_cmp(&candidates[b].relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.cmp(&a))
        })
        .expect("candidates is non-empty");
    selected.push(seed_index);
    remaining.retain(|&i| i != seed_index);

    while selected.len() < top_k && !remaining.is_empty() {
        let next = remaining
            .iter()
            .copied()
            .map(|i| {
                let max_sim = selected.iter().map(|&s| similarity(&candidates[i], &candidates[s])).fold(f32::MIN, f32::max);
                let mmr_score = lambda * candidates[i].relevance - (1.0 - lambda) * max_sim;
                (i, mmr_score)
            })
            .max_by(|(ia, sa), (ib, sb)| sa.partial_cmp(sb).unwrap_or(std::cmp::Ordering::Equal).then_with(|| ib.cmp(ia)))
            .map(|(i, _)| i)
            .expect("remaining is non-empty");
        selected.push(next);
        remaining.retain(|&i| i != next);
    }

    selected
}
