//! The cross-encoder capability interface. The core never references a
//! concrete model implementation; `MockCrossEncoderModel` exists purely so
//! the reranker can be exercised deterministically in tests and the CLI
//! demo.

use docrank_retrieve::tokenize;

pub trait CrossEncoderModel: Send + Sync {
    /// Scores each `(query, content)` pair; higher is better, deterministic
    /// for identical input.
    fn score_pairs(&self, pairs: &[(String, String)]) -> Vec<f32>;
    fn max_pair_length(&self) -> usize;
    fn model_id(&self) -> &str;

    /// Whether the model can currently serve requests. Defaults to always
    /// available; a test double can flip this to simulate a mid-request
    /// outage and exercise the reranker's degraded fallback path.
    fn is_available(&self) -> bool {
        true
    }
}

/// Lets a caller hold a shared handle to a model (e.g. to flip
/// `set_available` from outside while an orchestrator owns the reranker)
/// without the orchestrator's generic parameter becoming a trait object.
impl<M: CrossEncoderModel + ?Sized> CrossEncoderModel for std::sync::Arc<M> {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Vec<f32> {
        (**self).score_pairs(pairs)
    }

    fn max_pair_length(&self) -> usize {
        (**self).max_pair_length()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Scores a pair by token overlap between query and content (a crude but
/// fully deterministic stand-in for a learned cross-encoder).
pub struct MockCrossEncoderModel {
    model_id: String,
    available: std::sync::atomic::AtomicBool,
}

impl MockCrossEncoderModel {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), available: std::sync::atomic::AtomicBool::new(true) }
    }

    /// Test hook: simulates the model going offline mid-session.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, std::sync::atomic::Ordering::Release);
    }
}

impl CrossEncoderModel for MockCrossEncoderModel {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Vec<f32> {
        pairs
            .iter()
            .map(|(query, content)| {
                let query_tokens: std::collections::HashSet<_> = tokenize(query).into_iter().collect();
                let content_tokens: std::collections::HashSet<_> = tokenize(content).into_iter().collect();
                let overlap = query_tokens.intersection(&content_tokens).count();
                overlap as f32 / (query_tokens.len().max(1) as f32)
            })
            .collect()
    }

    fn max_pair_length(&self) -> usize {
        512
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn is_available(&self) -> bool {
        self.available.load(std::sync::atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_is_deterministic() {
        let model = MockCrossEncoderModel::new("mock-ce-v1");
        let pairs = vec![("jwt auth".to_string(), "Use JWT bearer token for authentication".to_string())];
        assert_eq!(model.score_pairs(&pairs), model.score_pairs(&pairs));
    }

    #[test]
    fn higher_overlap_scores_higher() {
        let model = MockCrossEncoderModel::new("mock-ce-v1");
        let pairs = vec![
            ("jwt token".to_string(), "jwt token authentication guide".to_string()),
            ("jwt token".to_string(), "serialize json payloads".to_string()),
        ];
        let scores = model.score_pairs(&pairs);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn set_available_toggles_is_available() {
        let model = MockCrossEncoderModel::new("mock-ce-v1");
        assert!(model.is_available());
        model.set_available(false);
        assert!(!model.is_available());
    }
}
