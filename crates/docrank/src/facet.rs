//! Aggregates field-value counts over a result set, for faceted
//! navigation UIs layered on top of `search`.

use std::collections::HashMap;

use crate::options::{FacetResult, RankedResult};

pub const DEFAULT_TOP_FACET_VALUES: usize = 10;

/// For each field in `fields`, counts how many results carry each distinct
/// value (a list-valued field contributes once per distinct element), sorts
/// by descending count (ties by ascending value), and truncates to
/// `top_facet_values`.
pub fn compute_facets(results: &[RankedResult], fields: &[String], top_facet_values: usize) -> Vec<FacetResult> {
    let total_docs = results.len() as u64;
    fields
        .iter()
        .map(|field| {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for result in results {
                if let Some(value) = result.metadata.get(field) {
                    for scalar in value.iter_scalars() {
                        *counts.entry(scalar.to_string()).or_insert(0) += 1;
                    }
                }
            }
            let mut values: Vec<(String, u64)> = counts.into_iter().collect();
            values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            values.truncate(top_facet_values);
            FacetResult { field: field.clone(), values, total_docs }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrank_retrieve::{Metadata, MetadataValue};

    fn result_with(method: &str, tags: Vec<&str>) -> RankedResult {
        let mut metadata = Metadata::new();
        metadata.insert("method".into(), MetadataValue::String(method.into()));
        metadata.insert("tags".into(), MetadataValue::List(tags.into_iter().map(|t| docrank_retrieve::MetadataScalar::String(t.into())).collect()));
        RankedResult {
            doc_id: "d".into(),
            content: "c".into(),
            metadata,
            score: 1.0,
            source_method: crate::options::SourceMethod::Fused,
            original_rank: None,
            rerank_rank: None,
            explain: None,
        }
    }

    #[test]
    fn list_valued_field_contributes_once_per_element() {
        let results = vec![result_with("GET", vec!["auth", "public"]), result_with("GET", vec!["auth"])];
        let facets = compute_facets(&results, &["tags".to_string()], DEFAULT_TOP_FACET_VALUES);
        let tags = &facets[0];
        let auth_count = tags.values.iter().find(|(v, _)| v == "auth").unwrap().1;
        assert_eq!(auth_count, 2);
        assert_eq!(tags.total_docs, 2);
    }

    #[test]
    fn ties_broken_by_ascending_value() {
        let results = vec![result_with("GET", vec![]), result_with("POST", vec![])];
        let facets = compute_facets(&results, &["method".to_string()], DEFAULT_TOP_FACET_VALUES);
        assert_eq!(facets[0].values[0].0, "GET");
        assert_eq!(facets[0].values[1].0, "POST");
    }

    #[test]
    fn truncates_to_top_facet_values() {
        let results: Vec<RankedResult> = (0..20).map(|i| result_with(&format!("M{i}"), vec![])).collect();
        let facets = compute_facets(&results, &["method".to_string()], 5);
        assert_eq!(facets[0].values.len(), 5);
    }
}
