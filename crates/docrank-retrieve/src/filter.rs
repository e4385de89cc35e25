//! Structured boolean filter algebra: a sum type of comparison/string/
//! collection leaves composed with AND/OR/NOT, plus a content-only match
//! variant. Invalid shapes (empty `And`/`Or`, wrong-arity `Not`) are
//! rejected at construction rather than at evaluation time.

use regex::Regex;

use crate::document::{Document, MetadataScalar, MetadataValue};
use crate::error::RetrieveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(MetadataScalar),
    List(Vec<MetadataScalar>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPattern {
    Substring(String),
    Regex(String),
}

/// A filter expression. `compile_for_backend` splits a tree into the part a
/// `VectorBackend` can evaluate natively (`pushdown`) and the part that must
/// be evaluated client-side (`residual`); both are themselves `Filter`
/// values, so a pushdown filter can be handed straight back to `matches`
/// during tests without a second representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Leaf { field: String, op: FilterOp, value: FilterValue },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    ContentMatch { pattern: ContentPattern, negate: bool },
}

/// Alias used at the `VectorBackend` seam; a backend receives exactly the
/// filter shape it declared support for via `supports`.
pub type BackendFilter = Filter;

impl Filter {
    pub fn leaf(field: impl Into<String>, op: FilterOp, value: FilterValue) -> Result<Self, RetrieveError> {
        match (op, &value) {
            (FilterOp::In | FilterOp::NotIn, FilterValue::List(_)) => {}
            (FilterOp::In | FilterOp::NotIn, FilterValue::Scalar(_)) => {
                return Err(RetrieveError::invalid_filter("in/not_in require a list value"))
            }
            (_, FilterValue::List(_)) => {
                return Err(RetrieveError::invalid_filter("comparison ops require a scalar value"))
            }
            _ => {}
        }
        Ok(Filter::Leaf { field: field.into(), op, value })
    }

    pub fn and(children: Vec<Filter>) -> Result<Self, RetrieveError> {
        if children.is_empty() {
            return Err(RetrieveError::invalid_filter("And requires at least one child"));
        }
        Ok(Filter::And(children))
    }

    pub fn or(children: Vec<Filter>) -> Result<Self, RetrieveError> {
        if children.is_empty() {
            return Err(RetrieveError::invalid_filter("Or requires at least one child"));
        }
        Ok(Filter::Or(children))
    }

    pub fn not(child: Filter) -> Self {
        Filter::Not(Box::new(child))
    }

    pub fn content_match(pattern: ContentPattern, negate: bool) -> Result<Self, RetrieveError> {
        if let ContentPattern::Regex(ref pattern) = pattern {
            Regex::new(pattern).map_err(|e| RetrieveError::invalid_filter(format!("invalid regex: {e}")))?;
        }
        Ok(Filter::ContentMatch { pattern, negate })
    }

    /// Evaluates the full algebra against a single document. Never reorders
    /// a result set; callers apply this as a stable filter over an existing
    /// ranking.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Leaf { field, op, value } => match doc.metadata.get(field) {
                Some(metadata_value) => eval_leaf(*op, metadata_value, value),
                None => missing_field_default(*op),
            },
            Filter::And(children) => children.iter().all(|c| c.matches(doc)),
            Filter::Or(children) => children.iter().any(|c| c.matches(doc)),
            Filter::Not(child) => !child.matches(doc),
            Filter::ContentMatch { pattern, negate } => {
                let hit = match pattern {
                    ContentPattern::Substring(needle) => doc.content.contains(needle.as_str()),
                    ContentPattern::Regex(pattern) => {
                        Regex::new(pattern).map(|re| re.is_match(&doc.content)).unwrap_or(false)
                    }
                };
                hit != *negate
            }
        }
    }

    /// Splits `self` into the portion a backend declaring `supports` can
    /// evaluate natively and the remainder to evaluate client-side.
    /// `And` distributes (a conjunction of a pushed-down leaf and a
    /// residual leaf is equivalent to evaluating each independently and
    /// ANDing the results); `Or` does not, since a backend returning only
    /// documents matching half of a disjunction would silently drop
    /// matches, so an `Or` subtree is pushed down only if every child is
    /// individually and fully pushdown-able, and otherwise the whole `Or`
    /// becomes residual.
    pub fn compile_for_backend(
        &self,
        supports: &dyn Fn(FilterOp) -> bool,
    ) -> (Option<BackendFilter>, Option<Filter>) {
        match self {
            Filter::Leaf { op, .. } => {
                if supports(*op) {
                    (Some(self.clone()), None)
                } else {
                    (None, Some(self.clone()))
                }
            }
            Filter::Not(child) => {
                if let Filter::Leaf { field, op: FilterOp::Eq, value } = child.as_ref() {
                    if supports(FilterOp::Ne) {
                        let rewritten = Filter::Leaf { field: field.clone(), op: FilterOp::Ne, value: value.clone() };
                        return (Some(rewritten), None);
                    }
                }
                (None, Some(self.clone()))
            }
            Filter::And(children) => {
                let mut pushed = Vec::new();
                let mut residual = Vec::new();
                for child in children {
                    let (child_push, child_resid) = child.compile_for_backend(supports);
                    if let Some(p) = child_push {
                        pushed.push(p);
                    }
                    if let Some(r) = child_resid {
                        residual.push(r);
                    }
                }
                let pushdown = collapse_and(pushed);
                let residual = collapse_and(residual);
                (pushdown, residual)
            }
            Filter::Or(children) => {
                let compiled: Vec<_> = children.iter().map(|c| c.compile_for_backend(supports)).collect();
                if compiled.iter().all(|(_, resid)| resid.is_none()) {
                    let pushed = compiled.into_iter().filter_map(|(p, _)| p).collect();
                    (Some(Filter::Or(pushed)), None)
                } else {
                    (None, Some(self.clone()))
                }
            }
            Filter::ContentMatch { .. } => (None, Some(self.clone())),
        }
    }
}

fn collapse_and(mut children: Vec<Filter>) -> Option<Filter> {
    match children.len() {
        0 => None,
        1 => Some(children.remove(0)),
        _ => Some(Filter::And(children)),
    }
}

fn missing_field_default(op: FilterOp) -> bool {
    match op {
        FilterOp::Eq => false,
        FilterOp::Ne => true,
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => false,
        FilterOp::In => false,
        FilterOp::NotIn => true,
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith | FilterOp::Regex => false,
        FilterOp::NotContains => true,
    }
}

fn eval_leaf(op: FilterOp, metadata_value: &MetadataValue, filter_value: &FilterValue) -> bool {
    match op {
        FilterOp::Eq => metadata_value.iter_scalars().any(|s| scalar_eq(&s, expect_scalar(filter_value))),
        FilterOp::Ne => !metadata_value.iter_scalars().any(|s| scalar_eq(&s, expect_scalar(filter_value))),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            let target = expect_scalar(filter_value);
            metadata_value.iter_scalars().any(|s| compare(op, &s, target))
        }
        FilterOp::In => {
            let list = expect_list(filter_value);
            metadata_value.iter_scalars().any(|s| list.iter().any(|v| scalar_eq(&s, v)))
        }
        FilterOp::NotIn => {
            let list = expect_list(filter_value);
            !metadata_value.iter_scalars().any(|s| list.iter().any(|v| scalar_eq(&s, v)))
        }
        FilterOp::Contains => match metadata_value.as_string() {
            Some(s) => s.contains(&scalar_to_string(expect_scalar(filter_value))),
            None => false,
        },
        FilterOp::NotContains => match metadata_value.as_string() {
            Some(s) => !s.contains(&scalar_to_string(expect_scalar(filter_value))),
            None => true,
        },
        FilterOp::StartsWith => match metadata_value.as_string() {
            Some(s) => s.starts_with(&scalar_to_string(expect_scalar(filter_value))),
            None => false,
        },
        FilterOp::EndsWith => match metadata_value.as_string() {
            Some(s) => s.ends_with(&scalar_to_string(expect_scalar(filter_value))),
            None => false,
        },
        FilterOp::Regex => match metadata_value.as_string() {
            Some(s) => Regex::new(&scalar_to_string(expect_scalar(filter_value))).map(|re| re.is_match(s)).unwrap_or(false),
            None => false,
        },
    }
}

fn expect_scalar(value: &FilterValue) -> &MetadataScalar {
    match value {
        FilterValue::Scalar(s) => s,
        FilterValue::List(_) => panic!("filter construction guarantees scalar value for this op"),
    }
}

fn expect_list(value: &FilterValue) -> &[MetadataScalar] {
    match value {
        FilterValue::List(l) => l,
        FilterValue::Scalar(_) => panic!("filter construction guarantees list value for this op"),
    }
}

fn scalar_to_string(scalar: &MetadataScalar) -> String {
    scalar.to_string()
}

fn scalar_eq(a: &MetadataScalar, b: &MetadataScalar) -> bool {
    use MetadataScalar::*;
    match (a, b) {
        (String(x), String(y)) => x == y,
        (Integer(x), Integer(y)) => x == y,
        (Float(x), Float(y)) => (x - y).abs() < f64::EPSILON,
        (Bool(x), Bool(y)) => x == y,
        (Integer(x), Float(y)) | (Float(y), Integer(x)) => (*x as f64 - y).abs() < f64::EPSILON,
        _ => false,
    }
}

fn compare(op: FilterOp, a: &MetadataScalar, b: &MetadataScalar) -> bool {
    let (x, y) = match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return false,
    };
    match op {
        FilterOp::Gt => x > y,
        FilterOp::Gte => x >= y,
        FilterOp::Lt => x < y,
        FilterOp::Lte => x <= y,
        _ => false,
    }
}

fn numeric(scalar: &MetadataScalar) -> Option<f64> {
    match scalar {
        MetadataScalar::Integer(i) => Some(*i as f64),
        MetadataScalar::Float(f) => Some(*f),
        _ => None,
    }
}
