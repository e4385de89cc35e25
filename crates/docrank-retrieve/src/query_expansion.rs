//! Deterministic, offline query expansion from a static lexicon. There is
//! no statistical feedback loop here (no pseudo-relevance feedback, no
//! network, no LLM) — every strategy is a pure function of the query text
//! and the lexicon the expander was built with.

use std::collections::HashMap;

use crate::tokenizer::tokenize;

const WH_WORDS: &[&str] = &["who", "what", "when", "where", "why", "how", "which"];
const VARIATION_TEMPLATES: &[&str] = &["{q} guide", "{q} tutorial", "{q} reference", "{q} example"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExpansionMethod {
    None,
    Domain,
    Synonyms,
    MultiQuery,
    Auto,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExpandedQuery {
    pub original: String,
    pub terms: Vec<String>,
    pub variations: Vec<String>,
    pub method: ExpansionMethod,
    pub confidence: f32,
}

/// Builds `ExpandedQuery`s from a fixed `domain_expansions`/`abbreviations`
/// lexicon. `new()` ships pre-populated with a small API-documentation
/// lexicon since that is this system's stated domain; `with_lexicon`
/// accepts a caller-supplied one.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    domain_expansions: HashMap<String, Vec<String>>,
    abbreviations: HashMap<String, String>,
    max_expansions: usize,
    max_variations: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExpander {
    pub fn new() -> Self {
        let mut domain_expansions = HashMap::new();
        domain_expansions.insert("auth".to_string(), vec!["authentication".to_string(), "authorization".to_string()]);
        domain_expansions.insert("endpoint".to_string(), vec!["route".to_string(), "path".to_string()]);
        domain_expansions.insert("route".to_string(), vec!["endpoint".to_string()]);
        domain_expansions.insert("token".to_string(), vec!["credential".to_string(), "bearer".to_string()]);
        domain_expansions.insert("schema".to_string(), vec!["model".to_string(), "type".to_string()]);

        let mut abbreviations = HashMap::new();
        abbreviations.insert("auth".to_string(), "authentication".to_string());
        abbreviations.insert("req".to_string(), "request".to_string());
        abbreviations.insert("resp".to_string(), "response".to_string());
        abbreviations.insert("api".to_string(), "application programming interface".to_string());
        abbreviations.insert("jwt".to_string(), "json web token".to_string());

        Self::with_lexicon(domain_expansions, abbreviations)
    }

    pub fn with_lexicon(domain_expansions: HashMap<String, Vec<String>>, abbreviations: HashMap<String, String>) -> Self {
        Self { domain_expansions, abbreviations, max_expansions: 5, max_variations: 3 }
    }

    pub fn with_max_expansions(mut self, n: usize) -> Self {
        self.max_expansions = n;
        self
    }

    pub fn with_max_variations(mut self, n: usize) -> Self {
        self.max_variations = n;
        self
    }

    pub fn expand(&self, query: &str, method: ExpansionMethod) -> ExpandedQuery {
        let resolved = if method == ExpansionMethod::Auto { self.resolve_auto(query) } else { method };
        match resolved {
            ExpansionMethod::None => ExpandedQuery {
                original: query.to_string(),
                terms: Vec::new(),
                variations: Vec::new(),
                method: ExpansionMethod::None,
                confidence: 1.0,
            },
            ExpansionMethod::Domain => ExpandedQuery {
                original: query.to_string(),
                terms: self.domain_terms(query),
                variations: Vec::new(),
                method: ExpansionMethod::Domain,
                confidence: 1.0,
            },
            ExpansionMethod::Synonyms => {
                let mut terms = self.domain_terms(query);
                for abbrev_term in self.abbreviation_terms(query) {
                    if !terms.contains(&abbrev_term) {
                        terms.push(abbrev_term);
                    }
                    if terms.len() >= self.max_expansions {
                        break;
                    }
                }
                terms.truncate(self.max_expansions);
                ExpandedQuery { original: query.to_string(), terms, variations: Vec::new(), method: ExpansionMethod::Synonyms, confidence: 1.0 }
            }
            ExpansionMethod::MultiQuery => ExpandedQuery {
                original: query.to_string(),
                terms: Vec::new(),
                variations: self.variations(query),
                method: ExpansionMethod::MultiQuery,
                confidence: 1.0,
            },
            ExpansionMethod::Auto => unreachable!("resolved above"),
        }
    }

    fn resolve_auto(&self, query: &str) -> ExpansionMethod {
        let trimmed = query.trim();
        let starts_with_wh = tokenize(trimmed).first().map(|t| WH_WORDS.contains(&t.as_str())).unwrap_or(false);
        if trimmed.contains('?') || starts_with_wh {
            ExpansionMethod::MultiQuery
        } else if tokenize(query).iter().any(|t| self.domain_expansions.contains_key(t)) {
            ExpansionMethod::Domain
        } else {
            ExpansionMethod::Synonyms
        }
    }

    fn domain_terms(&self, query: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for token in tokenize(query) {
            if let Some(expansions) = self.domain_expansions.get(&token) {
                for term in expansions {
                    if !terms.contains(term) {
                        terms.push(term.clone());
                    }
                    if terms.len() >= self.max_expansions {
                        return terms;
                    }
                }
            }
        }
        terms
    }

    fn abbreviation_terms(&self, query: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for token in tokenize(query) {
            if let Some(long_form) = self.abbreviations.get(&token) {
                if !terms.contains(long_form) {
                    terms.push(long_form.clone());
                }
            }
        }
        terms
    }

    fn variations(&self, query: &str) -> Vec<String> {
        VARIATION_TEMPLATES.iter().take(self.max_variations).map(|template| template.replace("{q}", query)).collect()
    }
}
