//! Equality label selectors (`k=v,k=v`).

use std::collections::BTreeMap;

/// Parsed equality selector. An empty selector matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector {
    terms: Vec<(String, String)>,
}

impl LabelSelector {
    /// Parse `k=v[,k=v]`. Terms without `=` are ignored.
    pub fn parse(selector: &str) -> Self {
        let terms = selector
            .split(',')
            .filter_map(|term| {
                let (k, v) = term.split_once('=')?;
                Some((k.trim().to_string(), v.trim().to_string()))
            })
            .collect();
        Self { terms }
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.terms.iter().all(|(k, v)| {
            labels
                .and_then(|l| l.get(k))
                .is_some_and(|actual| actual == v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn all_terms_must_match() {
        let sel = LabelSelector::parse("a=1,b=2");
        assert!(sel.matches(Some(&labels(&[("a", "1"), ("b", "2"), ("c", "3")]))));
        assert!(!sel.matches(Some(&labels(&[("a", "1")]))));
        assert!(!sel.matches(Some(&labels(&[("a", "1"), ("b", "3")]))));
        assert!(!sel.matches(None));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel = LabelSelector::parse("");
        assert!(sel.matches(None));
        assert!(sel.matches(Some(&labels(&[("a", "1")]))));
    }
}
