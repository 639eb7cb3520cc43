use std::collections::HashMap;

use crate::matcher::{Database, MatchResult};

/// How a pattern's terminal node constrains which names it matches (§3
/// "Domain tree").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    /// `domain.com` — matches only the exact name.
    ExactOnly,
    /// `.domain.com` — matches the name itself and every subdomain.
    SelfAndSubdomains,
    /// `*.domain.com` — matches subdomains but not the name itself.
    SubdomainsOnly,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    rule: Option<(Marker, String)>,
}

/// A reverse-labelled trie of blocked domain patterns.
///
/// Labels are inserted root-to-leaf in TLD-first order so a lookup walks the
/// query name the same way, accumulating every marker seen along the path
/// and resolving ambiguity in favour of the most specific (deepest) one, per
/// §3's explicit tie-break rule.
#[derive(Debug, Default)]
pub struct DomainTree {
    list_name: String,
    root: Node,
}

fn labels_of(name: &str) -> Vec<String> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_ascii_lowercase())
        .collect()
}

impl DomainTree {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            root: Node::default(),
        }
    }

    /// Inserts a pattern: `domain.com` (exact), `.domain.com` (self and
    /// subdomains), or `*.domain.com` (subdomains only).
    pub fn insert(&mut self, pattern: &str, rule_id: impl Into<String>) {
        let (labels, marker) = if let Some(rest) = pattern.strip_prefix("*.") {
            (labels_of(rest), Marker::SubdomainsOnly)
        } else if let Some(rest) = pattern.strip_prefix('.') {
            (labels_of(rest), Marker::SelfAndSubdomains)
        } else {
            (labels_of(pattern), Marker::ExactOnly)
        };

        let mut node = &mut self.root;
        for label in labels.iter().rev() {
            node = node.children.entry(label.clone()).or_default();
        }
        node.rule = Some((marker, rule_id.into()));
    }

    pub fn len(&self) -> usize {
        fn count(node: &Node) -> usize {
            node.rule.is_some() as usize + node.children.values().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Database for DomainTree {
    fn match_name(&self, name: &str) -> Option<MatchResult> {
        let labels = labels_of(name);
        let total = labels.len();

        let mut node = &self.root;
        let mut seen = Vec::new();
        for (i, label) in labels.iter().rev().enumerate() {
            let Some(next) = node.children.get(label) else { break };
            node = next;
            if let Some((marker, rule_id)) = &node.rule {
                seen.push((i + 1, *marker, rule_id.clone()));
            }
        }

        for (depth, marker, rule_id) in seen.into_iter().rev() {
            let eligible = match marker {
                Marker::ExactOnly => depth == total,
                Marker::SelfAndSubdomains => true,
                Marker::SubdomainsOnly => depth < total,
            };
            if eligible {
                return Some(MatchResult::new(self.list_name.clone(), rule_id));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_only_does_not_match_subdomains() {
        let mut tree = DomainTree::new("test");
        tree.insert("example.com", "r1");
        assert!(tree.match_name("example.com").is_some());
        assert!(tree.match_name("www.example.com").is_none());
    }

    #[test]
    fn self_and_subdomains_matches_both() {
        let mut tree = DomainTree::new("test");
        tree.insert(".example.com", "r1");
        assert!(tree.match_name("example.com").is_some());
        assert!(tree.match_name("deep.www.example.com").is_some());
    }

    #[test]
    fn subdomains_only_excludes_the_bare_name() {
        let mut tree = DomainTree::new("test");
        tree.insert("*.example.com", "r1");
        assert!(tree.match_name("example.com").is_none());
        assert!(tree.match_name("www.example.com").is_some());
    }

    #[test]
    fn more_specific_rule_wins_on_ambiguity() {
        let mut tree = DomainTree::new("test");
        tree.insert(".example.com", "parent");
        tree.insert("*.ads.example.com", "child-subdomains-only");

        let hit = tree.match_name("ads.example.com").unwrap();
        assert_eq!(hit.rule_id, "parent", "child rule is subdomains-only and excludes itself");

        let hit = tree.match_name("tracker.ads.example.com").unwrap();
        assert_eq!(hit.rule_id, "child-subdomains-only");
    }
}
