use regex::Regex;

use crate::matcher::{Database, MatchResult};

/// An ordered list of compiled patterns; first match wins (§3 "Regex list").
#[derive(Debug, Default)]
pub struct RegexList {
    list_name: String,
    rules: Vec<(Regex, String)>,
}

impl RegexList {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            rules: Vec::new(),
        }
    }

    /// Parses one pattern per non-blank, non-`#`-comment line, in order.
    pub fn from_lines(list_name: impl Into<String>, text: &str) -> Result<Self, regex::Error> {
        let mut list = Self::new(list_name);
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            list.push(line, format!("line {}", n + 1))?;
        }
        Ok(list)
    }

    pub fn push(&mut self, pattern: &str, rule_id: impl Into<String>) -> Result<(), regex::Error> {
        self.rules.push((Regex::new(pattern)?, rule_id.into()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Database for RegexList {
    fn match_name(&self, name: &str) -> Option<MatchResult> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(name))
            .map(|(_, rule_id)| MatchResult::new(self.list_name.clone(), rule_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let text = "# comment\n\nads\\..*\nads\\.example\\.com";
        let list = RegexList::from_lines("test", text).unwrap();
        let hit = list.match_name("ads.example.com").unwrap();
        assert_eq!(hit.rule_id, "line 3");
    }

    #[test]
    fn no_match_returns_none() {
        let list = RegexList::from_lines("test", "ads\\..*").unwrap();
        assert!(list.match_name("example.com").is_none());
    }
}
