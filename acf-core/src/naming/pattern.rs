//! Glob-style host matching for environments
//!
//! `*` becomes `.*`; the rest of the pattern is a regular expression, so `.`
//! matches any character. Matching is case-insensitive and anchored at the
//! start of the host name only: a pattern without a trailing `*` still matches
//! longer host names that begin with it. Existing deployments rely on this
//! prefix behaviour.

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct HostPattern {
    source: String,
    regex: Regex,
}

impl HostPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern.replace('*', ".*");
        let regex = RegexBuilder::new(&format!("^(?:{})", body))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, host: &str) -> bool {
        self.regex.is_match(host)
    }

    /// Hosts matching the pattern, in input order
    pub fn filter<'a>(&self, hosts: &'a [String]) -> Vec<&'a str> {
        hosts
            .iter()
            .map(String::as_str)
            .filter(|h| self.matches(h))
            .collect()
    }
}
