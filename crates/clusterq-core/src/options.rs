//! Submission directive options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a single submission directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectiveValue {
    Flag(bool),
    Int(i64),
    Str(String),
}

impl DirectiveValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectiveValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DirectiveValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            DirectiveValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for DirectiveValue {
    fn from(s: &str) -> Self {
        DirectiveValue::Str(s.to_string())
    }
}

impl From<i64> for DirectiveValue {
    fn from(i: i64) -> Self {
        DirectiveValue::Int(i)
    }
}

impl From<bool> for DirectiveValue {
    fn from(b: bool) -> Self {
        DirectiveValue::Flag(b)
    }
}

/// Submission directives, keyed uniquely by name. Renderers ignore keys
/// they do not recognize.
pub type SubmitOptions = BTreeMap<String, DirectiveValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_serde_keeps_types() {
        let mut opts = SubmitOptions::new();
        opts.insert("queue".into(), "debug".into());
        opts.insert("nodes".into(), 4.into());
        opts.insert("exclusive".into(), true.into());

        let text = serde_json::to_string(&opts).unwrap();
        let back: SubmitOptions = serde_json::from_str(&text).unwrap();
        assert_eq!(back["queue"].as_str(), Some("debug"));
        assert_eq!(back["nodes"].as_int(), Some(4));
        assert_eq!(back["exclusive"].as_flag(), Some(true));
    }
}
