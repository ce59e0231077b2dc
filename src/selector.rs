// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Label selector parsing and namespace resolution.
//!
//! Supports the standard Kubernetes selector grammar:
//!
//! ```text
//! selector    = requirement ("," requirement)*
//! requirement = key | "!" key
//!             | key ("=" | "==" | "!=") value
//!             | key ("in" | "notin") "(" [value] ("," [value])* ")"
//!             | key (">" | "<") integer
//! ```
//!
//! An empty selector matches everything. Any other malformed input is
//! reported as [`SyncError::SelectorParse`].

use crate::error::{Result, SyncError};
use crate::store::{cancellable, ObjectStore};
use k8s_openapi::api::core::v1::Namespace;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

/// A single `key <op> values` clause; a selector is the conjunction of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
            Operator::GreaterThan | Operator::LessThan => {
                let (Some(actual), Some(bound)) = (
                    value.and_then(|v| v.parse::<i64>().ok()),
                    self.values.iter().next().and_then(|v| v.parse::<i64>().ok()),
                ) else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.values.iter().next().map(String::as_str).unwrap_or("");
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, first),
            Operator::NotEquals => write!(f, "{}!={}", self.key, first),
            Operator::GreaterThan => write!(f, "{}>{}", self.key, first),
            Operator::LessThan => write!(f, "{}<{}", self.key, first),
            Operator::In | Operator::NotIn => {
                let op = if self.operator == Operator::In { "in" } else { "notin" };
                let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
                write!(f, "{} {} ({})", self.key, op, values.join(","))
            }
        }
    }
}

/// Parsed label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector without requirements, matching every object
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input)
            .parse()
            .map_err(|reason| SyncError::SelectorParse {
                selector: input.to_string(),
                reason,
            })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Keep only the namespaces whose labels satisfy this selector
    pub fn filter(&self, namespaces: Vec<Namespace>) -> Vec<Namespace> {
        let empty = BTreeMap::new();
        namespaces
            .into_iter()
            .filter(|ns| self.matches(ns.metadata.labels.as_ref().unwrap_or(&empty)))
            .collect()
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parse `selector` and list the namespaces matching it.
///
/// A malformed selector fails before the store is contacted, so callers never
/// act on a partial or empty result.
#[instrument(skip(store, token))]
pub async fn resolve_namespaces<S: ObjectStore>(
    store: &S,
    selector: &str,
    token: &CancellationToken,
) -> Result<Vec<Namespace>> {
    let parsed = LabelSelector::parse(selector)?;
    let listed = cancellable(token, store.list::<Namespace>(None, &parsed)).await?;
    // Listing filters server-side; re-check so the result never depends on the store honouring it
    let namespaces = parsed.filter(listed);
    debug!("Selector '{}' matched {} namespaces", parsed, namespaces.len());
    Ok(namespaces)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Not,
    Equals,
    DoubleEquals,
    NotEquals,
    GreaterThan,
    LessThan,
    OpenParen,
    CloseParen,
    Comma,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::NotEquals);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::DoubleEquals);
                } else {
                    tokens.push(Token::Equals);
                }
            }
            '>' => {
                chars.next();
                tokens.push(Token::GreaterThan);
            }
            '<' => {
                chars.next();
                tokens.push(Token::LessThan);
            }
            '(' => {
                chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::CloseParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            _ => {
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || "!=<>(),".contains(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Identifier(input[pos..end].to_string()));
            }
        }
    }

    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            tokens: tokenize(input),
            pos: 0,
        }
    }

    fn parse(mut self) -> std::result::Result<LabelSelector, String> {
        let mut requirements = Vec::new();

        if self.tokens.is_empty() {
            return Ok(LabelSelector { requirements });
        }

        loop {
            requirements.push(self.requirement()?);
            match self.next() {
                None => break,
                Some(Token::Comma) => continue,
                Some(other) => return Err(format!("expected ',' but found {:?}", other)),
            }
        }

        Ok(LabelSelector { requirements })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn requirement(&mut self) -> std::result::Result<Requirement, String> {
        let (key, negated) = match self.next() {
            Some(Token::Not) => (self.key()?, true),
            Some(Token::Identifier(key)) => (validate_key(key)?, false),
            Some(other) => return Err(format!("expected a label key but found {:?}", other)),
            None => return Err("expected a label key but found end of input".to_string()),
        };

        if negated {
            return Ok(Requirement {
                key,
                operator: Operator::DoesNotExist,
                values: BTreeSet::new(),
            });
        }

        let (operator, values) = match self.peek() {
            None | Some(Token::Comma) => (Operator::Exists, BTreeSet::new()),
            Some(Token::Equals) | Some(Token::DoubleEquals) => {
                self.next();
                (Operator::Equals, BTreeSet::from([self.value()?]))
            }
            Some(Token::NotEquals) => {
                self.next();
                (Operator::NotEquals, BTreeSet::from([self.value()?]))
            }
            Some(Token::GreaterThan) | Some(Token::LessThan) => {
                let operator = if self.next() == Some(Token::GreaterThan) {
                    Operator::GreaterThan
                } else {
                    Operator::LessThan
                };
                let bound = self.value()?;
                if bound.parse::<i64>().is_err() {
                    return Err(format!("'{}' is not an integer", bound));
                }
                (operator, BTreeSet::from([bound]))
            }
            Some(Token::Identifier(word)) if word == "in" || word == "notin" => {
                let operator = if word == "in" {
                    Operator::In
                } else {
                    Operator::NotIn
                };
                self.next();
                (operator, self.value_set()?)
            }
            Some(other) => {
                return Err(format!("unexpected {:?} after key '{}'", other, key));
            }
        };

        Ok(Requirement {
            key,
            operator,
            values,
        })
    }

    fn key(&mut self) -> std::result::Result<String, String> {
        match self.next() {
            Some(Token::Identifier(key)) => validate_key(key),
            Some(other) => Err(format!("expected a label key but found {:?}", other)),
            None => Err("expected a label key but found end of input".to_string()),
        }
    }

    /// Value after `=`, `!=`, `>` or `<`; an empty value is allowed for equality
    fn value(&mut self) -> std::result::Result<String, String> {
        match self.peek().cloned() {
            Some(Token::Identifier(value)) => {
                self.pos += 1;
                validate_value(value)
            }
            None | Some(Token::Comma) => Ok(String::new()),
            Some(other) => Err(format!("expected a label value but found {:?}", other)),
        }
    }

    /// Parenthesised value list. An omitted element stands for the empty
    /// value, so `()` is `{""}` and `(a,)` is `{"a", ""}`.
    fn value_set(&mut self) -> std::result::Result<BTreeSet<String>, String> {
        if self.next() != Some(Token::OpenParen) {
            return Err("expected '(' to open the value set".to_string());
        }

        let mut values = BTreeSet::new();
        loop {
            match self.peek().cloned() {
                Some(Token::Identifier(value)) => {
                    self.pos += 1;
                    values.insert(validate_value(value)?);
                }
                Some(Token::Comma) | Some(Token::CloseParen) => {
                    values.insert(String::new());
                }
                other => return Err(format!("expected a label value but found {:?}", other)),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::CloseParen) => break,
                other => return Err(format!("expected ',' or ')' but found {:?}", other)),
            }
        }

        Ok(values)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(is_name_char)
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

/// DNS-1123 subdomain: dot-separated lowercase alphanumeric labels
fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LENGTH
        && prefix.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= MAX_NAME_LENGTH
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && label.starts_with(|c: char| c.is_ascii_alphanumeric())
                && label.ends_with(|c: char| c.is_ascii_alphanumeric())
        })
}

fn validate_key(key: String) -> std::result::Result<String, String> {
    let valid = match key.split_once('/') {
        Some((prefix, name)) => is_valid_prefix(prefix) && is_valid_name(name),
        None => is_valid_name(&key),
    };
    if valid {
        Ok(key)
    } else {
        Err(format!("'{}' is not a valid label key", key))
    }
}

fn validate_value(value: String) -> std::result::Result<String, String> {
    if value.is_empty() || is_valid_name(&value) {
        Ok(value)
    } else {
        Err(format!("'{}' is not a valid label value", value))
    }
}
