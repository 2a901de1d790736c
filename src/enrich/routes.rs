//! Route classification of URL pathnames.
//!
//! A route is a path template such as `/users/:id`. Templates are compiled
//! to anchored, case-insensitive regular expressions once, when the table
//! is built.
//!
//! Template syntax:
//! - `:name` matches one non-empty segment
//! - `:name(expr)` matches a segment against `expr`
//! - `?`, `*`, `+` after a parameter make it optional, zero-or-more or
//!   one-or-more segments
//! - `(expr)` is an unnamed parameter, a bare `*` matches anything
//! - `\` escapes the next character

use crate::config::{ConfigError, RouteConfig};
use regex::{Regex, RegexBuilder};

const DEFAULT_SEGMENT: &str = "[^/]+?";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param {
        prefixed: bool,
        pattern: String,
        modifier: Option<char>,
    },
    Wildcard,
}

/// Compile a path template into an anchored matcher.
pub fn compile_route(route: &str) -> Result<Regex, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRoute {
        route: route.to_string(),
        reason: reason.to_string(),
    };

    let tokens = tokenize(route).map_err(|reason| invalid(&reason))?;

    let mut source = String::from("^");
    for token in &tokens {
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(text)),
            Token::Wildcard => source.push_str("(.*)"),
            Token::Param {
                prefixed,
                pattern,
                modifier,
            } => {
                let prefix = if *prefixed { "/" } else { "" };
                let repeated = format!("(?:{pattern})(?:/(?:{pattern}))*");
                let fragment = match modifier {
                    None => format!("{prefix}({pattern})"),
                    Some('?') => format!("(?:{prefix}({pattern}))?"),
                    Some('+') => format!("{prefix}({repeated})"),
                    Some(_) => format!("(?:{prefix}({repeated}))?"),
                };
                source.push_str(&fragment);
            }
        }
    }
    if !route.ends_with('/') {
        source.push_str("(?:/)?");
    }
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| invalid(&e.to_string()))
}

fn tokenize(route: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = route.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => literal.push(escaped),
                None => return Err("dangling escape".to_string()),
            },
            ':' | '(' => {
                let mut name = String::new();
                if c == ':' {
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        return Err("parameter without a name".to_string());
                    }
                }

                let pattern = if c == '(' || chars.peek() == Some(&'(') {
                    if c == ':' {
                        chars.next();
                    }
                    read_group(&mut chars)?
                } else {
                    DEFAULT_SEGMENT.to_string()
                };

                let modifier = match chars.peek() {
                    Some(&m @ ('?' | '*' | '+')) => {
                        chars.next();
                        Some(m)
                    }
                    _ => None,
                };

                let prefixed = literal.ends_with('/');
                if prefixed {
                    literal.pop();
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Param {
                    prefixed,
                    pattern,
                    modifier,
                });
            }
            '*' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard);
            }
            ')' => return Err("unbalanced ')'".to_string()),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

/// Read a parenthesised expression whose opening `(` was already consumed.
fn read_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, String> {
    let mut depth = 1;
    let mut pattern = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                pattern.push(c);
                match chars.next() {
                    Some(escaped) => pattern.push(escaped),
                    None => return Err("dangling escape".to_string()),
                }
            }
            '(' => {
                depth += 1;
                pattern.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if pattern.is_empty() {
                        return Err("empty group".to_string());
                    }
                    return Ok(pattern);
                }
                pattern.push(c);
            }
            other => pattern.push(other),
        }
    }

    Err("unclosed '('".to_string())
}

/// A compiled route and the label it assigns.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub route: String,
    pub page: String,
    matcher: Regex,
}

impl RouteRule {
    pub fn new(config: &RouteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            route: config.route.clone(),
            page: config.page.clone(),
            matcher: compile_route(&config.route)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// Ordered route rules; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile every route, failing on the first malformed template.
    pub fn compile(routes: &[RouteConfig]) -> Result<Self, ConfigError> {
        let rules = routes.iter().map(RouteRule::new).collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// Label for `path`, or `path` itself when no rule matches.
    pub fn classify<'a>(&'a self, path: &'a str) -> &'a str {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.page.as_str())
            .unwrap_or(path)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
