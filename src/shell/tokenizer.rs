//! Splits a shell input line into tokens and classifies `--flag` arguments.

use std::collections::HashMap;

use crate::registry::{CommandDescriptor, RawParameterSource};

/// One whitespace-separated word. `quoted` is set when any part of the word
/// came from a double-quoted span; such words never act as flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    fn flag_body(&self) -> Option<&str> {
        if self.quoted {
            return None;
        }
        self.text.strip_prefix("--").filter(|rest| !rest.is_empty())
    }
}

/// Split on whitespace, honouring double quotes. Quote characters are
/// stripped; an unterminated quote runs to the end of the line.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current
                    .get_or_insert_with(|| Token {
                        text: String::new(),
                        quoted: true,
                    })
                    .quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            c => current
                .get_or_insert_with(|| Token {
                    text: String::new(),
                    quoted: false,
                })
                .text
                .push(c),
        }
    }
    tokens.extend(current);
    tokens
}

/// Sort argument tokens into flag-bound values and leftover positionals.
///
/// Accepts `--key=value`, `--key value` and a bare `--key` (bound to
/// `"true"` when no value follows). A repeated flag keeps its last value.
/// Flags naming a parameter `descriptor` does not declare are dropped
/// without consuming the following token.
pub fn parameter_source(tokens: &[Token], descriptor: &CommandDescriptor) -> RawParameterSource {
    let mut named = HashMap::new();
    let mut positional = Vec::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let Some(body) = token.flag_body() else {
            positional.push(token.text.clone());
            continue;
        };
        if let Some((key, value)) = body.split_once('=') {
            if descriptor.parameter(key).is_some() {
                named.insert(key.to_string(), value.to_string());
            }
            continue;
        }
        if descriptor.parameter(body).is_none() {
            continue;
        }
        let value = match iter.peek() {
            Some(next) if next.flag_body().is_none() => {
                let value = next.text.clone();
                iter.next();
                value
            }
            _ => "true".to_string(),
        };
        named.insert(body.to_string(), value);
    }

    RawParameterSource::Flagged { named, positional }
}
