// Copyright @yucwang 2026

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertiesError {
    #[error("line {line}: expected `key = \"value\"`")]
    MalformedLine { line: usize },
    #[error("line {line}: unterminated quoted value")]
    UnterminatedQuote { line: usize },
}

/// Ordered flat key/value record, one entry per property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy every entry of `other` into `self`; later values win.
    pub fn merge(&mut self, other: Properties) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose key starts with `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> Properties {
        Properties {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn parse(text: &str) -> Result<Properties, PropertiesError> {
        let mut props = Properties::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or(PropertiesError::MalformedLine { line })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(PropertiesError::MalformedLine { line });
            }
            props.set(key, parse_value(value.trim(), line)?);
        }
        Ok(props)
    }
}

fn parse_value(value: &str, line: usize) -> Result<String, PropertiesError> {
    let inner = match value.strip_prefix('"') {
        Some(rest) => rest,
        None => return Ok(value.to_string()),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(PropertiesError::UnterminatedQuote { line }),
            },
            '"' => {
                if chars.as_str().trim().is_empty() {
                    return Ok(out);
                }
                return Err(PropertiesError::MalformedLine { line });
            }
            _ => out.push(c),
        }
    }
    Err(PropertiesError::UnterminatedQuote { line })
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            writeln!(f, "{} = \"{}\"", key, escaped)?;
        }
        Ok(())
    }
}
