//! Extra headers added to every message

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::HeaderError;

lazy_static! {
    // Printable US-ASCII except colon (RFC 5322 §2.2).
    static ref FIELD_NAME_REGEX: Regex = Regex::new(r"^[!-9;-~]+$").unwrap();
}

/// An ordered set of header fields applied to every message a sender renders.
///
/// Names are unique and compared ASCII case-insensitively: inserting a name that is
/// already present replaces its value and keeps the original spelling and position.
/// Names and values are rendered verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtraHeaders(Vec<(String, String)>);

impl ExtraHeaders {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over the headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The number of headers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse and validate a header line of the form `Name: value`.
    ///
    /// Used for headers that come from configuration text, where a stray CR or LF
    /// would otherwise let the value inject further header lines.
    pub fn parse_line(line: &str) -> Result<(String, String), HeaderError> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HeaderError::MissingSeparator(line.to_string()))?;

        let name = name.trim();
        let value = value.trim();

        if !FIELD_NAME_REGEX.is_match(name) {
            return Err(HeaderError::InvalidName(name.to_string()));
        }

        if value.contains(['\r', '\n']) {
            return Err(HeaderError::InvalidValue(name.to_string()));
        }

        Ok((name.to_string(), value.to_string()))
    }
}

impl<N, V> FromIterator<(N, V)> for ExtraHeaders
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();

        for (name, value) in iter {
            headers.insert(name, value);
        }

        headers
    }
}
