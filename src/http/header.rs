use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Invalid head format: missing colon separator")]
    MissingColon,

    #[error("Invalid header format: empty header name")]
    EmptyHeaderName,

    #[error("Invalid header format: empty header value")]
    EmptyHeaderValue,

    #[error("Invalid header name: contains invalid characters")]
    InvalidHeaderName,

    #[error("Invalid header value: contains invalid characters")]
    InvalidHeaderValue,
}

#[derive(Debug, Clone)]
pub struct Headers {
    pub headers: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Headers {
            headers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let key = name.to_lowercase();

        self.headers
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn is_valid_token(s: &str) -> bool {
        !s.is_empty()
            && s.chars().all(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(
                        c,
                        '!' | '#'
                            | '$'
                            | '%'
                            | '&'
                            | '\''
                            | '*'
                            | '+'
                            | '-'
                            | '.'
                            | '^'
                            | '_'
                            | '`'
                            | '|'
                            | '~'
                    )
            })
    }

    fn is_valid_header_value(s: &str) -> bool {
        s.chars()
            .all(|c| matches!(c, ' ' | '\t') || c.is_ascii_graphic() || !c.is_ascii())
    }

    fn parse_header_line(line: &str) -> Result<(String, String), HeaderError> {
        let (name, value) = line.split_once(':').ok_or(HeaderError::MissingColon)?;

        let name = name.trim();
        let value = value.trim();

        if name.is_empty() {
            return Err(HeaderError::EmptyHeaderName);
        }

        if value.is_empty() {
            return Err(HeaderError::EmptyHeaderValue);
        }

        if !Self::is_valid_token(name) {
            return Err(HeaderError::InvalidHeaderName);
        }

        if !Self::is_valid_header_value(value) {
            return Err(HeaderError::InvalidHeaderValue);
        }

        Ok((name.to_string(), value.to_string()))
    }

    pub fn parse_headers(&mut self, lines: &str) -> Result<(), HeaderError> {
        for line in lines.split("\r\n") {
            if line.is_empty() {
                break;
            }
            let (name, value) = Self::parse_header_line(line)?;
            self.insert(name, value);
        }
        Ok(())
    }
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}
