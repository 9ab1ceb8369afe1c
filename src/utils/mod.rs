//! Utility functions and helpers
//!
//! This module provides common utility functions used throughout the crate:
//! - Header text derivation
//! - Dotted path access into BSON documents
//! - Logging initialisation

/// String utilities
pub mod string {
    /// Convert an identifier to space separated, capitalised words
    ///
    /// Word boundaries are separators (`_`, `-`, `.`, whitespace), lower to
    /// upper case transitions, the end of an acronym and letter/digit changes.
    ///
    /// # Examples
    /// * `firstName` -> `First Name`
    /// * `created_at` -> `Created At`
    /// * `XMLHttpRequest` -> `XML Http Request`
    pub fn start_case(s: &str) -> String {
        split_words(s)
            .iter()
            .map(|word| upper_first(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Split an identifier into its words
    pub fn split_words(s: &str) -> Vec<String> {
        let chars: Vec<char> = s.chars().collect();
        let mut words = Vec::new();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            if !c.is_alphanumeric() {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                continue;
            }

            if let Some(prev) = current.chars().last() {
                let next = chars.get(i + 1).copied();
                let boundary = (prev.is_lowercase() && c.is_uppercase())
                    || (prev.is_alphabetic() && c.is_numeric())
                    || (prev.is_numeric() && c.is_alphabetic())
                    || (prev.is_uppercase()
                        && c.is_uppercase()
                        && next.is_some_and(|n| n.is_lowercase()));

                if boundary {
                    words.push(std::mem::take(&mut current));
                }
            }

            current.push(c);
        }

        if !current.is_empty() {
            words.push(current);
        }

        words
    }

    /// Uppercase the first character, keep the rest
    pub fn upper_first(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Dotted path helpers over BSON documents
pub mod path {
    use bson::{Bson, Document};

    /// Last segment of a dotted path
    pub fn last_segment(path: &str) -> &str {
        path.rsplit('.').next().unwrap_or(path)
    }

    /// Read the value at a dotted path
    ///
    /// Numeric segments index into arrays. Returns `None` when any segment is
    /// missing.
    pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
        let mut segments = path.split('.');
        let mut current = doc.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Bson::Document(inner) => inner.get(segment)?,
                Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Write a value at a dotted path, creating intermediate documents
    pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
        match path.split_once('.') {
            None => {
                doc.insert(path, value);
            }
            Some((head, rest)) => {
                if !matches!(doc.get(head), Some(Bson::Document(_))) {
                    doc.insert(head, Document::new());
                }
                if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                    set_path(inner, rest, value);
                }
            }
        }
    }

    /// Keep only the given dotted paths of a document
    ///
    /// Mirrors an inclusion projection: nested structure is preserved and
    /// `_id` is kept unless the projection excludes it.
    pub fn project(doc: &Document, projection: &Document) -> Document {
        if projection.is_empty() {
            return doc.clone();
        }

        let mut projected = Document::new();
        let exclude_id = matches!(projection.get("_id"), Some(v) if !is_truthy(v));
        if !exclude_id {
            if let Some(id) = doc.get("_id") {
                projected.insert("_id", id.clone());
            }
        }

        for (field, include) in projection {
            if !is_truthy(include) {
                continue;
            }
            if let Some(value) = get_path(doc, field) {
                set_path(&mut projected, field, value.clone());
            }
        }

        projected
    }

    /// Truthiness of projection flags (`1`, `true`)
    pub fn is_truthy(value: &Bson) -> bool {
        match value {
            Bson::Boolean(b) => *b,
            Bson::Int32(n) => *n != 0,
            Bson::Int64(n) => *n != 0,
            Bson::Double(f) => *f != 0.0,
            Bson::Null | Bson::Undefined => false,
            _ => true,
        }
    }
}

/// Logging initialisation
pub mod logging {
    use tracing_subscriber::EnvFilter;

    use crate::config::LoggingConfig;

    /// Install a global fmt subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured level. Returns `false`
    /// when a subscriber was already installed.
    pub fn init(config: &LoggingConfig) -> bool {
        let level = config.level.to_tracing_level();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false);

        if config.timestamps {
            subscriber.try_init().is_ok()
        } else {
            subscriber.without_time().try_init().is_ok()
        }
    }
}
