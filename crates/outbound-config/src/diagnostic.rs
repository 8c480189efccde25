// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors and validation failures into
//! miette diagnostics with source spans, valid key listings, and
//! "did you mean?" suggestions using Jaro-Winkler similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(outbound::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
        /// Comma-separated valid keys for the section.
        valid_keys: String,
        /// Source span for the offending key.
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        /// The source file content for context display.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(outbound::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// The dotted key with the wrong type.
        key: String,
        /// Description of the type mismatch.
        detail: String,
        /// What type was expected.
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(outbound::config::missing_key),
        help("add `{key} = <value>` to your outbound.toml")
    )]
    MissingKey {
        /// The missing key name.
        key: String,
    },

    /// A value that deserialized but is semantically wrong.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(outbound::config::validation))]
    Validation {
        /// Dotted key (or array element) the problem belongs to.
        key: String,
        /// Description of the validation failure.
        message: String,
    },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(outbound::config::other))]
    Other(String),
}

impl ConfigError {
    /// Build a validation error for `key`.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            key: key.into(),
            message: message.into(),
        }
    }
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    suggestion.map_or_else(
        || format!("known keys here: {valid_keys}"),
        |s| format!("perhaps `{s}`? Known keys here: {valid_keys}"),
    )
}

/// Raw TOML text of every file the loader read, keyed by display path.
/// Used to attach source spans to unknown-key errors.
struct SourceMap<'a> {
    files: &'a [(String, String)],
}

impl<'a> SourceMap<'a> {
    /// The file a figment error came from. Inline strings carry no file
    /// metadata, in which case a lone source is assumed.
    fn origin(&self, error: &figment::error::Error) -> Option<&'a (String, String)> {
        let file = error.metadata.as_ref().and_then(|meta| match meta.source.as_ref()? {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
        match (file, self.files) {
            (Some(file), files) => files.iter().find(|(path, _)| *path == file),
            (None, [only]) => Some(only),
            (None, _) => None,
        }
    }

    fn locate(
        &self,
        error: &figment::error::Error,
        key: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let Some((path, content)) = self.origin(error) else {
            return (None, None);
        };
        match find_key_offset(content, &error.path, key) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), key.len())),
                Some(NamedSource::new(path, content.clone())),
            ),
            None => (None, None),
        }
    }
}

/// Translate every error in a `figment::Error` chain into a diagnostic.
pub fn figment_to_config_errors(err: figment::Error, toml_sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    let sources = SourceMap { files: toml_sources };
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(key, known) => {
                let (span, src) = sources.locate(&error, key);
                ConfigError::UnknownKey {
                    key: key.clone(),
                    suggestion: suggest_key::<&str>(key, known),
                    valid_keys: known.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(key) => ConfigError::MissingKey {
                key: dotted(&error.path, key),
            },
            Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("got {found}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn dotted(path: &[String], key: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(key))
        .collect::<Vec<_>>()
        .join(".")
}

/// Byte offset of `key` inside the table named by the first element of
/// `path` (`[table]` or `[[table]]`), or inside the document root when the
/// path is empty.
pub fn find_key_offset(content: &str, path: &[String], key: &str) -> Option<usize> {
    let body_start = match path.first() {
        None => 0,
        Some(table) => [format!("[[{table}]]"), format!("[{table}]")]
            .iter()
            .find_map(|header| content.find(header.as_str()).map(|at| at + header.len()))?,
    };

    let mut line_start = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        let is_assignment = rest
            .strip_prefix(key)
            .and_then(|after| after.trim_start_matches([' ', '\t']).chars().next())
            == Some('=');
        if is_assignment {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest known key by Jaro-Winkler similarity, if any clears the threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, known: &[S]) -> Option<String> {
    known
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key.as_ref()), key.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr with miette's graphical handler, preceded by
/// a count.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    let noun = if errors.len() == 1 { "problem" } else { "problems" };
    eprintln!("outbound: {} configuration {noun}", errors.len());
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("  {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_pause_threshold_for_typo() {
        let valid = &["pause_threshold", "warning_threshold", "window_days"];
        assert_eq!(
            suggest_key("pause_treshold", valid),
            Some("pause_threshold".to_string())
        );
    }

    #[test]
    fn unrelated_key_gets_no_suggestion() {
        assert_eq!(suggest_key("zzzzzz", &["host", "port", "timeout_secs"]), None);
    }

    #[test]
    fn key_prefix_of_another_is_not_matched() {
        let content = "[sending]\nutc_offset_hours_x = 1\nutc_offset_hours = -5\n";
        let path = vec!["sending".to_string()];
        let o = find_key_offset(content, &path, "utc_offset_hours").unwrap();
        assert!(content[o..].starts_with("utc_offset_hours = -5"));
    }

    #[test]
    fn find_key_offset_in_table_section() {
        let content = "[smtp]\nhots = \"mail\"\n";
        let path = vec!["smtp".to_string()];
        let o = find_key_offset(content, &path, "hots").unwrap();
        assert_eq!(&content[o..o + 4], "hots");
    }

    #[test]
    fn find_key_offset_in_array_section() {
        let content = "[[identities]]\naddress = \"a@b.com\"\npasword = \"x\"\n";
        let path = vec!["identities".to_string()];
        let o = find_key_offset(content, &path, "pasword").unwrap();
        assert_eq!(&content[o..o + 7], "pasword");
    }

    #[test]
    fn dotted_key_joins_path() {
        assert_eq!(dotted(&["smtp".to_string()], "host"), "smtp.host");
        assert_eq!(dotted(&[], "host"), "host");
        assert_eq!(
            dotted(&["identities".to_string(), "0".to_string()], "address"),
            "identities.0.address"
        );
    }
}
