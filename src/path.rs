//! Route path canonicalization.
//!
//! Every path that reaches the registry or the router goes through
//! [`normalize`]. The canonical form has exactly one leading separator and no
//! run of two or more separators anywhere in the string. A single trailing
//! separator is kept, so `/foo/` and `/foo` stay distinct routes.
//!
//! ```rust
//! use rest_kit::path::{join, normalize};
//!
//! assert_eq!(normalize("//api//v0//resource/"), "/api/v0/resource/");
//! assert_eq!(join("v1", "/echo/*msg"), "/v1/echo/*msg");
//! ```

use std::sync::LazyLock;

use regex_lite::Regex;

/// Path segment separator.
pub const SEPARATOR: char = '/';

static DUPLICATE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("/{2,}").expect("separator pattern is a valid regex"));

/// Errors produced while canonicalizing or validating a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The raw path bytes are not valid UTF-8.
    #[error("path contains invalid utf-8 after byte {valid_up_to}")]
    InvalidEncoding {
        /// Length of the longest valid UTF-8 prefix.
        valid_up_to: usize,
    },

    /// The route template cannot be mounted.
    #[error("invalid route template {path}: {reason}")]
    InvalidTemplate {
        /// The offending template.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Normalize a route path.
///
/// The empty string is returned unchanged. Anything else gets a leading
/// separator and has every run of separators collapsed to one.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let prefixed = format!("{SEPARATOR}{path}");
    DUPLICATE_SEPARATORS.replace_all(&prefixed, "/").into_owned()
}

/// Normalize a path given as raw bytes.
///
/// Malformed UTF-8 is reported as [`PathError::InvalidEncoding`] so callers
/// can reject the registration instead of aborting.
pub fn normalize_bytes(path: &[u8]) -> Result<String, PathError> {
    let text = std::str::from_utf8(path).map_err(|e| PathError::InvalidEncoding {
        valid_up_to: e.valid_up_to(),
    })?;
    Ok(normalize(text))
}

/// Join a group prefix and a resource path, then normalize the result.
pub fn join(group: &str, resource: &str) -> String {
    normalize(&format!("{group}{SEPARATOR}{resource}"))
}

/// Check that a normalized route template can be handed to the router.
///
/// Parameter (`:name`) and wildcard (`*name`) segments must be named, and a
/// wildcard may only appear as the final segment.
pub fn validate_template(path: &str) -> Result<(), PathError> {
    let invalid = |reason| PathError::InvalidTemplate {
        path: path.to_string(),
        reason,
    };

    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    let last = segments.len().saturating_sub(1);
    for (index, segment) in segments.iter().enumerate() {
        if *segment == ":" {
            return Err(invalid("parameter segment has no name"));
        }
        if let Some(name) = segment.strip_prefix('*') {
            if name.is_empty() {
                return Err(invalid("wildcard segment has no name"));
            }
            if index != last {
                return Err(invalid("wildcard must be the last segment"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_table() {
        let cases = [
            ("", ""),
            ("/", "/"),
            ("//", "/"),
            ("///", "/"),
            ("/api/v0/resource", "/api/v0/resource"),
            ("/api//v0/resource", "/api/v0/resource"),
            ("//api/v0/resource", "/api/v0/resource"),
            ("//api//v0//resource/", "/api/v0/resource/"),
            ("api/v0", "/api/v0"),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_normalize_keeps_single_trailing_separator() {
        assert_eq!(normalize("/foo/"), "/foo/");
        assert_eq!(normalize("/foo"), "/foo");
        assert_eq!(normalize("/foo///"), "/foo/");
    }

    #[test]
    fn test_normalize_bytes_rejects_invalid_utf8() {
        let err = normalize_bytes(b"/api/\xff\xfe").unwrap_err();
        assert_eq!(err, PathError::InvalidEncoding { valid_up_to: 5 });
    }

    #[test]
    fn test_normalize_bytes_accepts_multibyte() {
        assert_eq!(normalize_bytes("//café//menu".as_bytes()).unwrap(), "/café/menu");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("v1", "echo"), "/v1/echo");
        assert_eq!(join("/v1/", "/echo/*msg"), "/v1/echo/*msg");
        assert_eq!(join("", "/metrics"), "/metrics");
        assert_eq!(join("", ""), "/");
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("/v1/echo/*msg").is_ok());
        assert!(validate_template("/apis/:group").is_ok());
        assert!(validate_template("/apis/").is_ok());
        assert!(validate_template("/a/:").is_err());
        assert!(validate_template("/a/*").is_err());
        assert!(validate_template("/a/*rest/b").is_err());
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(path in "[a-z/:*]{0,24}") {
            let once = normalize(&path);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_has_no_duplicate_separators(path in "[a-z/]{0,24}") {
            let normalized = normalize(&path);
            prop_assert!(!normalized.contains("//"));
            prop_assert!(normalized.is_empty() || normalized.starts_with('/'));
        }
    }
}
