//! Safe interpolation of identifiers into endpoint paths.

use super::{EgressError, Result};

/// Longest identifier accepted as a path segment.
pub const MAX_SEGMENT_LEN: usize = 128;

/// An identifier that is safe to place in a single path segment.
///
/// Accepts ASCII letters, digits, `.`, `_`, and `-`, up to
/// [`MAX_SEGMENT_LEN`] characters. `.` and `..` are rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment(String);

impl PathSegment {
    /// Validate `value`; `field` names it in the error.
    pub fn parse(value: &str, field: &'static str) -> Result<Self> {
        let valid_chars = value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if value.is_empty()
            || value.len() > MAX_SEGMENT_LEN
            || !valid_chars
            || value == "."
            || value == ".."
        {
            return Err(EgressError::InvalidPathSegment(field));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathSegment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Join literal path parts and validated segments into a root-relative endpoint.
///
/// ```ignore
/// let team = PathSegment::parse("my-team", "teamSlug")?;
/// assert_eq!(endpoint_path(&["v1", "teams", team.as_str(), "projects"]), "/v1/teams/my-team/projects");
/// ```
pub fn endpoint_path(parts: &[&str]) -> String {
    let mut path = String::new();
    for part in parts {
        path.push('/');
        path.push_str(part.trim_matches('/'));
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EgressErrorKind;

    #[test]
    fn test_valid_segments() {
        let longest = "a".repeat(MAX_SEGMENT_LEN);
        for value in ["abc", "team_123", "my-team", "v1.2", longest.as_str()] {
            assert_eq!(PathSegment::parse(value, "teamId").unwrap().as_str(), value);
        }
    }

    #[test]
    fn test_invalid_segments() {
        let too_long = "a".repeat(MAX_SEGMENT_LEN + 1);
        for value in [
            "",
            ".",
            "..",
            "a/b",
            "a\\b",
            "a%2fb",
            "a b",
            "team?x=1",
            "team#frag",
            "tëam",
            too_long.as_str(),
        ] {
            let err = PathSegment::parse(value, "teamId").unwrap_err();
            assert_eq!(err.kind(), EgressErrorKind::InvalidPathSegment, "{value:?}");
            assert_eq!(err.to_string(), "Invalid teamId");
        }
    }

    #[test]
    fn test_endpoint_path() {
        let team = PathSegment::parse("abc", "teamSlug").unwrap();
        assert_eq!(
            endpoint_path(&["v1", "teams", team.as_str(), "projects"]),
            "/v1/teams/abc/projects"
        );
        assert_eq!(endpoint_path(&["/v1/", "/teams"]), "/v1/teams");
        assert_eq!(endpoint_path(&[]), "/");
    }
}
