//! Helpers for keeping tokens and host paths out of logs and span fields,
//! and for turning repository ids into safe directory names.

use std::path::Path;

/// Returns only the last component of a path.
///
/// Safe for span fields: names the scratch directory without exposing where
/// the scratch root lives.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo and the query string from a URL.
///
/// - `https://ghp_token@github.com/user/repo` → `https://****@github.com/user/repo`
/// - `https://codeload.github.com/acme/web/legacy.zip/main?token=abc` → `https://codeload.github.com/acme/web/legacy.zip/main?****`
/// - `git@github.com:user/repo.git` → unchanged
pub fn redact_repo_url(url: &str) -> String {
    // SSH URLs don't contain tokens
    if url.starts_with("git@") {
        return url.to_string();
    }

    let (base, has_query) = match url.find('?') {
        Some(pos) => (&url[..pos], true),
        None => (url, false),
    };

    let mut redacted = base.to_string();
    if let Some(scheme_end) = base.find("://") {
        let after_scheme = &base[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..authority_end].rfind('@') {
            let scheme = &base[..scheme_end + 3];
            redacted = format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    if has_query {
        redacted.push_str("?****");
    }
    redacted
}

/// Maps a repository id onto `[A-Za-z0-9._-]` so it can be part of a
/// directory name. Path separators, colons and the like become `_`.
pub fn safe_component(id: &str) -> String {
    let mapped: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Never "." or ".."
    let trimmed = mapped.trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/tmp/reposcan/repo-gh-1-123-abcd")),
            "repo-gh-1-123-abcd"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_repo_url_https_with_token() {
        assert_eq!(
            redact_repo_url("https://ghp_xxxx@github.com/user/repo.git"),
            "https://****@github.com/user/repo.git"
        );
    }

    #[test]
    fn test_redact_repo_url_query_token() {
        assert_eq!(
            redact_repo_url("https://codeload.github.com/acme/web/legacy.zip/main?token=AAAA"),
            "https://codeload.github.com/acme/web/legacy.zip/main?****"
        );
    }

    #[test]
    fn test_redact_repo_url_at_in_path_is_kept() {
        assert_eq!(
            redact_repo_url("https://example.com/files/user@example.com.zip"),
            "https://example.com/files/user@example.com.zip"
        );
    }

    #[test]
    fn test_redact_repo_url_no_token() {
        assert_eq!(
            redact_repo_url("https://github.com/user/repo.git"),
            "https://github.com/user/repo.git"
        );
        assert_eq!(
            redact_repo_url("git@github.com:user/repo.git"),
            "git@github.com:user/repo.git"
        );
    }

    #[test]
    fn test_safe_component() {
        assert_eq!(safe_component("github:acme/web"), "github_acme_web");
        assert_eq!(safe_component("gl-42"), "gl-42");
        assert_eq!(safe_component(".."), "_");
        assert_eq!(safe_component("../../etc"), "_.._etc");
    }
}
