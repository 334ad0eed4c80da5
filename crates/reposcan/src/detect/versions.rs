//! Permissive version extraction over raw manifest text.
//!
//! These are heuristics, not manifest parsers. Every function returns an empty
//! string when nothing version-shaped follows the framework name, and callers
//! store that empty string as-is.

use regex::Regex;

/// First `[\d.]+` run after the first occurrence of `name`, skipping any
/// non-digit characters in between. Works for pom.xml, csproj, Gradle and SBT
/// alike because all of them put the version somewhere after the artifact name.
pub fn version_after(content: &str, name: &str) -> String {
    let pattern = format!(r"{}[^\d]*([\d.]+)", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return String::new();
    };
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_version(m.as_str()))
        .unwrap_or_default()
}

/// Version of a gem in a Gemfile. Understands the explicit
/// `version: "1.2.3"` form and the usual `gem 'name', '~> 1.2'` requirement.
pub fn gemfile_version(content: &str, name: &str) -> String {
    let explicit = format!(
        r#"{}.*?version:\s*["'](\d+\.\d+\.\d+)["']"#,
        regex::escape(name)
    );
    if let Some(version) = Regex::new(&explicit)
        .ok()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
    {
        return version.as_str().to_string();
    }

    let requirement = format!(
        r#"gem\s+["']{}[^"']*["']\s*,\s*["'][~><=!\s]*(\d+(?:\.\d+)*)["']"#,
        regex::escape(name)
    );
    Regex::new(&requirement)
        .ok()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Pinned version from a requirements.txt line (`pytest==7.4.0`).
pub fn pinned_requirement(line: &str) -> String {
    line.split("==")
        .nth(1)
        .map(|v| v.split([';', '#', ' ']).next().unwrap_or_default().trim().to_string())
        .unwrap_or_default()
}

fn clean_version(raw: &str) -> String {
    let trimmed = raw.trim_matches('.');
    if trimmed.chars().any(|c| c.is_ascii_digit()) {
        trimmed.to_string()
    } else {
        String::new()
    }
}
