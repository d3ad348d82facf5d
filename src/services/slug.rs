use once_cell::sync::Lazy;
use regex::Regex;

use crate::middleware::logging::ApiError;

pub static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern is valid"));

/// Lowercase ASCII, runs of anything else collapsed to a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Explicit slug when given, otherwise derived from the name.
pub fn slug_or_derive(slug: Option<&str>, name: &str) -> String {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_lowercase(),
        None => slugify(name),
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// [`slug_or_derive`] followed by the pattern check.
pub fn checked_slug(slug: Option<&str>, name: &str) -> Result<String, ApiError> {
    let slug = slug_or_derive(slug, name);
    if is_valid_slug(&slug) {
        Ok(slug)
    } else {
        Err(ApiError::ValidationFail(
            "Slug may only contain lowercase letters, numbers and single hyphens".to_owned(),
        ))
    }
}
