use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").expect("phone pattern"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{1,62})[a-z0-9]$").expect("slug pattern"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// International number, digits only with an optional leading `+`.
pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn validate_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Redirects are either app-relative paths or absolute http(s) URLs.
pub fn validate_redirect_url(url: &str) -> bool {
    let url = url.trim();
    if url.starts_with("//") {
        return false;
    }
    if url.starts_with('/') {
        return true;
    }
    match url.split_once("://") {
        Some((scheme, rest)) => matches!(scheme, "http" | "https") && !rest.is_empty(),
        None => false,
    }
}

/// Strips spaces and dashes users type into phone fields.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect()
}
