//! Slug validation and generation.
//!
//! A slug is the short URL identifier of a drop: 4-64 characters from
//! `[A-Za-z0-9_-]`, never equal to a reserved route segment.
//! Auto-generated slugs use the alphanumeric subset.

use rand::Rng;

/// Minimum slug length.
pub const MIN_LENGTH: usize = 4;
/// Maximum slug length.
pub const MAX_LENGTH: usize = 64;

/// Validate a user-supplied slug against the lexical rules.
///
/// Returns a human-readable reason on rejection.
pub fn validate(slug: &str, reserved: &[String]) -> Result<(), String> {
    if slug.len() < MIN_LENGTH || slug.len() > MAX_LENGTH {
        return Err(format!(
            "slug must be {MIN_LENGTH}-{MAX_LENGTH} characters, got {}",
            slug.len()
        ));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(format!("slug contains forbidden character {bad:?}"));
    }
    if reserved.iter().any(|r| r == slug) {
        return Err(format!("slug {slug:?} is reserved"));
    }
    Ok(())
}

/// Generate a random candidate slug of `length` characters drawn from
/// `alphabet`.
///
/// Uniqueness is NOT guaranteed here; the metadata store's unique
/// constraint is the source of truth, and the create path retries on
/// conflict.
pub fn generate(alphabet: &str, length: usize) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}
