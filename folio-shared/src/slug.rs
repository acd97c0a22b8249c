//! URL slugs for blog posts
//!
//! Slugs are lowercase ASCII words joined by `-`. Collisions are resolved by
//! appending `-2`, `-3`, ... to the base slug.

/// Slug used when the source text has no sluggable characters
pub const FALLBACK_SLUG: &str = "post";

/// Longest slug we generate, counted in bytes (slugs are ASCII)
pub const MAX_SLUG_LEN: usize = 80;

/// Turns arbitrary text into a slug
///
/// ```
/// use folio_shared::slug::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  "), "post");
/// ```
pub fn slugify(text: &str) -> String {
    let slug = ::slug::slugify(text);

    let slug = if slug.len() > MAX_SLUG_LEN {
        slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
    } else {
        slug
    };

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// The slug to try on the given attempt: `base` for attempts 0 and 1,
/// `base-N` afterwards
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Building a REST API in Rust"), "building-a-rest-api-in-rust");
        assert_eq!(slugify("  --Leading and trailing--  "), "leading-and-trailing");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Café Déjà Vu"), "cafe-deja-vu");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify(""), FALLBACK_SLUG);
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_candidate() {
        assert_eq!(candidate("my-post", 0), "my-post");
        assert_eq!(candidate("my-post", 1), "my-post");
        assert_eq!(candidate("my-post", 2), "my-post-2");
        assert_eq!(candidate("my-post", 10), "my-post-10");
    }
}
