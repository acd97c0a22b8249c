//! Database models for Folio
//!
//! Every model is a plain record with CRUD operations implemented as
//! associated async functions taking a `&PgPool`.
//!
//! # Models
//!
//! - `admin_user`: Admin accounts for the dashboard
//! - `project`: Portfolio projects
//! - `blog_post`: Blog posts with slugs, publish state and view counters
//! - `testimonial`: Client testimonials
//! - `skill`: Skills with proficiency levels
//! - `consultation`: Consultation booking requests
//! - `contact_message`: Contact form messages
//! - `subscriber`: Newsletter subscribers
//! - `campaign`: Email campaigns
//! - `analytics_event`: Page views and click events

pub mod admin_user;
pub mod analytics_event;
pub mod blog_post;
pub mod campaign;
pub mod consultation;
pub mod contact_message;
pub mod project;
pub mod skill;
pub mod subscriber;
pub mod testimonial;

use validator::{ValidationError, ValidationErrors};

/// Adds a field error unless `value` is blank or an absolute http(s) URL
pub fn validate_link(errors: &mut ValidationErrors, field: &'static str, value: &Option<String>) {
    let Some(raw) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return;
    };

    let valid = url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);

    if !valid {
        let mut error = ValidationError::new("url");
        error.message = Some("Must be an http(s) URL".into());
        errors.add(field, error);
    }
}

/// Folds derive-generated validation with extra checks into one result
pub(crate) fn finish_validation(
    derived: Result<(), ValidationErrors>,
    extra: impl FnOnce(&mut ValidationErrors),
) -> Result<(), ValidationErrors> {
    let mut errors = derived.err().unwrap_or_default();
    extra(&mut errors);

    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Normalises optional free-text input: trims, and maps blank strings to `None`
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trims every entry of a list and drops blank ones
pub(crate) fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&None), None);
        assert_eq!(non_blank(&Some("   ".to_string())), None);
        assert_eq!(non_blank(&Some(" Acme ".to_string())), Some("Acme".to_string()));
    }

    #[test]
    fn test_validate_link() {
        let mut errors = ValidationErrors::new();
        validate_link(&mut errors, "live_url", &None);
        validate_link(&mut errors, "live_url", &Some("  ".to_string()));
        validate_link(&mut errors, "live_url", &Some("https://example.com/app".to_string()));
        assert!(errors.errors().is_empty());

        validate_link(&mut errors, "repo_url", &Some("javascript:alert(1)".to_string()));
        assert!(errors.errors().contains_key("repo_url"));
    }

    #[test]
    fn test_finish_validation_merges_errors() {
        let result = finish_validation(Ok(()), |errors| {
            validate_link(errors, "live_url", &Some("not a url".to_string()))
        });
        assert!(result.is_err());

        assert!(finish_validation(Ok(()), |_| {}).is_ok());
    }

    #[test]
    fn test_clean_list() {
        let tags = vec![" rust ".to_string(), "".to_string(), "web".to_string()];
        assert_eq!(clean_list(&tags), vec!["rust".to_string(), "web".to_string()]);
    }
}
