//! Entities, inbound payloads and wire records.

pub mod platform;
pub mod review;
pub mod title;

pub use platform::{NewPlatform, PlatformPayload, PlatformResponse, PlatformRow};
pub use review::{NewReview, ReviewFilter, ReviewPayload, ReviewResponse, ReviewRow};
pub use title::{NewTitle, TitlePayload, TitleResponse, TitleRow};

use crate::error::FieldErrors;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";

/// Required, non-blank text no longer than `max` characters
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max: usize,
) -> String {
    match value {
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
        Some(value) if value.trim().is_empty() => {
            errors.add(field, BLANK);
            value
        }
        Some(value) => {
            check_length(errors, field, &value, max);
            value
        }
    }
}

pub(crate) fn check_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
    }
}
