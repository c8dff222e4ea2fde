use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::check_length;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::pagination::ListQuery;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const DESCRIPTION_MAX_LEN: usize = 200;

const INVALID_INTEGER: &str = "A valid integer is required.";

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub rating: i32,
    pub description: Option<String>,
    pub active: bool,
    pub review_user_id: i64,
    pub review_user: String,
    pub watchlist_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Create/replace request body. The author and title come from the request context
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPayload {
    /// Kept loose so type errors are reported against the field
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub rating: i32,
    pub description: Option<String>,
    pub active: bool,
}

impl ReviewPayload {
    pub fn validate(self) -> AppResult<NewReview> {
        let mut errors = FieldErrors::new();

        let rating = match self.rating.as_ref().map(integer_value) {
            None => {
                errors.add("rating", super::REQUIRED);
                0
            }
            Some(None) => {
                errors.add("rating", INVALID_INTEGER);
                0
            }
            Some(Some(rating)) if rating < MIN_RATING => {
                errors.add(
                    "rating",
                    format!("Ensure this value is greater than or equal to {}.", MIN_RATING),
                );
                0
            }
            Some(Some(rating)) if rating > MAX_RATING => {
                errors.add(
                    "rating",
                    format!("Ensure this value is less than or equal to {}.", MAX_RATING),
                );
                0
            }
            Some(Some(rating)) => rating as i32,
        };

        if let Some(description) = &self.description {
            check_length(&mut errors, "description", description, DESCRIPTION_MAX_LEN);
        }

        errors.into_result()?;

        Ok(NewReview {
            rating,
            description: self.description,
            active: self.active.unwrap_or(true),
        })
    }
}

/// Wire record; the author is rendered by username and the title is omitted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewResponse {
    pub id: i64,
    pub review_user: String,
    pub rating: i32,
    pub description: Option<String>,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            review_user: row.review_user,
            rating: row.rating,
            description: row.description,
            active: row.active,
            created: row.created,
            updated: row.updated,
        }
    }
}

/// Conjunctive review filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub watchlist_id: Option<i64>,
    pub username: Option<String>,
    pub active: Option<bool>,
}

impl ReviewFilter {
    /// Reviews of one title, narrowed by `review_user__username` and `active`
    pub fn for_title(watchlist_id: i64, query: &ListQuery) -> AppResult<Self> {
        let active = match query.get("active") {
            None | Some("") => None,
            Some(raw) => Some(parse_bool(raw).ok_or_else(|| {
                AppError::invalid("active", "Must be a valid boolean.")
            })?),
        };

        Ok(Self {
            watchlist_id: Some(watchlist_id),
            username: query
                .get("review_user__username")
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            active,
        })
    }

    pub fn by_username(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, review: &ReviewRow) -> bool {
        self.watchlist_id.map_or(true, |id| review.watchlist_id == id)
            && self
                .username
                .as_deref()
                .map_or(true, |name| review.review_user == name)
            && self.active.map_or(true, |active| review.active == active)
    }
}

/// Integer from a JSON number or numeric string; `4`, `4.0` and `"4"` all qualify
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(raw) => {
            let raw = raw.trim();
            let digits = raw
                .split_once('.')
                .filter(|(_, zeros)| zeros.chars().all(|c| c == '0'))
                .map_or(raw, |(whole, _)| whole);
            digits.parse().ok()
        }
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn query(uri: &str) -> ListQuery {
        ListQuery::from_uri(&uri.parse::<Uri>().unwrap()).unwrap()
    }

    fn review(watchlist_id: i64, user: &str, active: bool) -> ReviewRow {
        ReviewRow {
            id: 1,
            rating: 3,
            description: None,
            active,
            review_user_id: 1,
            review_user: user.to_string(),
            watchlist_id,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        for rating in [0, 6, -1] {
            let payload = ReviewPayload {
                rating: Some(rating.into()),
                ..Default::default()
            };
            assert!(payload.validate().is_err(), "rating {} should fail", rating);
        }
        for rating in 1..=5 {
            let payload = ReviewPayload {
                rating: Some(rating.into()),
                ..Default::default()
            };
            assert_eq!(payload.validate().unwrap().rating, rating as i32);
        }
    }

    #[test]
    fn test_rating_type_errors_land_on_the_field() {
        for raw in [r#"{"rating": 4.5}"#, r#"{"rating": "four"}"#, r#"{"rating": true}"#, r#"{"rating": [4]}"#] {
            let payload: ReviewPayload = serde_json::from_str(raw).unwrap();
            match payload.validate() {
                Err(AppError::Validation(errors)) => {
                    assert_eq!(errors.get("rating").unwrap()[0], INVALID_INTEGER, "{}", raw);
                }
                other => panic!("expected validation error for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_integral_rating_forms_are_accepted() {
        for raw in [r#"{"rating": 4}"#, r#"{"rating": 4.0}"#, r#"{"rating": "4"}"#, r#"{"rating": " 4.00 "}"#] {
            let payload: ReviewPayload = serde_json::from_str(raw).unwrap();
            assert_eq!(payload.validate().unwrap().rating, 4, "{}", raw);
        }
    }

    #[test]
    fn test_missing_rating_is_required() {
        match ReviewPayload::default().validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("rating").unwrap()[0], super::super::REQUIRED);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_parses_query() {
        let filter =
            ReviewFilter::for_title(4, &query("/4/reviews/?review_user__username=alice&active=True"))
                .unwrap();
        assert_eq!(filter.watchlist_id, Some(4));
        assert_eq!(filter.username.as_deref(), Some("alice"));
        assert_eq!(filter.active, Some(true));

        assert!(ReviewFilter::for_title(4, &query("/4/reviews/?active=maybe")).is_err());
    }

    #[test]
    fn test_filter_matches_intersection() {
        let filter = ReviewFilter {
            watchlist_id: Some(1),
            username: Some("alice".to_string()),
            active: Some(true),
        };
        assert!(filter.matches(&review(1, "alice", true)));
        assert!(!filter.matches(&review(1, "alice", false)));
        assert!(!filter.matches(&review(1, "bob", true)));
        assert!(!filter.matches(&review(2, "alice", true)));
        assert!(ReviewFilter::default().matches(&review(2, "bob", false)));
    }
}
