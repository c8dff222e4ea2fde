use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_length, required_text};
use crate::error::{AppResult, FieldErrors};

pub const TITLE_MAX_LEN: usize = 50;
pub const STORYLINE_MAX_LEN: usize = 200;

/// A watchable title joined with the name of its platform
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TitleRow {
    pub id: i64,
    pub title: String,
    pub storyline: String,
    pub active: bool,
    pub average_rating: f64,
    pub rating_count: i32,
    pub platform_id: i64,
    pub platform_name: String,
    pub created: DateTime<Utc>,
}

/// Create/replace request body; `platform` is a platform id
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitlePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub storyline: Option<String>,
    #[serde(default)]
    pub platform: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Validated title fields ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct NewTitle {
    pub title: String,
    pub storyline: String,
    pub platform_id: i64,
    pub active: bool,
}

impl TitlePayload {
    /// Field-level checks; platform existence is checked by the repository
    pub fn validate(self) -> AppResult<NewTitle> {
        let mut errors = FieldErrors::new();

        let title = required_text(&mut errors, "title", self.title, TITLE_MAX_LEN);
        let storyline = self.storyline.unwrap_or_default();
        check_length(&mut errors, "storyline", &storyline, STORYLINE_MAX_LEN);

        let platform_id = match self.platform {
            Some(id) => id,
            None => {
                errors.add("platform", super::REQUIRED);
                0
            }
        };

        errors.into_result()?;

        Ok(NewTitle {
            title,
            storyline,
            platform_id,
            active: self.active.unwrap_or(true),
        })
    }
}

/// Wire record; the platform is embedded by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleResponse {
    pub id: i64,
    pub platform: String,
    pub title: String,
    pub storyline: String,
    pub active: bool,
    pub average_rating: f64,
    pub rating_count: i32,
    pub created: DateTime<Utc>,
}

impl From<TitleRow> for TitleResponse {
    fn from(row: TitleRow) -> Self {
        Self {
            id: row.id,
            platform: row.platform_name,
            title: row.title,
            storyline: row.storyline,
            active: row.active,
            average_rating: row.average_rating,
            rating_count: row.rating_count,
            created: row.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_validate_defaults_active_and_storyline() {
        let payload = TitlePayload {
            title: Some("Inception".to_string()),
            platform: Some(3),
            ..Default::default()
        };
        let title = payload.validate().unwrap();
        assert!(title.active);
        assert_eq!(title.storyline, "");
        assert_eq!(title.platform_id, 3);
    }

    #[test]
    fn test_validate_reports_every_bad_field() {
        let payload = TitlePayload {
            title: None,
            storyline: Some("x".repeat(STORYLINE_MAX_LEN + 1)),
            platform: None,
            active: None,
        };
        match payload.validate() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("title").is_some());
                assert!(errors.get("storyline").is_some());
                assert!(errors.get("platform").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_embeds_platform_name() {
        let row = TitleRow {
            id: 1,
            title: "Inception".to_string(),
            storyline: "Dreams".to_string(),
            active: true,
            average_rating: 4.5,
            rating_count: 2,
            platform_id: 9,
            platform_name: "Netflix".to_string(),
            created: Utc::now(),
        };
        let json = serde_json::to_value(TitleResponse::from(row)).unwrap();
        assert_eq!(json["platform"], "Netflix");
        assert_eq!(json["average_rating"], 4.5);
        assert!(json.get("platform_id").is_none());
    }
}
