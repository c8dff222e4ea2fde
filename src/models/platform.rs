use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_length, required_text, TitleResponse, TitleRow};
use crate::error::{AppResult, FieldErrors};

pub const NAME_MAX_LEN: usize = 30;
pub const ABOUT_MAX_LEN: usize = 150;
pub const WEBSITE_MAX_LEN: usize = 100;

/// A streaming platform
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PlatformRow {
    pub id: i64,
    pub name: String,
    pub about: String,
    pub website: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlatform {
    pub name: String,
    pub about: String,
    pub website: String,
}

impl PlatformPayload {
    pub fn validate(self) -> AppResult<NewPlatform> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", self.name, NAME_MAX_LEN);
        let about = self.about.unwrap_or_default();
        check_length(&mut errors, "about", &about, ABOUT_MAX_LEN);

        let website = required_text(&mut errors, "website", self.website, WEBSITE_MAX_LEN);
        if errors.get("website").is_none() && !is_web_url(&website) {
            errors.add("website", "Enter a valid URL.");
        }

        errors.into_result()?;

        Ok(NewPlatform {
            name,
            about,
            website,
        })
    }
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

/// Wire record with every title of the platform expanded inline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformResponse {
    pub id: i64,
    pub watchlist: Vec<TitleResponse>,
    pub name: String,
    pub about: String,
    pub website: String,
}

impl PlatformResponse {
    pub fn from_row(platform: PlatformRow, titles: Vec<TitleRow>) -> Self {
        Self {
            id: platform.id,
            watchlist: titles.into_iter().map(TitleResponse::from).collect(),
            name: platform.name,
            about: platform.about,
            website: platform.website,
        }
    }

    /// Groups a batch of titles under their platforms, keeping platform order
    pub fn from_rows(platforms: Vec<PlatformRow>, titles: Vec<TitleRow>) -> Vec<Self> {
        let mut by_platform: HashMap<i64, Vec<TitleRow>> = HashMap::new();
        for title in titles {
            by_platform.entry(title.platform_id).or_default().push(title);
        }

        platforms
            .into_iter()
            .map(|platform| {
                let titles = by_platform.remove(&platform.id).unwrap_or_default();
                Self::from_row(platform, titles)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::Utc;

    fn platform(id: i64, name: &str) -> PlatformRow {
        PlatformRow {
            id,
            name: name.to_string(),
            about: String::new(),
            website: "https://example.com".to_string(),
        }
    }

    fn title(id: i64, platform_id: i64) -> TitleRow {
        TitleRow {
            id,
            title: format!("Title {}", id),
            storyline: String::new(),
            active: true,
            average_rating: 0.0,
            rating_count: 0,
            platform_id,
            platform_name: String::new(),
            created: Utc::now(),
        }
    }

    #[test]
    fn test_website_must_be_http_url() {
        let payload = PlatformPayload {
            name: Some("Netflix".into()),
            about: None,
            website: Some("not a url".into()),
        };
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));

        let payload = PlatformPayload {
            name: Some("Netflix".into()),
            about: Some("Streaming".into()),
            website: Some("ftp://netflix.com".into()),
        };
        assert!(payload.validate().is_err());

        let payload = PlatformPayload {
            name: Some("Netflix".into()),
            about: Some("Streaming".into()),
            website: Some("https://netflix.com".into()),
        };
        assert_eq!(payload.validate().unwrap().name, "Netflix");
    }

    #[test]
    fn test_name_length_limit() {
        let payload = PlatformPayload {
            name: Some("n".repeat(NAME_MAX_LEN + 1)),
            about: None,
            website: Some("https://example.com".into()),
        };
        match payload.validate() {
            Err(AppError::Validation(errors)) => assert!(errors.get("name").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_rows_groups_titles_per_platform() {
        let platforms = vec![platform(1, "Netflix"), platform(2, "Prime"), platform(3, "Empty")];
        let titles = vec![title(10, 2), title(11, 1), title(12, 2)];

        let responses = PlatformResponse::from_rows(platforms, titles);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].watchlist.len(), 1);
        assert_eq!(responses[1].watchlist.iter().map(|t| t.id).collect::<Vec<_>>(), vec![10, 12]);
        assert!(responses[2].watchlist.is_empty());
    }
}
