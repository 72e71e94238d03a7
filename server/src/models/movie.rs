use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub rating: Option<String>,
    pub poster_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieInput {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub rating: Option<String>,
    pub poster_url: Option<String>,
}

impl MovieInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("movie title is required".into()));
        }
        if self.duration_minutes <= 0 {
            return Err(AppError::Validation(
                "duration must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
