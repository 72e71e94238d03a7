use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::seats::SeatGrid;
use crate::utils::error::AppError;

/// Largest row or column count a studio may declare.
pub const MAX_GRID_DIMENSION: i32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Studio {
    pub id: Uuid,
    pub name: String,
    pub total_rows: i32,
    pub total_cols: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Studio {
    pub fn grid(&self) -> Result<SeatGrid, AppError> {
        SeatGrid::new(self.total_rows, self.total_cols)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudioInput {
    pub name: String,
    pub total_rows: i32,
    pub total_cols: i32,
}

impl StudioInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("studio name is required".into()));
        }
        SeatGrid::new(self.total_rows, self.total_cols).map(|_| ())
    }
}

/// Seat map served to clients so they can render the grid.
#[derive(Debug, Clone, Serialize)]
pub struct StudioLayout {
    pub id: Uuid,
    pub name: String,
    pub total_rows: i32,
    pub total_cols: i32,
    pub seats: Vec<Vec<String>>,
}

impl TryFrom<Studio> for StudioLayout {
    type Error = AppError;

    fn try_from(studio: Studio) -> Result<Self, Self::Error> {
        let seats = studio.grid()?.layout();
        Ok(Self {
            id: studio.id,
            name: studio.name,
            total_rows: studio.total_rows,
            total_cols: studio.total_cols,
            seats,
        })
    }
}
