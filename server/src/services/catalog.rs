//! Movies, studios, and showtimes.
//!
//! Everything is soft-deleted: rows keep existing for the bookings that reference them and
//! simply stop being listed or bookable.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::movie::{Movie, MovieInput};
use crate::models::showtime::{slot_end, Showtime, ShowtimeFilter, ShowtimeInput, ShowtimeListing};
use crate::models::studio::{Studio, StudioInput, StudioLayout};
use crate::services::schedule::{check_overlap, map_schedule_violation};
use crate::utils::error::AppError;

const LISTING_SELECT: &str = r#"
    SELECT s.id, s.movie_id, m.title AS movie_title, s.studio_id, st.name AS studio_name,
           s.start_time, s.end_time, s.price
    FROM showtimes s
    JOIN movies m ON m.id = s.movie_id
    JOIN studios st ON st.id = s.studio_id
    WHERE s.deleted_at IS NULL
      AND m.deleted_at IS NULL
      AND st.deleted_at IS NULL
"#;

#[derive(Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----- movies -----

    pub async fn create_movie(&self, input: &MovieInput) -> Result<Movie, AppError> {
        input.validate()?;

        let movie = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (id, title, description, duration_minutes, rating, poster_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.duration_minutes)
        .bind(&input.rating)
        .bind(&input.poster_url)
        .fetch_one(&self.pool)
        .await?;

        info!(movie_id = %movie.id, title = %movie.title, "Movie created");
        Ok(movie)
    }

    /// Existing showtimes keep the end time computed when they were scheduled.
    pub async fn update_movie(&self, id: Uuid, input: &MovieInput) -> Result<Movie, AppError> {
        input.validate()?;

        sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
            SET title = $2, description = $3, duration_minutes = $4, rating = $5,
                poster_url = $6, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.duration_minutes)
        .bind(&input.rating)
        .bind(&input.poster_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Movie", id))
    }

    pub async fn get_movie(&self, id: Uuid) -> Result<Movie, AppError> {
        sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Movie", id))
    }

    pub async fn list_movies(&self) -> Result<Vec<Movie>, AppError> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT * FROM movies WHERE deleted_at IS NULL ORDER BY title, created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    pub async fn delete_movie(&self, id: Uuid) -> Result<(), AppError> {
        soft_delete(&self.pool, "movies", id)
            .await?
            .then_some(())
            .ok_or_else(|| AppError::not_found("Movie", id))?;
        info!(movie_id = %id, "Movie deleted");
        Ok(())
    }

    // ----- studios -----

    pub async fn create_studio(&self, input: &StudioInput) -> Result<Studio, AppError> {
        input.validate()?;

        let studio = sqlx::query_as::<_, Studio>(
            r#"
            INSERT INTO studios (id, name, total_rows, total_cols)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.total_rows)
        .bind(input.total_cols)
        .fetch_one(&self.pool)
        .await?;

        info!(studio_id = %studio.id, rows = studio.total_rows, cols = studio.total_cols, "Studio created");
        Ok(studio)
    }

    /// Resizing fails while any held ticket on a live showtime would fall outside the new grid.
    pub async fn update_studio(&self, id: Uuid, input: &StudioInput) -> Result<Studio, AppError> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let studio = sqlx::query_as::<_, Studio>(
            r#"
            UPDATE studios
            SET name = $2, total_rows = $3, total_cols = $4, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.total_rows)
        .bind(input.total_cols)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Studio", id))?;

        let stranded: Option<String> = sqlx::query_scalar(
            r#"
            SELECT t.seat_label
            FROM tickets t
            JOIN showtimes s ON s.id = t.showtime_id
            WHERE s.studio_id = $1
              AND s.deleted_at IS NULL
              AND (ascii(substring(t.seat_label, 1, 1)) - ascii('A') >= $2
                   OR substring(t.seat_label, 2)::int > $3)
            ORDER BY substring(t.seat_label, 1, 1), substring(t.seat_label, 2)::int
            LIMIT 1
            "#,
        )
        .bind(id)
        .bind(input.total_rows)
        .bind(input.total_cols)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(seat) = stranded {
            return Err(AppError::Validation(format!(
                "seat {seat} is held by a booking and would fall outside the resized studio"
            )));
        }

        tx.commit().await?;
        Ok(studio)
    }

    pub async fn get_studio(&self, id: Uuid) -> Result<Studio, AppError> {
        sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Studio", id))
    }

    pub async fn list_studios(&self) -> Result<Vec<Studio>, AppError> {
        let studios =
            sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE deleted_at IS NULL ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(studios)
    }

    pub async fn delete_studio(&self, id: Uuid) -> Result<(), AppError> {
        soft_delete(&self.pool, "studios", id)
            .await?
            .then_some(())
            .ok_or_else(|| AppError::not_found("Studio", id))?;
        info!(studio_id = %id, "Studio deleted");
        Ok(())
    }

    pub async fn studio_layout(&self, id: Uuid) -> Result<StudioLayout, AppError> {
        StudioLayout::try_from(self.get_studio(id).await?)
    }

    // ----- showtimes -----

    pub async fn create_showtime(&self, input: &ShowtimeInput) -> Result<Showtime, AppError> {
        input.validate(Utc::now())?;

        let mut tx = self.pool.begin().await?;

        let duration = lock_schedule(&mut tx, input).await?;
        let end = slot_end(input.start_time, duration);
        check_overlap(&mut tx, None, input.studio_id, input.start_time, end).await?;

        let showtime = sqlx::query_as::<_, Showtime>(
            r#"
            INSERT INTO showtimes (id, movie_id, studio_id, start_time, end_time, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.movie_id)
        .bind(input.studio_id)
        .bind(input.start_time)
        .bind(end)
        .bind(input.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_schedule_violation(e, input.studio_id))?;

        tx.commit()
            .await
            .map_err(|e| map_schedule_violation(e, input.studio_id))?;

        info!(
            showtime_id = %showtime.id,
            studio_id = %showtime.studio_id,
            start = %showtime.start_time,
            end = %showtime.end_time,
            "Showtime scheduled"
        );
        Ok(showtime)
    }

    /// Reschedules a showtime. Its own current slot never counts as a conflict.
    pub async fn update_showtime(
        &self,
        id: Uuid,
        input: &ShowtimeInput,
    ) -> Result<Showtime, AppError> {
        input.validate(Utc::now())?;

        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM showtimes WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(AppError::not_found("Showtime", id));
        }

        let duration = lock_schedule(&mut tx, input).await?;
        let end = slot_end(input.start_time, duration);
        check_overlap(&mut tx, Some(id), input.studio_id, input.start_time, end).await?;

        let showtime = sqlx::query_as::<_, Showtime>(
            r#"
            UPDATE showtimes
            SET movie_id = $2, studio_id = $3, start_time = $4, end_time = $5, price = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.movie_id)
        .bind(input.studio_id)
        .bind(input.start_time)
        .bind(end)
        .bind(input.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_schedule_violation(e, input.studio_id))?;

        tx.commit()
            .await
            .map_err(|e| map_schedule_violation(e, input.studio_id))?;

        info!(showtime_id = %id, start = %showtime.start_time, end = %showtime.end_time, "Showtime rescheduled");
        Ok(showtime)
    }

    pub async fn get_showtime(&self, id: Uuid) -> Result<ShowtimeListing, AppError> {
        sqlx::query_as::<_, ShowtimeListing>(&format!("{LISTING_SELECT} AND s.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Showtime", id))
    }

    pub async fn list_showtimes(
        &self,
        filter: &ShowtimeFilter,
    ) -> Result<Vec<ShowtimeListing>, AppError> {
        let query = format!(
            "{LISTING_SELECT}
               AND ($1::uuid IS NULL OR s.movie_id = $1)
               AND ($2::date IS NULL OR (s.start_time AT TIME ZONE 'UTC')::date = $2)
             ORDER BY s.start_time"
        );

        let showtimes = sqlx::query_as::<_, ShowtimeListing>(&query)
            .bind(filter.movie_id)
            .bind(filter.date)
            .fetch_all(&self.pool)
            .await?;
        Ok(showtimes)
    }

    pub async fn delete_showtime(&self, id: Uuid) -> Result<(), AppError> {
        soft_delete(&self.pool, "showtimes", id)
            .await?
            .then_some(())
            .ok_or_else(|| AppError::not_found("Showtime", id))?;
        info!(showtime_id = %id, "Showtime deleted");
        Ok(())
    }
}

/// Locks the target studio against concurrent scheduling and returns the movie's duration.
/// Writers for the same studio queue here, so the overlap check that follows sees every
/// committed slot.
async fn lock_schedule(conn: &mut PgConnection, input: &ShowtimeInput) -> Result<i32, AppError> {
    let studio: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM studios WHERE id = $1 AND deleted_at IS NULL FOR NO KEY UPDATE",
    )
    .bind(input.studio_id)
    .fetch_optional(&mut *conn)
    .await?;
    if studio.is_none() {
        return Err(AppError::not_found("Studio", input.studio_id));
    }

    sqlx::query_scalar("SELECT duration_minutes FROM movies WHERE id = $1 AND deleted_at IS NULL")
        .bind(input.movie_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Movie", input.movie_id))
}

/// `table` is always one of the fixed catalog table names above.
async fn soft_delete(pool: &PgPool, table: &'static str, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(&format!(
        "UPDATE {table} SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
