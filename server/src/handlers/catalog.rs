use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::movie::MovieInput;
use crate::models::showtime::{ShowtimeFilter, ShowtimeInput};
use crate::models::studio::StudioInput;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_movies(State(state): State<AppState>) -> Result<Response, AppError> {
    let movies = state.catalog.list_movies().await?;
    Ok(success(movies, "Movies retrieved successfully"))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let movie = state.catalog.get_movie(id).await?;
    Ok(success(movie, "Movie retrieved successfully"))
}

pub async fn create_movie(
    State(state): State<AppState>,
    Json(input): Json<MovieInput>,
) -> Result<Response, AppError> {
    let movie = state.catalog.create_movie(&input).await?;
    Ok(created(movie, "Movie created successfully"))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MovieInput>,
) -> Result<Response, AppError> {
    let movie = state.catalog.update_movie(id, &input).await?;
    Ok(success(movie, "Movie updated successfully"))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.catalog.delete_movie(id).await?;
    Ok(empty_success("Movie deleted successfully"))
}

pub async fn list_studios(State(state): State<AppState>) -> Result<Response, AppError> {
    let studios = state.catalog.list_studios().await?;
    Ok(success(studios, "Studios retrieved successfully"))
}

pub async fn studio_layout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let layout = state.catalog.studio_layout(id).await?;
    Ok(success(layout, "Studio retrieved successfully"))
}

pub async fn create_studio(
    State(state): State<AppState>,
    Json(input): Json<StudioInput>,
) -> Result<Response, AppError> {
    let studio = state.catalog.create_studio(&input).await?;
    Ok(created(studio, "Studio created successfully"))
}

pub async fn update_studio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<StudioInput>,
) -> Result<Response, AppError> {
    let studio = state.catalog.update_studio(id, &input).await?;
    Ok(success(studio, "Studio updated successfully"))
}

pub async fn delete_studio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.catalog.delete_studio(id).await?;
    Ok(empty_success("Studio deleted successfully"))
}

pub async fn list_showtimes(
    State(state): State<AppState>,
    Query(filter): Query<ShowtimeFilter>,
) -> Result<Response, AppError> {
    let showtimes = state.catalog.list_showtimes(&filter).await?;
    Ok(success(showtimes, "Showtimes retrieved successfully"))
}

pub async fn get_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let showtime = state.catalog.get_showtime(id).await?;
    Ok(success(showtime, "Showtime retrieved successfully"))
}

pub async fn occupied_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let seats = state.bookings.occupied_seats(id).await?;
    Ok(success(seats, "Occupied seats retrieved successfully"))
}

pub async fn create_showtime(
    State(state): State<AppState>,
    Json(input): Json<ShowtimeInput>,
) -> Result<Response, AppError> {
    let showtime = state.catalog.create_showtime(&input).await?;
    Ok(created(showtime, "Showtime created successfully"))
}

pub async fn update_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ShowtimeInput>,
) -> Result<Response, AppError> {
    let showtime = state.catalog.update_showtime(id, &input).await?;
    Ok(success(showtime, "Showtime updated successfully"))
}

pub async fn delete_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.catalog.delete_showtime(id).await?;
    Ok(empty_success("Showtime deleted successfully"))
}
