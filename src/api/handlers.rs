use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::recommender;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    /// Movie title, exactly as it appears in the dataset
    #[serde(default)]
    pub movie: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub response: String,
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Recommends movies similar to the one named in the request.
///
/// An unknown title is a normal outcome and still answers 200 with an
/// apology message; only a failed computation becomes an error response.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<RecommendResponse>> {
    let Some(table) = state.snapshot().await else {
        return Err(AppError::NotReady);
    };

    let movie = request.movie.as_deref().map(str::trim).unwrap_or_default();
    if movie.is_empty() {
        return Err(AppError::InvalidInput(
            "Invalid input. Please provide a 'movie' key.".to_string(),
        ));
    }

    let titles = recommender::recommend(movie, &table).map_err(|error| {
        tracing::error!(%error, movie, "recommendation computation failed");
        error
    })?;

    Ok(Json(RecommendResponse {
        response: reply_text(movie, &titles),
    }))
}

fn reply_text(movie: &str, titles: &[String]) -> String {
    if titles.is_empty() {
        format!(
            "Sorry, I couldn't find recommendations for '{movie}'. It might not be in the \
             database or may not have enough ratings. Please try another one \
             (e.g., 'Star Wars (1977)')."
        )
    } else {
        format!(
            "Based on your interest in '{movie}', you might also like:\n- {}",
            titles.join("\n- ")
        )
    }
}
