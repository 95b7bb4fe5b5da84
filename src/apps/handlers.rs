use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, state::AppState};

use super::dto::{AppDetails, AppListItem, GenerateRequest, GenerateResponse, Pagination};
use super::repo::GeneratedApp;
use super::service::{self, GenerateError};
use crate::generation::GenerationError;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/apps", get(list_my_apps))
        .route("/apps/public", get(list_public_apps))
        .route("/apps/:id", get(get_app))
        .route("/apps/:id/download", get(download_app))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/apps", post(generate_app))
}

#[instrument(skip(state, payload))]
pub async fn generate_app(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), (StatusCode, String)> {
    match service::run_generation(&state, user_id, payload).await {
        Ok(outcome) => Ok((
            StatusCode::CREATED,
            Json(GenerateResponse {
                id: outcome.app.id,
                name: outcome.app.name,
                code: outcome.app.code,
                credits: outcome.credits_left,
                created_at: outcome.app.created_at,
            }),
        )),
        Err(e) => {
            match &e {
                GenerateError::Generation(inner) => {
                    error!(error = %inner, %user_id, "generation failed")
                }
                GenerateError::Store(inner) => error!(error = %inner, %user_id, "persist failed"),
                _ => warn!(error = %e, %user_id, "generation rejected"),
            }
            Err(map_generate_err(e))
        }
    }
}

#[instrument(skip(state))]
pub async fn list_my_apps(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<AppListItem>>, (StatusCode, String)> {
    let apps = GeneratedApp::list_by_user(&state.db, user_id, p.limit, p.offset)
        .await
        .map_err(internal)?;
    Ok(Json(apps.into_iter().map(list_item).collect()))
}

#[instrument(skip(state))]
pub async fn list_public_apps(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<AppListItem>>, (StatusCode, String)> {
    let apps = GeneratedApp::list_public(&state.db, p.limit, p.offset)
        .await
        .map_err(internal)?;
    Ok(Json(apps.into_iter().map(list_item).collect()))
}

#[instrument(skip(state))]
pub async fn get_app(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AppDetails>, (StatusCode, String)> {
    let app = GeneratedApp::get_accessible(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "App not found".to_string()))?;

    Ok(Json(AppDetails {
        id: app.id,
        name: app.name,
        description: app.description,
        prompt: app.prompt,
        code: app.code,
        is_public: app.is_public,
        likes: app.likes,
        created_at: app.created_at,
    }))
}

/// The stored code, verbatim, as a downloadable text file.
#[instrument(skip(state))]
pub async fn download_app(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(HeaderMap, String), (StatusCode, String)> {
    let app = GeneratedApp::get_accessible(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "App not found".to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        "text/plain; charset=utf-8".parse().unwrap(),
    );
    headers.insert(
        axum::http::header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}.py\"", safe_filename(&app.name))
            .parse()
            .unwrap(),
    );

    Ok((headers, app.code))
}

fn list_item(app: GeneratedApp) -> AppListItem {
    AppListItem {
        id: app.id,
        name: app.name,
        description: app.description,
        is_public: app.is_public,
        likes: app.likes,
        created_at: app.created_at,
    }
}

fn map_generate_err(e: GenerateError) -> (StatusCode, String) {
    let status = match &e {
        GenerateError::EmptyPrompt => StatusCode::BAD_REQUEST,
        GenerateError::InsufficientCredit => StatusCode::PAYMENT_REQUIRED,
        GenerateError::Generation(GenerationError::MissingCredential) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        GenerateError::Generation(_) => StatusCode::BAD_GATEWAY,
        GenerateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        "app".to_string()
    } else {
        cleaned
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_keeps_simple_names() {
        assert_eq!(safe_filename("calculator"), "calculator");
        assert_eq!(safe_filename("my-app_2"), "my-app_2");
    }

    #[test]
    fn safe_filename_replaces_unsafe_chars() {
        assert_eq!(safe_filename("My App"), "My_App");
        assert_eq!(safe_filename("a/b\\c\"d"), "a_b_c_d");
    }

    #[test]
    fn safe_filename_falls_back_when_nothing_survives() {
        assert_eq!(safe_filename("\"/\\"), "app");
        assert_eq!(safe_filename(""), "app");
    }

    #[test]
    fn generate_errors_map_to_expected_statuses() {
        assert_eq!(
            map_generate_err(GenerateError::EmptyPrompt).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_generate_err(GenerateError::InsufficientCredit).0,
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            map_generate_err(GenerateError::Generation(
                GenerationError::MissingCredential
            ))
            .0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            map_generate_err(GenerateError::Generation(GenerationError::EmptyCompletion)).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            map_generate_err(GenerateError::Store(anyhow::anyhow!("down"))).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
