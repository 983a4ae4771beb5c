use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sqlx::{query, query_as};

use crate::{
    error::AppError,
    model::{CurrentUser, Todo},
    schema::{
        CompleteTodoSchema, CreateTodoSchema, HealthResponse, LoginSchema, MessageResponse,
        PresignedUploadResponse, RefreshSchema, TokenResponse, UpdateTodoSchema,
    },
    token, AppState,
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            health_check: "OK".to_string(),
        }),
    )
}

// Handler for creating a new todo
pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    body: Result<Json<CreateTodoSchema>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    check_active_flag(body.active)?;

    let (todo_id,) =
        query_as::<_, (i64,)>("INSERT INTO todo (description, active) VALUES (?, ?) RETURNING todo_id")
            .bind(body.description)
            .bind(body.active)
            .fetch_one(&data.db)
            .await?;

    let msg = format!("Successfully created todo item with id {todo_id}");
    tracing::info!("{msg}");
    Ok((StatusCode::OK, Json(MessageResponse::new(msg))))
}

// Handler for listing active todos only
pub async fn get_active_todos(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let todos = query_as::<_, Todo>(
        "SELECT todo_id, description, active FROM todo WHERE active = 1 ORDER BY todo_id",
    )
    .fetch_all(&data.db)
    .await?;

    tracing::info!("Active todo items found: {}", todos.len());
    Ok((StatusCode::OK, Json(todos)))
}

// Handler for editing an active todo's description and/or flag
pub async fn update_active_todo(
    State(data): State<Arc<AppState>>,
    body: Result<Json<UpdateTodoSchema>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    if body.description.is_none() && body.active.is_none() {
        return Err(AppError::BadRequest(
            "NOTHING TO UPDATE, EXPECTED description OR active".to_string(),
        ));
    }
    if let Some(active) = body.active {
        check_active_flag(active)?;
    }

    let result = query(
        "UPDATE todo SET description = COALESCE(?, description), active = COALESCE(?, active) WHERE todo_id = ?",
    )
    .bind(body.description)
    .bind(body.active)
    .bind(body.todo_id)
    .execute(&data.db)
    .await?;

    tracing::info!(
        todo_id = body.todo_id,
        rows = result.rows_affected(),
        "Successfully updated todo"
    );
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Successfully updated todo")),
    ))
}

// Handler for listing every todo, active and complete
pub async fn get_all_todos(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let todos = query_as::<_, Todo>("SELECT todo_id, description, active FROM todo ORDER BY todo_id")
        .fetch_all(&data.db)
        .await?;

    tracing::info!("Total number of todo items found: {}", todos.len());
    Ok((StatusCode::OK, Json(todos)))
}

// Handler for listing completed todos only
pub async fn get_complete_todos(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let todos = query_as::<_, Todo>(
        "SELECT todo_id, description, active FROM todo WHERE active = 0 ORDER BY todo_id",
    )
    .fetch_all(&data.db)
    .await?;

    tracing::info!("Complete todo items found: {}", todos.len());
    Ok((StatusCode::OK, Json(todos)))
}

// Handler for marking a todo complete
pub async fn complete_todo(
    State(data): State<Arc<AppState>>,
    body: Result<Json<CompleteTodoSchema>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let rows_affected = query("UPDATE todo SET active = 0 WHERE todo_id = ?")
        .bind(body.todo_id)
        .execute(&data.db)
        .await?
        .rows_affected();

    let msg = format!("Successfully marked complete {rows_affected} todos");
    tracing::info!("{msg}");
    Ok((StatusCode::OK, Json(MessageResponse::new(msg))))
}

// Handler for deleting every completed todo
pub async fn delete_complete_todos(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let rows_affected = query("DELETE FROM todo WHERE active = 0")
        .execute(&data.db)
        .await?
        .rows_affected();

    let msg = format!("Successfully deleted {rows_affected} completed todos");
    tracing::info!("{msg}");
    Ok((StatusCode::OK, Json(MessageResponse::new(msg))))
}

// Handler for issuing a presigned S3 upload URL. Also mounted on the shorter
// paths so a missing bucket or key is a 400 instead of a 404.
pub async fn get_upload_url(
    State(data): State<Arc<AppState>>,
    params: Option<Path<HashMap<String, String>>>,
) -> Result<impl IntoResponse, AppError> {
    let params = params.map(|Path(params)| params).unwrap_or_default();
    let param = |name: &str| {
        params
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let (Some(bucket), Some(key)) = (param("bucket"), param("key")) else {
        return Err(AppError::BadRequest(
            "S3 BUCKET PATH PARAMETERS MISSING".to_string(),
        ));
    };

    let upload = data.uploads.presign_put(bucket, key).await?;
    tracing::info!(bucket, key, "issued presigned upload url");

    Ok((
        StatusCode::OK,
        Json(PresignedUploadResponse {
            url: upload.url,
            method: upload.method,
            expires_in: upload.expires_in.as_secs(),
            headers: upload.headers,
        }),
    ))
}

// Login: verify credentials, then hand out an access and a refresh token
pub async fn authenticate(
    State(data): State<Arc<AppState>>,
    body: Result<Json<LoginSchema>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let user = data
        .credentials
        .authenticate(&body.username, &body.password)
        .await?;

    let access_token = data.tokens.issue_access_token(&user)?;
    let refresh_token = token::issue_refresh_token(&data.db, &user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user authenticated");
    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            access_token,
            refresh_token: Some(refresh_token),
        }),
    ))
}

// Exchange a refresh token for a fresh access token
pub async fn refresh_access_token(
    State(data): State<Arc<AppState>>,
    body: Result<Json<RefreshSchema>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let user = token::validate_refresh_token(&data.db, &body.user_id, &body.refresh_token).await?;
    let access_token = data.tokens.issue_access_token(&user)?;

    tracing::info!(user_id = %user.id, "access token refreshed");
    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            access_token,
            refresh_token: None,
        }),
    ))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    (StatusCode::OK, Json(user))
}

fn check_active_flag(active: i64) -> Result<(), AppError> {
    match active {
        0 | 1 => Ok(()),
        other => Err(AppError::BadRequest(format!(
            "active MUST BE 0 OR 1, GOT {other}"
        ))),
    }
}
