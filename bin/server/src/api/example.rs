//! CRUD handlers for the `Example` resource.
//!
//! The path segment is the record's name. `PUT` takes the name from the
//! path, ignoring any name in the body.

use axum::Json;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use frontgate_repository::Example;
use serde::Deserialize;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::ApiError;

/// Body of a `PUT`. The name comes from the path.
#[derive(Debug, Deserialize)]
pub struct ExampleUpdate {
    pub age: i64,
}

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    Ok(())
}

pub async fn list(ctx: RequestContext) -> Result<Json<Vec<Example>>, ApiError> {
    let examples = ctx.services.repository.find_all().await?;
    Ok(Json(examples))
}

pub async fn create(
    ctx: RequestContext,
    body: Result<Json<Example>, JsonRejection>,
) -> Result<(StatusCode, Json<Example>), ApiError> {
    let Json(example) = body?;
    require_name(&example.name)?;
    ctx.services.repository.save(&example).await?;
    debug!(request_id = %ctx.request_id, name = %example.name, "example created");
    Ok((StatusCode::CREATED, Json(example)))
}

pub async fn get(ctx: RequestContext, Path(id): Path<String>) -> Result<Json<Example>, ApiError> {
    let example = ctx.services.repository.find_by_id(&id).await?;
    Ok(Json(example))
}

pub async fn replace(
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Result<Json<ExampleUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(update) = body?;
    require_name(&id)?;
    ctx.services
        .repository
        .update(&Example::new(id, update.age))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(ctx: RequestContext, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    ctx.services.repository.delete(&id).await?;
    debug!(request_id = %ctx.request_id, name = %id, "example deleted");
    Ok(StatusCode::NO_CONTENT)
}
