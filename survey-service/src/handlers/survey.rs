//! CRUD routes over the `raw_data` survey collection, keyed by `user_id`.

use crate::dtos::{
    BulkCreatedResponse, CreatedResponse, DeleteResponse, SurveyUsersResponse, UpdateResponse,
};
use crate::middleware::ApiJson;
use crate::models::survey::{
    fields_from_json, parse_user_id, record_from_json, record_to_json, user_id_filter,
};
use crate::models::{id_to_string, RAW_DATA_COLLECTION};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::doc;
use serde_json::Value;
use service_core::error::AppError;

pub async fn add_sm_data(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let record = record_from_json(body)?;

    let inserted_id = state
        .store
        .insert_one(RAW_DATA_COLLECTION, record)
        .await
        .map_err(|e| {
            tracing::error!("Failed to add survey record: {}", e);
            e
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Item added successfully".to_string(),
            id: id_to_string(&inserted_id),
        }),
    ))
}

/// Load a batch of survey records at once. Every record needs a `user_id`;
/// nothing is written when any record is rejected.
pub async fn add_sm_data_bulk(
    State(state): State<AppState>,
    ApiJson(records): ApiJson<Vec<Value>>,
) -> Result<(StatusCode, Json<BulkCreatedResponse>), AppError> {
    let documents = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record_from_json(record).map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Record {}: {}", index, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let inserted_ids = state
        .store
        .insert_many(RAW_DATA_COLLECTION, documents)
        .await
        .map_err(|e| {
            tracing::error!("Failed to bulk load survey records: {}", e);
            e
        })?;

    tracing::info!(count = inserted_ids.len(), "Survey records loaded");

    Ok((
        StatusCode::CREATED,
        Json(BulkCreatedResponse {
            message: "Items added successfully".to_string(),
            count: inserted_ids.len(),
            ids: inserted_ids.iter().map(id_to_string).collect(),
        }),
    ))
}

pub async fn get_sm_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let record = state
        .store
        .find_one(RAW_DATA_COLLECTION, user_id_filter(user_id))
        .await
        .map_err(|e| {
            tracing::error!(user_id, "Error retrieving survey user: {}", e);
            e
        })?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("User id {} document not found", user_id))
        })?;

    Ok(Json(record_to_json(record)))
}

pub async fn list_sm_users(
    State(state): State<AppState>,
) -> Result<Json<SurveyUsersResponse>, AppError> {
    let users: Vec<Value> = state
        .store
        .find(RAW_DATA_COLLECTION, None, Some(doc! { "_id": 0 }))
        .await?
        .into_iter()
        .map(record_to_json)
        .collect();

    Ok(Json(SurveyUsersResponse {
        count: users.len(),
        users,
    }))
}

/// Partial update: the body's fields are applied with `$set`.
pub async fn update_sm_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<UpdateResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let fields = fields_from_json(user_id, body)?;

    let outcome = state
        .store
        .update_one(
            RAW_DATA_COLLECTION,
            user_id_filter(user_id),
            doc! { "$set": fields },
        )
        .await
        .map_err(|e| {
            tracing::error!(user_id, "Error updating survey record: {}", e);
            e
        })?;

    if outcome.matched_count == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "User id {} document not found",
            user_id
        )));
    }

    Ok(Json(UpdateResponse {
        message: "updated the data successfully".to_string(),
        matched_count: outcome.matched_count,
        modified_count: outcome.modified_count,
    }))
}

pub async fn delete_sm_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let deleted_count = state
        .store
        .delete_one(RAW_DATA_COLLECTION, user_id_filter(user_id))
        .await
        .map_err(|e| {
            tracing::error!(user_id, "Error deleting survey record: {}", e);
            e
        })?;

    tracing::info!(user_id, deleted_count, "Survey record delete processed");

    if deleted_count == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "User id {} document not found",
            user_id
        )));
    }

    Ok(Json(DeleteResponse {
        message: "Item deleted successfully".to_string(),
        deleted_count,
    }))
}
