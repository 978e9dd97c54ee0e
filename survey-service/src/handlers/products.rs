use crate::dtos::{CreateProductRequest, CreatedResponse, ProductResponse, SearchParams, SearchResponse};
use crate::middleware::ApiJson;
use crate::models::{id_to_string, Product, PRODUCTS_COLLECTION};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::doc;
use service_core::error::AppError;
use validator::Validate;

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let payload = payload.normalized();
    payload.validate()?;

    let product = Product::new(payload.name, payload.price);
    let inserted_id = state
        .store
        .insert_one(PRODUCTS_COLLECTION, product.to_document()?)
        .await?;

    tracing::info!(product_id = %product.id, name = %product.name, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Product created".to_string(),
            id: id_to_string(&inserted_id),
        }),
    ))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let document = state
        .store
        .find_one(PRODUCTS_COLLECTION, doc! { "_id": product_id.as_str() })
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Product {} does not exist", product_id))
        })?;

    Ok(Json(Product::from_document(document)?.into()))
}

/// Exact-name lookup. `q` is required.
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "You must provide a search term (e.g., /search?q=Laptop)"
            ))
        })?;

    let results = state
        .store
        .find(PRODUCTS_COLLECTION, Some(doc! { "name": query.as_str() }), None)
        .await?
        .into_iter()
        .map(|document| Product::from_document(document).map(ProductResponse::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(SearchResponse { query, results }))
}
