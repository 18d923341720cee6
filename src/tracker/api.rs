use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch},
};
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::document::{NewProblem, NewRequisition, ProblemFilter};
use super::models::{Fields, MaterialPrice, OrderType};
use super::reports::MaterialStatsFilter;
use super::store::StoreHandle;
use crate::errors::TrackerError;
use crate::util;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: StoreHandle,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// Order create/update body: `items` plus any header fields.
///
/// `items` keeps an explicit `null` apart from an absent key.
#[derive(Deserialize)]
pub struct OrderPayload {
    #[serde(default, deserialize_with = "present")]
    pub items: Option<Value>,
    #[serde(flatten)]
    pub header: Fields,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl OrderPayload {
    /// Header and items for a create. A `null` list means no items.
    fn into_create(self) -> Result<(Fields, Option<Vec<Fields>>), ApiError> {
        let items = match self.items {
            None | Some(Value::Null) => None,
            Some(list) => Some(item_list(list)?),
        };
        Ok((self.header, items))
    }

    /// Header and items for an update. An absent key keeps the current
    /// items; anything but an array is rejected.
    fn into_update(self) -> Result<(Fields, Option<Vec<Fields>>), ApiError> {
        let items = self.items.map(item_list).transpose()?;
        Ok((self.header, items))
    }
}

fn item_list(value: Value) -> Result<Vec<Fields>, ApiError> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "Rejected order items");
        ApiError::Internal(format!("items must be a list of objects: {}", e))
    })
}

/// Status body. A missing `status` clears the label.
#[derive(Deserialize)]
pub struct StatusRequest {
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub status: String,
}

#[derive(Deserialize)]
pub struct ItemPatchRequest {
    #[serde(default)]
    pub updates: Vec<ItemUpdate>,
}

#[derive(Deserialize)]
pub struct ItemUpdate {
    #[serde(default, deserialize_with = "util::de_lenient_opt_i64")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Deserialize)]
pub struct ProblemQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub order_type: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Deserialize)]
pub struct MaterialStatsQuery {
    pub month: Option<String>,
    pub order_number: Option<String>,
}

#[derive(Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Deserialize)]
pub struct RequisitionQuery {
    pub order_id: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            tracing::error!(error = %err, "Request failed");
            ApiError::Internal(err.to_string())
        }
    }
}

/// JSON body extractor whose rejections are reported as `{error}` with 500,
/// like every other processing failure.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "Rejected request body");
                Err(ApiError::Internal(rejection.body_text()))
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/problems", get(list_problems).post(create_problem))
        .route("/api/problems/{id}/resolve", patch(resolve_problem))
        .route(
            "/api/material-prices",
            get(get_material_prices).put(replace_material_prices),
        )
        .route("/api/material-stats", get(material_stats))
        .route("/api/injection-costs", get(injection_costs))
        .route(
            "/api/requisitions",
            get(list_requisitions).post(create_requisition),
        )
        .route("/api/requisitions/{id}", delete(delete_requisition))
        .route("/api/requisitions/{id}/status", patch(patch_requisition_status))
        .route("/api/stats", get(order_stats))
        .route("/api/{order_type}", get(list_orders).post(create_order))
        .route(
            "/api/{order_type}/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/api/{order_type}/{id}/status", patch(patch_order_status))
        .route("/api/{order_type}/{id}/items", patch(patch_order_items))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn parse_order_type(raw: &str) -> Result<OrderType, ApiError> {
    OrderType::from_str(raw).map_err(ApiError::NotFound)
}

/// Numeric path ID. A segment that is not a number matches no record.
fn path_id(raw: &str) -> Option<i64> {
    util::parse_i64(raw)
}

fn order_not_found(order_type: OrderType, raw: &str) -> ApiError {
    ApiError::NotFound(format!("{} order {} not found", order_type, raw))
}

fn success() -> Json<serde_json::Value> {
    Json(serde_json::json!({"success": true}))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_orders(
    State(state): State<SharedState>,
    Path(order_type): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let orders = state
        .store
        .read(move |doc| Ok(doc.book(order_type).list()))
        .await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<SharedState>,
    Path((order_type, raw_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let id = path_id(&raw_id).ok_or_else(|| order_not_found(order_type, &raw_id))?;
    let order = state
        .store
        .read(move |doc| {
            doc.book(order_type)
                .get(id)
                .ok_or(TrackerError::OrderNotFound { order_type, id })
        })
        .await?;
    Ok(Json(order))
}

async fn create_order(
    State(state): State<SharedState>,
    Path(order_type): Path<String>,
    ApiJson(payload): ApiJson<OrderPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let (header, items) = payload.into_create()?;
    let now = Utc::now();
    let created = state
        .store
        .write(move |doc| Ok(doc.book_mut(order_type).create(header, items, now)))
        .await?;
    tracing::info!(
        order_type = %order_type,
        id = created.order.id,
        items = created.items.len(),
        "Order created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_order(
    State(state): State<SharedState>,
    Path((order_type, raw_id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<OrderPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let id = path_id(&raw_id).ok_or_else(|| order_not_found(order_type, &raw_id))?;
    let (header, items) = payload.into_update()?;
    let now = Utc::now();
    let replaces_items = items.is_some();
    let updated = state
        .store
        .write(move |doc| doc.book_mut(order_type).update(id, header, items, now))
        .await?;
    tracing::info!(order_type = %order_type, id, replaces_items, "Order updated");
    Ok(Json(updated))
}

async fn delete_order(
    State(state): State<SharedState>,
    Path((order_type, raw_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let Some(id) = path_id(&raw_id) else {
        return Ok(success());
    };
    let removed = state
        .store
        .write(move |doc| Ok(doc.book_mut(order_type).delete(id)))
        .await?;
    tracing::info!(order_type = %order_type, id, removed, "Order deleted");
    Ok(success())
}

async fn patch_order_status(
    State(state): State<SharedState>,
    Path((order_type, raw_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let Some(id) = path_id(&raw_id) else {
        return Ok(success());
    };
    let now = Utc::now();
    let found = state
        .store
        .write(move |doc| Ok(doc.book_mut(order_type).set_status(id, req.status, now)))
        .await?;
    if !found {
        tracing::debug!(order_type = %order_type, id, "Status patch for missing order ignored");
    }
    Ok(success())
}

async fn patch_order_items(
    State(state): State<SharedState>,
    Path((order_type, raw_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<ItemPatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_type = parse_order_type(&order_type)?;
    let Some(id) = path_id(&raw_id) else {
        return Ok(success());
    };
    let updates: Vec<(i64, Fields)> = req
        .updates
        .into_iter()
        .filter_map(|u| u.id.map(|item_id| (item_id, u.fields)))
        .collect();
    let touched = state
        .store
        .write(move |doc| Ok(doc.book_mut(order_type).patch_items(id, updates)))
        .await?;
    tracing::debug!(order_type = %order_type, id, touched, "Item fields patched");
    Ok(success())
}

async fn list_problems(
    State(state): State<SharedState>,
    Query(query): Query<ProblemQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ProblemFilter {
        order_type: query
            .kind
            .or(query.order_type)
            .filter(|t| !t.is_empty()),
        order_id: util::parse_id_filter(query.order_id.as_deref()),
    };
    let problems = state
        .store
        .read(move |doc| Ok(doc.list_problems(&filter)))
        .await?;
    Ok(Json(problems))
}

async fn create_problem(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<NewProblem>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let problem = state
        .store
        .write(move |doc| Ok(doc.create_problem(req, now)))
        .await?;
    tracing::info!(id = problem.id, order_type = %problem.order_type, "Problem reported");
    Ok((StatusCode::CREATED, Json(problem)))
}

async fn resolve_problem(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&raw_id)
        .ok_or_else(|| ApiError::NotFound(format!("Problem {} not found", raw_id)))?;
    let now = Utc::now();
    let problem = state
        .store
        .write(move |doc| doc.resolve_problem(id, now))
        .await?;
    Ok(Json(problem))
}

async fn get_material_prices(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let prices = state
        .store
        .read(|doc| Ok(doc.material_prices().to_vec()))
        .await?;
    Ok(Json(prices))
}

async fn replace_material_prices(
    State(state): State<SharedState>,
    ApiJson(prices): ApiJson<Vec<MaterialPrice>>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state
        .store
        .write(move |doc| Ok(doc.replace_material_prices(prices).to_vec()))
        .await?;
    tracing::info!(count = stored.len(), "Material price table replaced");
    Ok(Json(stored))
}

async fn material_stats(
    State(state): State<SharedState>,
    Query(query): Query<MaterialStatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MaterialStatsFilter {
        month: query.month,
        order_number: query.order_number,
    };
    let stats = state
        .store
        .read(move |doc| Ok(doc.material_stats(&filter)))
        .await?;
    Ok(Json(stats))
}

async fn injection_costs(
    State(state): State<SharedState>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .store
        .read(move |doc| Ok(doc.injection_costs(query.month.as_deref())))
        .await?;
    Ok(Json(rows))
}

async fn list_requisitions(
    State(state): State<SharedState>,
    Query(query): Query<RequisitionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = util::parse_id_filter(query.order_id.as_deref());
    let list = state
        .store
        .read(move |doc| Ok(doc.list_requisitions(order_id)))
        .await?;
    Ok(Json(list))
}

async fn create_requisition(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<NewRequisition>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let requisition = state
        .store
        .write(move |doc| Ok(doc.create_requisition(req, now)))
        .await?;
    tracing::info!(id = requisition.id, req_number = %requisition.req_number, "Requisition created");
    Ok((StatusCode::CREATED, Json(requisition)))
}

async fn patch_requisition_status(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&raw_id)
        .ok_or_else(|| ApiError::NotFound(format!("Requisition {} not found", raw_id)))?;
    let now = Utc::now();
    let requisition = state
        .store
        .write(move |doc| doc.set_requisition_status(id, req.status, now))
        .await?;
    Ok(Json(requisition))
}

async fn delete_requisition(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(id) = path_id(&raw_id) else {
        return Ok(success());
    };
    let removed = state
        .store
        .write(move |doc| Ok(doc.delete_requisition(id)))
        .await?;
    tracing::info!(id, removed, "Requisition deleted");
    Ok(success())
}

async fn order_stats(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.store.read(|doc| Ok(doc.order_stats())).await?;
    Ok(Json(stats))
}

// ── Tests ─────────────────────────────────────────────────────────────
