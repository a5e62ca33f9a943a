use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::catalog::{CatalogService, CreateOutcome};
use crate::app::notifications::NotificationService;
use crate::app::products::{DashboardStats, ProductFilter, ProductService};
use crate::app::push_subscriptions::{PushSubscriptionService, SubscriptionCounts};
use crate::app::scan::WARNING_WINDOW_DAYS;
use crate::app::schedules::{DefaultSchedules, ScheduleService};
use crate::channels::{PushChannel, PushMessage, PushOutcome};
use crate::domain::catalog::{CatalogEntry, CatalogKind};
use crate::domain::notification::Notification;
use crate::domain::product::{NewProduct, Product, ProductOrdering, ProductPatch};
use crate::domain::push_subscription::PushSubscription;
use crate::domain::schedule::Schedule;
use crate::http::{AdminToken, AppError, AppJson};
use crate::jobs::scheduler::execute_schedule;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

/// SQLSTATE of the database error behind `err`, if any.
fn db_error_code(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|sqlx_err| sqlx_err.as_database_error())
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<Uuid>,
    pub brand: Option<Uuid>,
    pub batch: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<PageResponse<Product>>, AppError> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=500).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 500"));
    }
    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }
    let ordering = match query.ordering.as_deref() {
        Some(value) => Some(ProductOrdering::parse(value).ok_or_else(|| {
            AppError::bad_request("ordering must be one of name, price, expiration_date")
        })?),
        None => None,
    };

    let filter = ProductFilter {
        search: query.search,
        category_id: query.category,
        brand_id: query.brand,
        batch: query.batch,
        ordering,
        limit,
        offset,
    };

    let service = ProductService::new(state.db.clone());
    let items = service.list(&filter).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list products");
        AppError::internal("failed to list products")
    })?;

    Ok(Json(PageResponse {
        items,
        limit,
        offset,
    }))
}

fn product_write_error(err: anyhow::Error, action: &str) -> AppError {
    match db_error_code(&err).as_deref() {
        Some("23503") => AppError::bad_request("category or brand does not exist"),
        Some("23514") | Some("22003") => AppError::bad_request("product violates a field constraint"),
        _ => {
            tracing::error!(error = ?err, "failed to {} product", action);
            AppError::internal(format!("failed to {} product", action))
        }
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let payload = payload.normalize().map_err(AppError::bad_request)?;

    let service = ProductService::new(state.db.clone());
    let product = service
        .create(&payload)
        .await
        .map_err(|err| product_write_error(err, "create"))?;

    tracing::info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Product>, AppError> {
    let service = ProductService::new(state.db.clone());
    let product = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, product_id = %id, "failed to get product");
        AppError::internal("failed to get product")
    })?;

    product
        .map(Json)
        .ok_or_else(|| AppError::not_found("product not found"))
}

pub async fn update_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    AppJson(patch): AppJson<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    let service = ProductService::new(state.db.clone());
    let current = service
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, product_id = %id, "failed to load product");
            AppError::internal("failed to update product")
        })?
        .ok_or_else(|| AppError::not_found("product not found"))?;

    let merged = patch
        .apply(&current)
        .normalize()
        .map_err(AppError::bad_request)?;

    let product = service
        .update(id, &merged)
        .await
        .map_err(|err| product_write_error(err, "update"))?;

    product
        .map(Json)
        .ok_or_else(|| AppError::not_found("product not found"))
}

/// Full replacement: every writable field comes from the body.
pub async fn replace_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewProduct>,
) -> Result<Json<Product>, AppError> {
    let payload = payload.normalize().map_err(AppError::bad_request)?;

    let service = ProductService::new(state.db.clone());
    let product = service
        .update(id, &payload)
        .await
        .map_err(|err| product_write_error(err, "update"))?;

    let product = product.ok_or_else(|| AppError::not_found("product not found"))?;
    tracing::info!(product_id = %product.id, "product replaced");
    Ok(Json(product))
}

pub async fn delete_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = ProductService::new(state.db.clone());
    let deleted = service.delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, product_id = %id, "failed to delete product");
        AppError::internal("failed to delete product")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("product not found"))
    }
}

pub async fn expiring_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    let service = ProductService::new(state.db.clone());
    let products = service
        .expiring_within(state.alerts.today(), WARNING_WINDOW_DAYS)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list expiring products");
            AppError::internal("failed to list expiring products")
        })?;
    Ok(Json(products))
}

pub async fn expired_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    let service = ProductService::new(state.db.clone());
    let products = service.expired(state.alerts.today()).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list expired products");
        AppError::internal("failed to list expired products")
    })?;
    Ok(Json(products))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let service = ProductService::new(state.db.clone());
    let stats = service
        .dashboard_stats(state.alerts.today())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to compute dashboard stats");
            AppError::internal("failed to compute dashboard stats")
        })?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Categories and brands
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CatalogRequest {
    pub name: String,
}

async fn list_catalog(state: AppState, kind: CatalogKind) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let service = CatalogService::new(state.db.clone(), kind);
    let entries = service.list().await.map_err(|err| {
        tracing::error!(error = ?err, kind = kind.label(), "failed to list catalog");
        AppError::internal(format!("failed to list {}", kind.table()))
    })?;
    Ok(Json(entries))
}

async fn create_catalog(
    state: AppState,
    kind: CatalogKind,
    payload: CatalogRequest,
) -> Result<(StatusCode, Json<CatalogEntry>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if name.chars().count() > 100 {
        return Err(AppError::bad_request("name must be at most 100 characters"));
    }

    let service = CatalogService::new(state.db.clone(), kind);
    let outcome = service.create(name).await.map_err(|err| {
        tracing::error!(error = ?err, kind = kind.label(), "failed to create catalog entry");
        AppError::internal(format!("failed to create {}", kind.label()))
    })?;

    match outcome {
        CreateOutcome::Created(entry) => Ok((StatusCode::CREATED, Json(entry))),
        CreateOutcome::Duplicate => Err(AppError::conflict(format!(
            "{} already exists",
            kind.label()
        ))),
    }
}

async fn get_catalog(state: AppState, kind: CatalogKind, id: Uuid) -> Result<Json<CatalogEntry>, AppError> {
    let service = CatalogService::new(state.db.clone(), kind);
    let entry = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, kind = kind.label(), id = %id, "failed to get catalog entry");
        AppError::internal(format!("failed to get {}", kind.label()))
    })?;
    entry
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("{} not found", service.kind().label())))
}

async fn delete_catalog(state: AppState, kind: CatalogKind, id: Uuid) -> Result<StatusCode, AppError> {
    let service = CatalogService::new(state.db.clone(), kind);
    let deleted = service.delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, kind = kind.label(), id = %id, "failed to delete catalog entry");
        AppError::internal(format!("failed to delete {}", kind.label()))
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("{} not found", kind.label())))
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    list_catalog(state, CatalogKind::Category).await
}

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CatalogRequest>,
) -> Result<(StatusCode, Json<CatalogEntry>), AppError> {
    create_catalog(state, CatalogKind::Category, payload).await
}

pub async fn get_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CatalogEntry>, AppError> {
    get_catalog(state, CatalogKind::Category, id).await
}

pub async fn delete_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    delete_catalog(state, CatalogKind::Category, id).await
}

pub async fn list_brands(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    list_catalog(state, CatalogKind::Brand).await
}

pub async fn create_brand(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CatalogRequest>,
) -> Result<(StatusCode, Json<CatalogEntry>), AppError> {
    create_catalog(state, CatalogKind::Brand, payload).await
}

pub async fn get_brand(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CatalogEntry>, AppError> {
    get_catalog(state, CatalogKind::Brand, id).await
}

pub async fn delete_brand(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    delete_catalog(state, CatalogKind::Brand, id).await
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Notification>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let service = NotificationService::new(state.db.clone());
    let mut notifications = service
        .list(query.unread, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    let next_cursor = if notifications.len() > limit as usize {
        notifications.truncate(limit as usize);
        notifications.last().map(|last| (last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: notifications,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn get_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Notification>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let notification = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, notification_id = %id, "failed to get notification");
        AppError::internal("failed to get notification")
    })?;
    notification
        .map(Json)
        .ok_or_else(|| AppError::not_found("notification not found"))
}

pub async fn delete_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let deleted = service.delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, notification_id = %id, "failed to delete notification");
        AppError::internal("failed to delete notification")
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

pub async fn mark_notification_read(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_read(id).await.map_err(|err| {
        tracing::error!(error = ?err, notification_id = %id, "failed to mark notification read");
        AppError::internal("failed to mark notification read")
    })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_all_read().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to mark notifications read");
        AppError::internal("failed to mark notifications read")
    })?;
    Ok(Json(MarkAllReadResponse { updated }))
}

// ---------------------------------------------------------------------------
// Push subscriptions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}

pub async fn vapid_public_key(
    State(state): State<AppState>,
) -> Result<Json<VapidPublicKeyResponse>, AppError> {
    let public_key = state
        .push
        .vapid_public_key()
        .ok_or_else(|| AppError::not_found("VAPID key not configured"))?;
    Ok(Json(VapidPublicKeyResponse {
        public_key: public_key.to_string(),
    }))
}

#[derive(Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// The browser's `PushSubscription.toJSON()` shape.
#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

fn validate_subscription(payload: &SubscribeRequest) -> Result<(), AppError> {
    let endpoint = url::Url::parse(payload.endpoint.trim())
        .map_err(|_| AppError::bad_request("endpoint must be a valid URL"))?;
    if !matches!(endpoint.scheme(), "https" | "http") {
        return Err(AppError::bad_request("endpoint must be an http(s) URL"));
    }

    let decoded_len = |value: &str| {
        URL_SAFE_NO_PAD
            .decode(value.trim().trim_end_matches('=').as_bytes())
            .map(|bytes| bytes.len())
            .ok()
    };
    if decoded_len(&payload.keys.p256dh) != Some(65) {
        return Err(AppError::bad_request("keys.p256dh must be a base64url P-256 public key"));
    }
    if decoded_len(&payload.keys.auth) != Some(16) {
        return Err(AppError::bad_request("keys.auth must be a base64url 16-byte secret"));
    }
    Ok(())
}

pub async fn subscribe_push(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<PushSubscription>), AppError> {
    validate_subscription(&payload)?;

    let service = PushSubscriptionService::new(state.db.clone());
    let (subscription, created) = service
        .register(
            payload.endpoint.trim(),
            payload.keys.p256dh.trim(),
            payload.keys.auth.trim(),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to register push subscription");
            AppError::internal("failed to register push subscription")
        })?;

    let status = if created {
        tracing::info!(subscription_id = %subscription.id, "push subscription registered");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(subscription)))
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Serialize)]
pub struct UnsubscribeResponse {
    pub deactivated: u64,
}

pub async fn unsubscribe_push(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    if payload.endpoint.trim().is_empty() {
        return Err(AppError::bad_request("endpoint is required"));
    }

    let service = PushSubscriptionService::new(state.db.clone());
    let deactivated = service
        .deactivate_endpoint(payload.endpoint.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to deactivate push subscription");
            AppError::internal("failed to deactivate push subscription")
        })?;
    Ok(Json(UnsubscribeResponse { deactivated }))
}

pub async fn list_push_subscriptions(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<Vec<PushSubscription>>, AppError> {
    let service = PushSubscriptionService::new(state.db.clone());
    let subscriptions = service.list().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list push subscriptions");
        AppError::internal("failed to list push subscriptions")
    })?;
    Ok(Json(subscriptions))
}

pub async fn delete_push_subscription(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PushSubscriptionService::new(state.db.clone());
    let deleted = service.remove(id).await.map_err(|err| {
        tracing::error!(error = ?err, subscription_id = %id, "failed to delete push subscription");
        AppError::internal("failed to delete push subscription")
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("subscription not found"))
    }
}

#[derive(Deserialize, Default)]
pub struct CleanupRequest {
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

pub async fn cleanup_push_subscriptions(
    _admin: AdminToken,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CleanupRequest>,
) -> Result<Json<CleanupResponse>, AppError> {
    let service = PushSubscriptionService::new(state.db.clone());
    let removed = service.cleanup(payload.all).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to clean up push subscriptions");
        AppError::internal("failed to clean up push subscriptions")
    })?;
    Ok(Json(CleanupResponse { removed }))
}

pub async fn send_test_push(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Json<PushOutcome> {
    let message = PushMessage {
        title: "🧪 Teste de Notificação".to_string(),
        body: "Esta é uma notificação de teste!".to_string(),
        data: json!({ "type": "test" }),
    };
    Json(state.push.broadcast(&message).await)
}

// ---------------------------------------------------------------------------
// Schedules and manual job runs
// ---------------------------------------------------------------------------

pub async fn list_schedules(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    let service = ScheduleService::new(state.db.clone());
    let schedules = service.list().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list schedules");
        AppError::internal("failed to list schedules")
    })?;
    Ok(Json(schedules))
}

#[derive(Deserialize)]
pub struct CreateSchedulesRequest {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub min_quantity: Option<i32>,
}

pub async fn create_schedules(
    _admin: AdminToken,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSchedulesRequest>,
) -> Result<(StatusCode, Json<Vec<Schedule>>), AppError> {
    let defaults = DefaultSchedules::default();
    let settings = DefaultSchedules {
        hour: payload.hour.unwrap_or(defaults.hour),
        minute: payload.minute.unwrap_or(defaults.minute),
        min_quantity: payload
            .min_quantity
            .unwrap_or(state.alerts.default_min_quantity()),
    };
    if settings.hour > 23 {
        return Err(AppError::bad_request("hour must be between 0 and 23"));
    }
    if settings.minute > 59 {
        return Err(AppError::bad_request("minute must be between 0 and 59"));
    }
    if settings.min_quantity < 1 {
        return Err(AppError::bad_request("min_quantity must be at least 1"));
    }

    let service = ScheduleService::new(state.db.clone());
    let schedules = service
        .recreate_defaults(settings, state.business_offset, OffsetDateTime::now_utc())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create schedules");
            AppError::internal("failed to create schedules")
        })?;
    Ok((StatusCode::CREATED, Json(schedules)))
}

pub async fn delete_schedule(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = ScheduleService::new(state.db.clone());
    let deleted = service.delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, schedule_id = %id, "failed to delete schedule");
        AppError::internal("failed to delete schedule")
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("schedule not found"))
    }
}

#[derive(Serialize)]
pub struct JobResultResponse {
    pub result: String,
}

pub async fn run_schedule(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<JobResultResponse>, AppError> {
    let service = ScheduleService::new(state.db.clone());
    let schedule = service
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, schedule_id = %id, "failed to load schedule");
            AppError::internal("failed to run schedule")
        })?
        .ok_or_else(|| AppError::not_found("schedule not found"))?;

    let result = execute_schedule(&state.alerts, &schedule).await;
    if let Err(err) = service
        .record_result(schedule.id, OffsetDateTime::now_utc(), &result)
        .await
    {
        tracing::error!(error = ?err, schedule_id = %id, "failed to store schedule result");
    }
    Ok(Json(JobResultResponse { result }))
}

pub async fn run_expiring_products_job(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<JobResultResponse>, AppError> {
    let result = state.alerts.check_expiring_products().await.map_err(|err| {
        tracing::error!(error = ?err, "expiring products check failed");
        AppError::internal("expiring products check failed")
    })?;
    Ok(Json(JobResultResponse { result }))
}

/// The body is optional; an empty one uses the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct LowStockJobRequest {
    pub min_quantity: Option<i32>,
}

pub async fn run_low_stock_job(
    _admin: AdminToken,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<JobResultResponse>, AppError> {
    let payload: LowStockJobRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LowStockJobRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::bad_request(format!("invalid request body: {}", err)))?
    };
    let min_quantity = payload
        .min_quantity
        .unwrap_or(state.alerts.default_min_quantity());
    if min_quantity < 1 {
        return Err(AppError::bad_request("min_quantity must be at least 1"));
    }

    let result = state
        .alerts
        .check_low_stock(min_quantity)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, min_quantity, "low stock check failed");
            AppError::internal("low stock check failed")
        })?;
    Ok(Json(JobResultResponse { result }))
}

#[derive(Serialize)]
pub struct DiagnosticsResponse {
    pub subscriptions: SubscriptionCounts,
    pub vapid_configured: bool,
    pub vapid_error: Option<String>,
    pub email_configured: bool,
    pub unread_notifications: i64,
    pub schedules: Vec<Schedule>,
}

pub async fn diagnostics(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<DiagnosticsResponse>, AppError> {
    let internal = |err: anyhow::Error| {
        tracing::error!(error = ?err, "failed to collect diagnostics");
        AppError::internal("failed to collect diagnostics")
    };

    let subscriptions = PushSubscriptionService::new(state.db.clone())
        .counts()
        .await
        .map_err(internal)?;
    let unread_notifications = NotificationService::new(state.db.clone())
        .unread_count()
        .await
        .map_err(internal)?;
    let schedules = ScheduleService::new(state.db.clone())
        .list()
        .await
        .map_err(internal)?;

    Ok(Json(DiagnosticsResponse {
        subscriptions,
        vapid_configured: state.push.vapid_public_key().is_some(),
        vapid_error: state.push.key_error().map(str::to_string),
        email_configured: state.email_configured,
        unread_notifications,
        schedules,
    }))
}
