use axum::{routing::delete, routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn products() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/products/expiring-soon", get(handlers::expiring_products))
        .route("/products/expired", get(handlers::expired_products))
        .route(
            "/products/:id",
            get(handlers::get_product)
                .put(handlers::replace_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/dashboard/stats", get(handlers::dashboard_stats))
}

pub fn catalog() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category).delete(handlers::delete_category),
        )
        .route(
            "/brands",
            get(handlers::list_brands).post(handlers::create_brand),
        )
        .route(
            "/brands/:id",
            get(handlers::get_brand).delete(handlers::delete_brand),
        )
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id",
            get(handlers::get_notification).delete(handlers::delete_notification),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}

pub fn push() -> Router<AppState> {
    Router::new()
        .route("/push/vapid-public-key", get(handlers::vapid_public_key))
        .route(
            "/push/subscriptions",
            get(handlers::list_push_subscriptions).post(handlers::subscribe_push),
        )
        .route(
            "/push/subscriptions/cleanup",
            post(handlers::cleanup_push_subscriptions),
        )
        .route(
            "/push/subscriptions/:id",
            delete(handlers::delete_push_subscription),
        )
        .route("/push/unsubscribe", post(handlers::unsubscribe_push))
        .route("/push/test", post(handlers::send_test_push))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route(
            "/schedules",
            get(handlers::list_schedules).post(handlers::create_schedules),
        )
        .route("/schedules/:id", delete(handlers::delete_schedule))
        .route("/schedules/:id/run", post(handlers::run_schedule))
        .route(
            "/jobs/expiring-products",
            post(handlers::run_expiring_products_job),
        )
        .route("/jobs/low-stock", post(handlers::run_low_stock_job))
        .route("/diagnostics", get(handlers::diagnostics))
}
