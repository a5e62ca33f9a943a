//! Product and Catalog Tests
//!
//! Covers product CRUD, validation, filtering, expiry listings, and the
//! category/brand endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{app, days_from_today, unique};
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Product CRUD
// ===========================================================================

#[tokio::test]
async fn create_and_get_product() {
    let Some(app) = app().await else { return };
    let category = unique("Grãos");
    let category_id = app.create_category(&category).await;

    let product = app
        .create_product(json!({
            "name": "  Arroz Integral  ",
            "description": "Pacote 1kg",
            "price": "5.989",
            "quantity": 12,
            "expiration_date": days_from_today(20),
            "category_id": category_id,
            "batch": "L-001",
        }))
        .await;

    assert_eq!(product["name"], "Arroz Integral");
    assert_eq!(product["price"], "5.99");
    assert_eq!(product["quantity"], 12);
    assert_eq!(product["category_name"], category.as_str());
    assert_eq!(product["brand_id"], serde_json::Value::Null);

    let id = product["id"].as_str().unwrap();
    let resp = app.get(&format!("/products/{}", id)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["batch"], "L-001");
    assert_eq!(resp.json()["expiration_date"], days_from_today(20).as_str());
}

#[tokio::test]
async fn create_product_validation() {
    let Some(app) = app().await else { return };

    let resp = app
        .post_json("/products", json!({ "name": "   ", "price": "1.00" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "name is required");

    let resp = app
        .post_json("/products", json!({ "name": "Sal", "price": "-1" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "price must not be negative");

    let resp = app
        .post_json(
            "/products",
            json!({ "name": "Sal", "price": "1", "quantity": -3 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "quantity must not be negative");

    let resp = app
        .post_json(
            "/products",
            json!({ "name": "Sal", "price": "1", "category_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "category or brand does not exist");
}

#[tokio::test]
async fn patch_product_keeps_missing_fields_and_clears_nulls() {
    let Some(app) = app().await else { return };
    let product = app
        .create_product(json!({
            "name": "Leite",
            "description": "Integral",
            "price": "4.50",
            "quantity": 8,
            "expiration_date": days_from_today(5),
        }))
        .await;
    let path = format!("/products/{}", product["id"].as_str().unwrap());

    let resp = app
        .patch_json(&path, json!({ "quantity": 3, "description": null }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["quantity"], 3);
    assert_eq!(body["description"], serde_json::Value::Null);
    assert_eq!(body["name"], "Leite");
    assert_eq!(body["price"], "4.50");
    assert_eq!(body["expiration_date"], days_from_today(5).as_str());

    let resp = app.patch_json(&path, json!({ "name": "" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .patch_json(&format!("/products/{}", Uuid::new_v4()), json!({ "quantity": 1 }))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_replaces_every_field() {
    let Some(app) = app().await else { return };
    let product = app
        .create_product(json!({
            "name": "Feijão",
            "description": "Carioca",
            "price": "7.20",
            "quantity": 9,
            "expiration_date": days_from_today(30),
            "batch": "F-77",
        }))
        .await;
    let path = format!("/products/{}", product["id"].as_str().unwrap());

    let resp = app
        .put_json(&path, json!({ "name": "Feijão Preto", "price": "8.00" }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], product["id"]);
    assert_eq!(body["name"], "Feijão Preto");
    assert_eq!(body["price"], "8.00");
    assert_eq!(body["quantity"], 0);
    assert_eq!(body["description"], serde_json::Value::Null);
    assert_eq!(body["expiration_date"], serde_json::Value::Null);
    assert_eq!(body["batch"], serde_json::Value::Null);

    let resp = app.put_json(&path, json!({ "quantity": 4 })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("name"));

    let resp = app
        .put_json(
            &format!("/products/{}", Uuid::new_v4()),
            json!({ "name": "Sal", "price": "1.00" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_use_error_envelope() {
    let Some(app) = app().await else { return };

    let resp = app
        .request_raw(Method::POST, "/products", Some("application/json"), "{\"name\": ", &[])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(!resp.error_message().is_empty());

    let resp = app
        .request_raw(Method::POST, "/categories", None, "{\"name\": \"Bebidas\"}", &[])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(!resp.error_message().is_empty());

    let resp = app
        .post_json("/products", json!({ "name": "Sal", "price": "1", "quantity": "muitos" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("quantity"));
}

#[tokio::test]
async fn delete_product() {
    let Some(app) = app().await else { return };
    let product = app
        .create_product(json!({ "name": "Café", "price": "12.00", "quantity": 4 }))
        .await;
    let path = format!("/products/{}", product["id"].as_str().unwrap());

    assert_eq!(app.delete(&path).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&path).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&path).await.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Listing
// ===========================================================================

#[tokio::test]
async fn list_products_filters_and_orders() {
    let Some(app) = app().await else { return };
    let batch = unique("LOTE");
    for (name, price) in [("Biscoito", "3.00"), ("Azeite", "25.00"), ("Chá", "7.50")] {
        app.create_product(json!({
            "name": name,
            "price": price,
            "quantity": 5,
            "batch": batch,
        }))
        .await;
    }

    let resp = app
        .get(&format!("/products?batch={}&ordering=-price", batch))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Azeite", "Chá", "Biscoito"]);
    assert_eq!(body["limit"], 100);
    assert_eq!(body["offset"], 0);

    let resp = app
        .get(&format!("/products?search={}&ordering=name&limit=2&offset=1", batch.to_lowercase()))
        .await;
    let names: Vec<String> = resp.json()["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Biscoito", "Chá"]);
}

#[tokio::test]
async fn list_products_rejects_bad_parameters() {
    let Some(app) = app().await else { return };

    let resp = app.get("/products?limit=0").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "limit must be between 1 and 500");

    let resp = app.get("/products?offset=-1").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app.get("/products?ordering=quantity").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expiring_and_expired_listings() {
    let Some(app) = app().await else { return };
    let soon = app
        .create_product(json!({
            "name": unique("Iogurte"),
            "price": "2.00",
            "quantity": 3,
            "expiration_date": days_from_today(2),
        }))
        .await;
    let out_of_stock = app
        .create_product(json!({
            "name": unique("Queijo"),
            "price": "20.00",
            "quantity": 0,
            "expiration_date": days_from_today(2),
        }))
        .await;
    let far = app
        .create_product(json!({
            "name": unique("Enlatado"),
            "price": "6.00",
            "quantity": 3,
            "expiration_date": days_from_today(45),
        }))
        .await;
    let expired = app
        .create_product(json!({
            "name": unique("Pão"),
            "price": "8.00",
            "quantity": 1,
            "expiration_date": days_from_today(-1),
        }))
        .await;

    let ids = |value: serde_json::Value| -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap().to_string())
            .collect()
    };

    let resp = app.get("/products/expiring-soon").await;
    assert_eq!(resp.status, StatusCode::OK);
    let expiring = ids(resp.json());
    assert!(expiring.contains(&soon["id"].as_str().unwrap().to_string()));
    assert!(!expiring.contains(&out_of_stock["id"].as_str().unwrap().to_string()));
    assert!(!expiring.contains(&far["id"].as_str().unwrap().to_string()));
    assert!(!expiring.contains(&expired["id"].as_str().unwrap().to_string()));

    let resp = app.get("/products/expired").await;
    let expired_ids = ids(resp.json());
    assert!(expired_ids.contains(&expired["id"].as_str().unwrap().to_string()));
    assert!(!expired_ids.contains(&soon["id"].as_str().unwrap().to_string()));
}

// ===========================================================================
// Categories and brands
// ===========================================================================

#[tokio::test]
async fn category_lifecycle() {
    let Some(app) = app().await else { return };
    let name = unique("Bebidas");

    let resp = app.post_json("/categories", json!({ "name": name })).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let id = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app.post_json("/categories", json!({ "name": name })).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "category already exists");

    let resp = app.get(&format!("/categories/{}", id)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["name"], name.as_str());

    let resp = app.get("/categories").await;
    assert!(resp.json().as_array().unwrap().iter().any(|c| c["id"] == id.as_str()));

    assert_eq!(
        app.delete(&format!("/categories/{}", id)).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get(&format!("/categories/{}", id)).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn deleting_a_brand_detaches_products() {
    let Some(app) = app().await else { return };
    let resp = app.post_json("/brands", json!({ "name": unique("Marca") })).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let brand_id = resp.json()["id"].as_str().unwrap().to_string();

    let product = app
        .create_product(json!({ "name": "Molho", "price": "3.20", "brand_id": brand_id }))
        .await;
    assert!(product["brand_name"].is_string());

    assert_eq!(
        app.delete(&format!("/brands/{}", brand_id)).await.status,
        StatusCode::NO_CONTENT
    );

    let resp = app
        .get(&format!("/products/{}", product["id"].as_str().unwrap()))
        .await;
    assert_eq!(resp.json()["brand_id"], serde_json::Value::Null);
    assert_eq!(resp.json()["brand_name"], serde_json::Value::Null);
}

#[tokio::test]
async fn catalog_name_is_required() {
    let Some(app) = app().await else { return };
    let resp = app.post_json("/brands", json!({ "name": "  " })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "name is required");

    let resp = app.post_json("/brands", json!({ "name": "x".repeat(101) })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_database() {
    let Some(app) = app().await else { return };
    let resp = app.get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
