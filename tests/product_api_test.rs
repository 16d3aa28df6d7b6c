mod common;

use axum::http::{Method, StatusCode};
use axum::body::Body;
use common::{body_json, numbered_form, pen_form, pen_parts, Part, TestApp, PNG_BYTES};
use product_dashboard::dto::product::messages;
use serde_json::Value;
use uuid::Uuid;

const PRODUCTS: &str = "/api/v1/dashboard/products";

async fn first_product(app: &TestApp) -> Value {
    let body = body_json(app.get(PRODUCTS).await).await;
    body["products"][0].clone()
}

#[tokio::test]
async fn storing_the_same_product_twice_fails_on_slug_and_sku() {
    let app = TestApp::with_categories().await;

    let response = app.post_multipart(PRODUCTS, &pen_parts()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], messages::SAVED);

    let response = app.post_multipart(PRODUCTS, &pen_parts()).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failure");
    assert_eq!(body["message"], messages::VALIDATION_FAILED);
    assert_eq!(body["errors"]["slug"][0], messages::SLUG_TAKEN);
    assert_eq!(body["errors"]["sku"][0], messages::SKU_TAKEN);
    assert_eq!(body["errors"].as_object().unwrap().len(), 2);
    assert_eq!(body["old_input"]["name"], "Pen");

    let list = body_json(app.get(PRODUCTS).await).await;
    assert_eq!(list["pagination"]["total"], 1);
}

#[tokio::test]
async fn empty_store_form_reports_every_required_field() {
    let app = TestApp::with_categories().await;

    let response = app.post_multipart(PRODUCTS, &[]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 7);
    assert_eq!(errors["name"][0], messages::NAME_REQUIRED);
    assert_eq!(errors["category_id"][0], messages::CATEGORY_REQUIRED);
    assert_eq!(errors["stock"][0], messages::STOCK_REQUIRED);
    assert!(!errors.contains_key("image"));
}

#[tokio::test]
async fn store_with_png_saves_file_and_serves_it() {
    let app = TestApp::with_categories().await;

    let mut parts = pen_parts();
    parts.push(Part::File {
        name: "image",
        file_name: "pen.png",
        content_type: "image/png",
        bytes: PNG_BYTES,
    });
    let response = app.post_multipart(PRODUCTS, &parts).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let product = first_product(&app).await;
    let image = product["image"].as_str().expect("image path").to_string();
    assert!(image.starts_with("product-images/"));
    assert!(image.ends_with(".png"));

    let on_disk = std::fs::read(app.asset_root().join(&image)).unwrap();
    assert_eq!(on_disk, PNG_BYTES);

    let served = app.get(&format!("/storage/{}", image)).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_image_upload_is_rejected_and_nothing_is_written() {
    let app = TestApp::with_categories().await;

    let mut parts = pen_parts();
    parts.push(Part::File {
        name: "image",
        file_name: "notes.txt",
        content_type: "text/plain",
        bytes: b"just some text",
    });
    let response = app.post_multipart(PRODUCTS, &parts).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["errors"]["image"][0], messages::IMAGE_NOT_IMAGE);
    assert!(!app.asset_root().join("product-images").exists());

    let list = body_json(app.get(PRODUCTS).await).await;
    assert_eq!(list["pagination"]["total"], 0);
}

#[tokio::test]
async fn empty_file_part_counts_as_no_image() {
    let app = TestApp::with_categories().await;

    let mut parts = pen_parts();
    parts.push(Part::File {
        name: "image",
        file_name: "",
        content_type: "application/octet-stream",
        bytes: b"",
    });
    let response = app.post_multipart(PRODUCTS, &parts).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(first_product(&app).await["image"].is_null());
}

#[tokio::test]
async fn list_filters_on_name_or_description_and_pages_by_ten() {
    let app = TestApp::with_categories().await;
    for n in 0..11 {
        app.seed_product(numbered_form("Widget", n, "Blue")).await;
    }
    app.seed_product(numbered_form("Gizmo", 1, "Fits every Widget"))
        .await;
    for n in 0..3 {
        app.seed_product(numbered_form("Gadget", n, "Green")).await;
    }

    let page_one = body_json(app.get(&format!("{}?q=Widget", PRODUCTS)).await).await;
    assert_eq!(page_one["q"], "Widget");
    assert_eq!(page_one["pagination"]["total"], 12);
    assert_eq!(page_one["pagination"]["total_pages"], 2);
    assert_eq!(page_one["pagination"]["per_page"], 10);
    assert_eq!(page_one["products"].as_array().unwrap().len(), 10);

    let page_two = body_json(app.get(&format!("{}?q=Widget&page=2", PRODUCTS)).await).await;
    let rest = page_two["products"].as_array().unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(page_two["pagination"]["page"], 2);

    // Oldest first; page two picks up where page one stopped
    let slugs: Vec<&str> = page_one["products"]
        .as_array()
        .unwrap()
        .iter()
        .chain(rest.iter())
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    let mut expected: Vec<String> = (0..11).map(|n| format!("widget-{}", n)).collect();
    expected.push("gizmo-1".to_string());
    assert_eq!(slugs, expected);

    let everything = body_json(app.get(&format!("{}?q=&page=", PRODUCTS)).await).await;
    assert_eq!(everything["products"][0]["slug"], "widget-0");
    assert!(everything["q"].is_null());
    assert_eq!(everything["pagination"]["total"], 15);
    assert_eq!(everything["products"][0]["category"]["name"], "Stationery");
}

#[tokio::test]
async fn create_form_lists_categories_in_id_order() {
    let app = TestApp::with_categories().await;
    app.seed_category(2, "Paper").await;

    let body = body_json(app.get(&format!("{}/create", PRODUCTS)).await).await;
    let ids: Vec<i64> = body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn show_and_edit_return_null_product_for_unknown_or_malformed_ids() {
    let app = TestApp::with_categories().await;

    let response = app.get(&format!("{}/{}", PRODUCTS, Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["product"].is_null());

    let response = app.get(&format!("{}/not-a-uuid/edit", PRODUCTS)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["product"].is_null());
    assert_eq!(body["categories"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn edit_form_returns_product_with_category() {
    let app = TestApp::with_categories().await;
    app.seed_product(pen_form()).await;
    let id = first_product(&app).await["id"].as_str().unwrap().to_string();

    let body = body_json(app.get(&format!("{}/{}/edit", PRODUCTS, id)).await).await;
    assert_eq!(body["product"]["slug"], "pen-01");
    assert_eq!(body["product"]["category"]["id"], 3);
    assert_eq!(body["categories"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_overwrites_fields_but_never_the_slug() {
    let app = TestApp::with_categories().await;
    app.seed_product(pen_form()).await;
    let before = first_product(&app).await;
    let id = before["id"].as_str().unwrap();

    let response = app
        .put_form(
            &format!("{}/{}", PRODUCTS, id),
            &[
                ("name", "Fountain Pen"),
                ("slug", "ignored-slug"),
                ("sku", "SKU1-F"),
                ("description", "A fountain pen"),
                ("category_id", "1"),
                ("price", "12.5"),
                ("stock", "0"),
                ("image", "product-images/fountain.png"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], messages::SAVED);

    let after = body_json(app.get(&format!("{}/{}", PRODUCTS, id)).await).await["product"].clone();
    assert_eq!(after["slug"], "pen-01");
    assert_eq!(after["name"], "Fountain Pen");
    assert_eq!(after["sku"], "SKU1-F");
    assert_eq!(after["category_id"], 1);
    assert_eq!(after["stock"], 0);
    assert_eq!(after["image"], "product-images/fountain.png");
    assert_eq!(after["created_at"], before["created_at"]);
}

#[tokio::test]
async fn update_with_bad_values_is_rejected_without_old_input() {
    let app = TestApp::with_categories().await;
    app.seed_product(pen_form()).await;
    let id = first_product(&app).await["id"].as_str().unwrap().to_string();

    let response = app
        .put_form(
            &format!("{}/{}", PRODUCTS, id),
            &[
                ("name", ""),
                ("sku", "SKU1"),
                ("description", "A pen"),
                ("category_id", "stationery"),
                ("price", "free"),
                ("stock", "10"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["errors"]["name"][0], messages::NAME_REQUIRED);
    assert_eq!(body["errors"]["category_id"][0], messages::CATEGORY_NOT_INTEGER);
    assert_eq!(body["errors"]["price"][0], messages::PRICE_NOT_NUMERIC);
    assert!(body.get("old_input").is_none());

    let product = first_product(&app).await;
    assert_eq!(product["name"], "Pen");
}

#[tokio::test]
async fn destroy_removes_product_and_reports_missing_ones() {
    let app = TestApp::with_categories().await;
    for n in 0..3 {
        app.seed_product(numbered_form("Pen", n, "A pen")).await;
    }
    let before = body_json(app.get(PRODUCTS).await).await;
    let products = before["products"].as_array().unwrap().clone();
    assert_eq!(products.len(), 3);
    let id = products[1]["id"].as_str().unwrap().to_string();
    let uri = format!("{}/{}", PRODUCTS, id);

    let response = app.delete(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], messages::DELETED);

    let after = body_json(app.get(PRODUCTS).await).await;
    assert_eq!(after["pagination"]["total"], 2);
    assert_eq!(
        after["products"].as_array().unwrap(),
        &vec![products[0].clone(), products[2].clone()]
    );

    let response = app.delete(&uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["request_id"].is_string());

    let response = app.delete(&format!("{}/42", PRODUCTS)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(app.get(PRODUCTS).await).await["pagination"]["total"], 2);
}

#[tokio::test]
async fn malformed_multipart_is_a_bad_request() {
    let app = TestApp::with_categories().await;

    let response = app
        .request(
            Method::POST,
            PRODUCTS,
            Body::from("--nope\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nPen"),
            &[("content-type", "multipart/form-data; boundary=nope")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed_back() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/health", Body::empty(), &[("x-request-id", "dash-42")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "dash-42");

    let body = body_json(response).await;
    assert_eq!(body["checks"]["database"], "healthy");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app.get("/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/api/v1/dashboard/products"].is_object());
}
