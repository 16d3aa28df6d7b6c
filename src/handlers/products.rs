use crate::{
    dto::product::{
        CategoryListResponse, CategoryResponse, FormOutcome, ProductDetailResponse,
        ProductFormView, ProductListQuery, ProductListResponse, ProductResponse, StoreProductForm,
        UpdateProductForm, UploadedImage,
    },
    errors::ServiceError,
    handlers::common::{form_outcome_response, success_response, PaginationMeta},
    AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Form, Router,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Creates the router for the dashboard product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(store_product))
        .route("/create", get(create_form))
        .route(
            "/:id",
            get(show_product).put(update_product).delete(destroy_product),
        )
        .route("/:id/edit", get(edit_form))
}

/// Ids that are not UUIDs cannot match any product
fn parse_product_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

async fn category_list(state: &AppState) -> Result<Vec<CategoryResponse>, ServiceError> {
    Ok(state
        .services
        .categories
        .list_categories()
        .await?
        .into_iter()
        .map(CategoryResponse::from)
        .collect())
}

async fn find_product_response(
    state: &AppState,
    raw_id: &str,
) -> Result<Option<ProductResponse>, ServiceError> {
    let Some(id) = parse_product_id(raw_id) else {
        debug!(id = raw_id, "Ignoring malformed product id");
        return Ok(None);
    };

    Ok(state
        .services
        .products
        .find_product(id)
        .await?
        .map(|(product, category)| ProductResponse::new(product, category)))
}

/// Reads the create form: text fields plus an optional `image` file part
async fn read_store_form(
    mut multipart: Multipart,
) -> Result<(StoreProductForm, Option<UploadedImage>), ServiceError> {
    let mut form = StoreProductForm::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart body");
        ServiceError::BadRequest(format!("Malformed multipart body: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                ServiceError::BadRequest(format!("Failed to read image upload: {}", e))
            })?;
            image = Some(UploadedImage {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(|e| {
                ServiceError::BadRequest(format!("Failed to read field '{}': {}", name, e))
            })?;
            form.set_field(&name, value);
        }
    }

    Ok((form, image))
}

/// List products, optionally filtered by a search term
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "One page of products", body = ProductListResponse),
        (status = 500, description = "Database error", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ServiceError> {
    let requested_page = query.page();
    let page = state
        .services
        .products
        .list_products(query.q, requested_page)
        .await?;

    let pagination = PaginationMeta::new(page.page, page.per_page, page.total);
    let products = page
        .items
        .into_iter()
        .map(|(product, category)| ProductResponse::new(product, category))
        .collect();

    Ok(success_response(ProductListResponse {
        products,
        q: page.q,
        pagination,
    }))
}

/// Categories available to the create form
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/products/create",
    responses(
        (status = 200, description = "All categories", body = CategoryListResponse)
    ),
    tag = "Products"
)]
pub async fn create_form(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(CategoryListResponse {
        categories: category_list(&state).await?,
    }))
}

/// Create a product from a multipart form
#[utoipa::path(
    post,
    path = "/api/v1/dashboard/products",
    request_body(content = StoreProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product saved", body = FormOutcome),
        (status = 400, description = "Malformed multipart body", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug or SKU taken by a concurrent request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation failed", body = FormOutcome)
    ),
    tag = "Products"
)]
pub async fn store_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServiceError> {
    let (form, image) = read_store_form(multipart).await?;
    let outcome = state.services.products.store_product(form, image).await?;
    Ok(form_outcome_response(outcome, StatusCode::CREATED))
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product, or null when it does not exist", body = ProductDetailResponse)
    ),
    tag = "Products"
)]
pub async fn show_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let product = find_product_response(&state, &id).await?;
    Ok(success_response(ProductDetailResponse { product }))
}

/// Product and categories for the edit form
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/products/{id}/edit",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Edit form data; product is null when it does not exist", body = ProductFormView)
    ),
    tag = "Products"
)]
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let product = find_product_response(&state, &id).await?;
    let categories = category_list(&state).await?;
    Ok(success_response(ProductFormView {
        product,
        categories,
    }))
}

/// Update a product from a url-encoded form
#[utoipa::path(
    put,
    path = "/api/v1/dashboard/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body(content = UpdateProductForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Product saved", body = FormOutcome),
        (status = 409, description = "Constraint violated", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation failed", body = FormOutcome)
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<UpdateProductForm>,
) -> Result<Response, ServiceError> {
    // A malformed id matches nothing; the nil id keeps the no-op semantics
    // while the form is still validated
    let product_id = parse_product_id(&id).unwrap_or_else(Uuid::nil);
    let outcome = state
        .services
        .products
        .update_product(product_id, form)
        .await?;
    Ok(form_outcome_response(outcome, StatusCode::OK))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/v1/dashboard/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = FormOutcome),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn destroy_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let product_id = parse_product_id(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found", id)))?;
    let outcome = state.services.products.destroy_product(product_id).await?;
    Ok(form_outcome_response(outcome, StatusCode::OK))
}
