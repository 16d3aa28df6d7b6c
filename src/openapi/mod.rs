use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Product Dashboard API",
        version = "0.1.0",
        description = r#"
# Product Dashboard API

Back-office endpoints for managing the product catalogue.

## Forms

Create and update accept form submissions (`multipart/form-data` for create so
an image can be attached, `application/x-www-form-urlencoded` for update) and
answer with a form outcome:

```json
{ "status": "failure", "message": "Validation error, please complete the data first",
  "errors": { "sku": ["SKU already in use"] } }
```

Validation failures use status 422; every violated rule is listed.

## Pagination

The product list returns 10 products per page. Use `page` (1-based) and the
optional search term `q`, matched against name and description.
        "#
    ),
    tags(
        (name = "Products", description = "Dashboard product management"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::create_form,
        crate::handlers::products::store_product,
        crate::handlers::products::show_product,
        crate::handlers::products::edit_form,
        crate::handlers::products::update_product,
        crate::handlers::products::destroy_product,
        crate::health_check,
    ),
    components(
        schemas(
            crate::dto::product::StoreProductForm,
            crate::dto::product::UpdateProductForm,
            crate::dto::product::FormOutcome,
            crate::dto::product::ProductResponse,
            crate::dto::product::CategoryResponse,
            crate::dto::product::ProductListResponse,
            crate::dto::product::CategoryListResponse,
            crate::dto::product::ProductFormView,
            crate::dto::product::ProductDetailResponse,
            crate::handlers::common::PaginationMeta,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
