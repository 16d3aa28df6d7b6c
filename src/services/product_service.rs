use std::sync::Arc;

use crate::{
    db::DbPool,
    dto::product::{
        field_messages, messages, parse_integer, push_error, FieldErrors, FormOutcome, StoreProductForm,
        UpdateProductForm, UploadedImage, PRODUCT_IMAGE_MAX_BYTES,
    },
    entities::{
        category::{self, Entity as Category},
        product::{self, Column as ProductColumn, Entity as Product},
    },
    errors::ServiceError,
    services::asset_store::{AssetStore, ImageKind, PRODUCT_IMAGE_NAMESPACE},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Products shown per list page
pub const PRODUCTS_PER_PAGE: u64 = 10;

/// A product joined with its category, if the category still exists
pub type ProductWithCategory = (product::Model, Option<category::Model>);

/// One page of the product list
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<ProductWithCategory>,
    /// Effective search term; `None` when the list is unfiltered
    pub q: Option<String>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// Service for managing dashboard product records
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    assets: Arc<dyn AssetStore>,
}

impl ProductService {
    /// Creates a new product service instance
    pub fn new(db_pool: Arc<DbPool>, assets: Arc<dyn AssetStore>) -> Self {
        Self { db_pool, assets }
    }

    /// Lists products whose name or description contains `q`, one page at a time.
    ///
    /// A blank `q` lists everything; `page` is 1-based and defaults to 1.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        q: Option<String>,
        page: Option<u64>,
    ) -> Result<ProductPage, ServiceError> {
        let db = &*self.db_pool;
        let q = q
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());
        let page = page.unwrap_or(1).max(1);

        let mut query = Product::find().find_also_related(Category);

        if let Some(term) = &q {
            query = query.filter(
                Condition::any()
                    .add(ProductColumn::Name.contains(term.as_str()))
                    .add(ProductColumn::Description.contains(term.as_str())),
            );
        }

        let paginator = query
            .order_by_asc(ProductColumn::CreatedAt)
            .order_by_asc(ProductColumn::Id)
            .paginate(db, PRODUCTS_PER_PAGE);

        let totals = paginator.num_items_and_pages().await.map_err(|e| {
            error!(error = %e, "Failed to count products");
            ServiceError::DatabaseError(e)
        })?;

        let items = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, "Failed to fetch product page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(ProductPage {
            items,
            q,
            page,
            per_page: PRODUCTS_PER_PAGE,
            total: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Validates and persists a new product, storing its image when one is uploaded.
    ///
    /// Every violated rule is reported in the returned [`FormOutcome::Failure`];
    /// in that case nothing is written.
    #[instrument(skip(self, form, image), fields(slug = %form.slug, sku = %form.sku))]
    pub async fn store_product(
        &self,
        form: StoreProductForm,
        image: Option<UploadedImage>,
    ) -> Result<FormOutcome, ServiceError> {
        let db = &*self.db_pool;
        let form = form.normalized();
        let image = image.filter(|file| !file.is_empty());

        let mut errors = form
            .validate()
            .map(|_| FieldErrors::new())
            .unwrap_or_else(|e| field_messages(&e));

        let image_kind = image
            .as_ref()
            .and_then(|file| check_image(file, &mut errors));

        if !form.slug.is_empty() && self.slug_taken(&form.slug).await? {
            push_error(&mut errors, "slug", messages::SLUG_TAKEN);
        }
        if !form.sku.is_empty() && self.sku_taken(&form.sku).await? {
            push_error(&mut errors, "sku", messages::SKU_TAKEN);
        }
        // Out-of-range ids were already reported as missing
        if let Some(category_id) = parse_integer(&form.category_id) {
            if !self.category_exists(category_id).await? {
                push_error(&mut errors, "category_id", messages::CATEGORY_MISSING);
            }
        }

        if !errors.is_empty() {
            info!(fields = ?errors.keys().collect::<Vec<_>>(), "Product rejected by validation");
            return Ok(FormOutcome::failure(errors, Some(form)));
        }

        let new_product = form.to_new_product().ok_or_else(|| {
            ServiceError::InternalError("validated product form failed to convert".to_string())
        })?;

        let image_path = match (image.as_ref(), image_kind) {
            (Some(file), Some(kind)) => Some(
                self.assets
                    .store(file, kind, PRODUCT_IMAGE_NAMESPACE)
                    .await?,
            ),
            _ => None,
        };

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new_product.name),
            slug: Set(new_product.slug),
            sku: Set(new_product.sku),
            description: Set(new_product.description),
            category_id: Set(new_product.category_id),
            price: Set(new_product.price),
            stock: Set(new_product.stock),
            image: Set(image_path),
            ..Default::default()
        };

        let created = product.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::from_write_error(e)
        })?;

        info!(product_id = %created.id, sku = %created.sku, "Product created successfully");

        Ok(FormOutcome::success(messages::SAVED))
    }

    /// Fetches one product with its category
    #[instrument(skip(self))]
    pub async fn find_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductWithCategory>, ServiceError> {
        let db = &*self.db_pool;

        Product::find_by_id(id)
            .find_also_related(Category)
            .one(db)
            .await
            .map_err(|e| {
                error!(product_id = %id, error = %e, "Database error when fetching product");
                ServiceError::DatabaseError(e)
            })
    }

    /// Overwrites the editable fields of a product.
    ///
    /// `slug` is never changed. An id that matches nothing is not an error:
    /// the update simply touches no rows.
    #[instrument(skip(self, form))]
    pub async fn update_product(
        &self,
        id: Uuid,
        form: UpdateProductForm,
    ) -> Result<FormOutcome, ServiceError> {
        let db = &*self.db_pool;
        let form = form.normalized();

        if let Err(e) = form.validate() {
            let errors = field_messages(&e);
            info!(product_id = %id, fields = ?errors.keys().collect::<Vec<_>>(), "Product update rejected by validation");
            return Ok(FormOutcome::failure(errors, None));
        }

        let changes = form.to_changes().ok_or_else(|| {
            ServiceError::InternalError("validated update form failed to convert".to_string())
        })?;

        let result = Product::update_many()
            .set(product::ActiveModel {
                name: Set(changes.name),
                sku: Set(changes.sku),
                description: Set(changes.description),
                category_id: Set(changes.category_id),
                price: Set(changes.price),
                stock: Set(changes.stock),
                image: Set(changes.image),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(ProductColumn::Id.eq(id))
            .exec(db)
            .await
            .map_err(|e| {
                error!(product_id = %id, error = %e, "Failed to update product");
                ServiceError::from_write_error(e)
            })?;

        if result.rows_affected == 0 {
            warn!(product_id = %id, "Update matched no product");
        } else {
            info!(product_id = %id, "Product updated successfully");
        }

        Ok(FormOutcome::success(messages::SAVED))
    }

    /// Deletes a product. Its stored image, if any, is left in place.
    #[instrument(skip(self))]
    pub async fn destroy_product(&self, id: Uuid) -> Result<FormOutcome, ServiceError> {
        let db = &*self.db_pool;

        let product = Product::find_by_id(id)
            .one(db)
            .await
            .map_err(|e| {
                error!(product_id = %id, error = %e, "Database error when fetching product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                let msg = format!("Product with ID {} not found", id);
                warn!(%msg);
                ServiceError::NotFound(msg)
            })?;

        product.delete(db).await.map_err(|e| {
            error!(product_id = %id, error = %e, "Failed to delete product");
            ServiceError::from_write_error(e)
        })?;

        info!(product_id = %id, "Product deleted successfully");

        Ok(FormOutcome::success(messages::DELETED))
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, ServiceError> {
        let count = Product::find()
            .filter(ProductColumn::Slug.eq(slug))
            .count(&*self.db_pool)
            .await?;
        Ok(count > 0)
    }

    async fn sku_taken(&self, sku: &str) -> Result<bool, ServiceError> {
        let count = Product::find()
            .filter(ProductColumn::Sku.eq(sku))
            .count(&*self.db_pool)
            .await?;
        Ok(count > 0)
    }

    async fn category_exists(&self, category_id: i32) -> Result<bool, ServiceError> {
        Ok(Category::find_by_id(category_id)
            .one(&*self.db_pool)
            .await?
            .is_some())
    }
}

/// Applies the image rules, recording violations and returning the detected
/// format when the file is acceptable.
fn check_image(file: &UploadedImage, errors: &mut FieldErrors) -> Option<ImageKind> {
    let kind = ImageKind::detect(file);
    if kind.is_none() {
        push_error(errors, "image", messages::IMAGE_NOT_IMAGE);
    }
    if file.bytes.len() > PRODUCT_IMAGE_MAX_BYTES {
        push_error(errors, "image", messages::IMAGE_TOO_LARGE);
        return None;
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::asset_store::LocalAssetStore;
    use assert_matches::assert_matches;
    use bytes::Bytes;

    struct Fixture {
        service: ProductService,
        db: Arc<DbPool>,
        _assets: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let config = crate::db::DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = crate::db::establish_connection_with_config(&config)
            .await
            .expect("sqlite");
        crate::db::run_migrations(&db).await.expect("migrations");

        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(db);
        let service = ProductService::new(db.clone(), Arc::new(LocalAssetStore::new(dir.path())));

        category::ActiveModel {
            id: Set(3),
            name: Set("Stationery".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*db)
        .await
        .expect("category");

        Fixture {
            service,
            db,
            _assets: dir,
        }
    }

    fn pen_form() -> StoreProductForm {
        StoreProductForm {
            name: "Pen".into(),
            slug: "pen-01".into(),
            sku: "SKU1".into(),
            description: "A pen".into(),
            category_id: "3".into(),
            price: "2.5".into(),
            stock: "10".into(),
        }
    }

    #[tokio::test]
    async fn storing_same_product_twice_reports_slug_and_sku() {
        let fx = fixture().await;

        let first = fx.service.store_product(pen_form(), None).await.unwrap();
        assert_eq!(first, FormOutcome::success(messages::SAVED));

        let second = fx.service.store_product(pen_form(), None).await.unwrap();
        let errors = second.errors().expect("failure");
        assert_eq!(errors["slug"], vec![messages::SLUG_TAKEN]);
        assert_eq!(errors["sku"], vec![messages::SKU_TAKEN]);
        assert_eq!(errors.len(), 2);

        assert_eq!(Product::find().count(&*fx.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let fx = fixture().await;
        let form = StoreProductForm {
            category_id: "42".into(),
            ..pen_form()
        };

        let outcome = fx.service.store_product(form, None).await.unwrap();
        assert_matches!(
            outcome,
            FormOutcome::Failure { ref errors, old_input: Some(ref old), .. } => {
                assert_eq!(errors["category_id"], vec![messages::CATEGORY_MISSING]);
                assert_eq!(old.category_id, "42");
            }
        );
    }

    #[tokio::test]
    async fn oversized_non_image_reports_both_image_rules() {
        let fx = fixture().await;
        let image = UploadedImage {
            file_name: Some("big.png".into()),
            content_type: Some("image/png".into()),
            bytes: Bytes::from(vec![b'a'; PRODUCT_IMAGE_MAX_BYTES + 1]),
        };

        let outcome = fx.service.store_product(pen_form(), Some(image)).await.unwrap();
        let errors = outcome.errors().expect("failure");
        assert_eq!(
            errors["image"],
            vec![messages::IMAGE_NOT_IMAGE, messages::IMAGE_TOO_LARGE]
        );
        assert_eq!(Product::find().count(&*fx.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_keeps_slug_and_allows_negative_values() {
        let fx = fixture().await;
        fx.service.store_product(pen_form(), None).await.unwrap();
        let (before, _) = fx.service.list_products(None, None).await.unwrap().items.remove(0);

        let form = UpdateProductForm {
            name: "Pen v2".into(),
            sku: "SKU1-B".into(),
            description: "A better pen".into(),
            category_id: "3".into(),
            price: "-1".into(),
            stock: "-4".into(),
            image: Some("product-images/manual.png".into()),
        };
        let outcome = fx.service.update_product(before.id, form).await.unwrap();
        assert!(outcome.is_success());

        let (after, category) = fx.service.find_product(before.id).await.unwrap().unwrap();
        assert_eq!(after.slug, "pen-01");
        assert_eq!(after.name, "Pen v2");
        assert_eq!(after.stock, -4);
        assert_eq!(after.image.as_deref(), Some("product-images/manual.png"));
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(category.map(|c| c.id), Some(3));
    }

    #[tokio::test]
    async fn update_of_missing_product_is_a_successful_no_op() {
        let fx = fixture().await;
        let form = UpdateProductForm {
            name: "Ghost".into(),
            sku: "GHOST".into(),
            description: "Nothing here".into(),
            category_id: "3".into(),
            price: "1".into(),
            stock: "1".into(),
            image: None,
        };

        let outcome = fx.service.update_product(Uuid::new_v4(), form).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(Product::find().count(&*fx.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn destroy_missing_product_is_not_found() {
        let fx = fixture().await;
        let err = fx.service.destroy_product(Uuid::new_v4()).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn blank_search_lists_everything() {
        let fx = fixture().await;
        fx.service.store_product(pen_form(), None).await.unwrap();

        let page = fx
            .service
            .list_products(Some("   ".into()), Some(0))
            .await
            .unwrap();
        assert_eq!(page.q, None);
        assert_eq!(page.page, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }
}
