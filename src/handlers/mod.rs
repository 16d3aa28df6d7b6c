pub mod common;
pub mod products;

use std::sync::Arc;

use crate::{
    db::DbPool,
    services::{
        asset_store::AssetStore, category_service::CategoryService,
        product_service::ProductService,
    },
};

/// Services shared by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            products: Arc::new(ProductService::new(db_pool.clone(), assets)),
            categories: Arc::new(CategoryService::new(db_pool)),
        }
    }
}
