use std::sync::Arc;

use crate::{
    db::DbPool,
    entities::category::{self, Column as CategoryColumn, Entity as Category},
    errors::ServiceError,
};
use sea_orm::{EntityTrait, QueryOrder};
use tracing::{error, instrument};

/// Read access to product categories for the dashboard forms
#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// All categories, ordered by id
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Category::find()
            .order_by_asc(CategoryColumn::Id)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list categories");
                ServiceError::DatabaseError(e)
            })
    }
}
