pub mod asset_store;
pub mod category_service;
pub mod product_service;
