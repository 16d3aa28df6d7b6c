//! Request and response shapes for the product dashboard.
//!
//! Forms carry the raw submitted text so that every rule (required, format,
//! range) can report its own message; the service turns a validated form
//! into a typed [`NewProduct`] or [`ProductChanges`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::entities::{category, product};
use crate::handlers::common::PaginationMeta;

/// Upload cap for product images: 2048 KB
pub const PRODUCT_IMAGE_MAX_BYTES: usize = 2048 * 1024;
pub const SLUG_MAX_CHARS: usize = 255;
pub const SKU_MAX_CHARS: usize = 50;

/// Field name to the messages of every rule it violated
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub mod messages {
    pub const NAME_REQUIRED: &str = "Name is required";
    pub const SLUG_REQUIRED: &str = "Slug is required";
    pub const SLUG_TOO_LONG: &str = "Slug may not be greater than 255 characters";
    pub const SLUG_TAKEN: &str = "Slug already in use";
    pub const SKU_REQUIRED: &str = "SKU is required";
    pub const SKU_TOO_LONG: &str = "SKU may not be greater than 50 characters";
    pub const SKU_TAKEN: &str = "SKU already in use";
    pub const DESCRIPTION_REQUIRED: &str = "Description is required";
    pub const CATEGORY_REQUIRED: &str = "Category is required";
    pub const CATEGORY_NOT_INTEGER: &str = "Category must be an integer";
    pub const CATEGORY_MISSING: &str = "Selected category does not exist";
    pub const PRICE_REQUIRED: &str = "Price is required";
    pub const PRICE_NOT_NUMERIC: &str = "Price must be a number";
    pub const PRICE_OUT_OF_RANGE: &str = "Price is out of range";
    pub const PRICE_NEGATIVE: &str = "Price must be at least 0";
    pub const STOCK_REQUIRED: &str = "Stock is required";
    pub const STOCK_NOT_INTEGER: &str = "Stock must be an integer";
    pub const STOCK_OUT_OF_RANGE: &str = "Stock must be between -2147483648 and 2147483647";
    pub const STOCK_NEGATIVE: &str = "Stock must be at least 0";
    pub const IMAGE_NOT_IMAGE: &str = "Image must be an image file";
    pub const IMAGE_TOO_LARGE: &str = "Image may not be greater than 2048 kilobytes";

    pub const SAVED: &str = "Data saved successfully";
    pub const DELETED: &str = "Data deleted successfully";
    pub const VALIDATION_FAILED: &str = "Validation error, please complete the data first";
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn required(value: &str, message: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(rule("required", message))
    } else {
        Ok(())
    }
}

fn max_chars(value: &str, max: usize, message: &'static str) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        Err(rule("max", message))
    } else {
        Ok(())
    }
}

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?[0-9]+$").expect("integer pattern compiles")
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$")
        .expect("numeric pattern compiles")
});

/// Whether `value` is written as an integer, whatever its magnitude
pub fn is_integer(value: &str) -> bool {
    INTEGER_RE.is_match(value.trim())
}

/// Whether `value` is written as a number (plain or scientific notation),
/// whatever its magnitude
pub fn is_numeric(value: &str) -> bool {
    NUMERIC_RE.is_match(value.trim())
}

/// Accepts plain and scientific decimal notation. `None` when the value is
/// not numeric or does not fit a [`Decimal`].
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .ok()
        .or_else(|| Decimal::from_scientific(value).ok())
}

/// `None` when the value is not an integer or does not fit the `i32` columns.
pub fn parse_integer(value: &str) -> Option<i32> {
    value.trim().parse::<i32>().ok()
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    required(value, messages::NAME_REQUIRED)
}

fn validate_slug(value: &str) -> Result<(), ValidationError> {
    required(value, messages::SLUG_REQUIRED)?;
    max_chars(value, SLUG_MAX_CHARS, messages::SLUG_TOO_LONG)
}

fn validate_sku(value: &str) -> Result<(), ValidationError> {
    required(value, messages::SKU_REQUIRED)?;
    max_chars(value, SKU_MAX_CHARS, messages::SKU_TOO_LONG)
}

fn validate_description(value: &str) -> Result<(), ValidationError> {
    required(value, messages::DESCRIPTION_REQUIRED)
}

fn validate_category_id(value: &str) -> Result<(), ValidationError> {
    required(value, messages::CATEGORY_REQUIRED)?;
    if !is_integer(value) {
        return Err(rule("integer", messages::CATEGORY_NOT_INTEGER));
    }
    // Category keys are `i32`; anything wider names no category
    parse_integer(value)
        .map(|_| ())
        .ok_or_else(|| rule("exists", messages::CATEGORY_MISSING))
}

fn validate_price(value: &str) -> Result<(), ValidationError> {
    required(value, messages::PRICE_REQUIRED)?;
    if !is_numeric(value) {
        return Err(rule("numeric", messages::PRICE_NOT_NUMERIC));
    }
    parse_decimal(value)
        .map(|_| ())
        .ok_or_else(|| rule("range", messages::PRICE_OUT_OF_RANGE))
}

fn validate_price_non_negative(value: &str) -> Result<(), ValidationError> {
    validate_price(value)?;
    match parse_decimal(value) {
        Some(price) if price < Decimal::ZERO => Err(rule("min", messages::PRICE_NEGATIVE)),
        _ => Ok(()),
    }
}

fn validate_stock(value: &str) -> Result<(), ValidationError> {
    required(value, messages::STOCK_REQUIRED)?;
    if !is_integer(value) {
        return Err(rule("integer", messages::STOCK_NOT_INTEGER));
    }
    parse_integer(value)
        .map(|_| ())
        .ok_or_else(|| rule("range", messages::STOCK_OUT_OF_RANGE))
}

fn validate_stock_non_negative(value: &str) -> Result<(), ValidationError> {
    validate_stock(value)?;
    match parse_integer(value) {
        Some(stock) if stock < 0 => Err(rule("min", messages::STOCK_NEGATIVE)),
        _ => Ok(()),
    }
}

/// Flattens validator output into per-field message lists.
pub fn field_messages(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

pub fn push_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn trimmed(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

/// Text fields submitted with the create form
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct StoreProductForm {
    #[validate(custom = "validate_name")]
    #[schema(example = "Pen")]
    pub name: String,
    #[validate(custom = "validate_slug")]
    #[schema(example = "pen-01")]
    pub slug: String,
    #[validate(custom = "validate_sku")]
    #[schema(example = "SKU1")]
    pub sku: String,
    #[validate(custom = "validate_description")]
    #[schema(example = "A pen")]
    pub description: String,
    #[validate(custom = "validate_category_id")]
    #[schema(example = "3")]
    pub category_id: String,
    #[validate(custom = "validate_price_non_negative")]
    #[schema(example = "2.5")]
    pub price: String,
    #[validate(custom = "validate_stock_non_negative")]
    #[schema(example = "10")]
    pub stock: String,
}

impl StoreProductForm {
    /// Trims every field, the way the dashboard's form submission is normalized
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed(self.name),
            slug: trimmed(self.slug),
            sku: trimmed(self.sku),
            description: trimmed(self.description),
            category_id: trimmed(self.category_id),
            price: trimmed(self.price),
            stock: trimmed(self.stock),
        }
    }

    /// Sets a text field by its form name; unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "name" => self.name = value,
            "slug" => self.slug = value,
            "sku" => self.sku = value,
            "description" => self.description = value,
            "category_id" => self.category_id = value,
            "price" => self.price = value,
            "stock" => self.stock = value,
            _ => {}
        }
    }

    /// Typed record for a form that already passed validation.
    pub fn to_new_product(&self) -> Option<NewProduct> {
        Some(NewProduct {
            name: self.name.clone(),
            slug: self.slug.clone(),
            sku: self.sku.clone(),
            description: self.description.clone(),
            category_id: parse_integer(&self.category_id)?,
            price: parse_decimal(&self.price)?,
            stock: parse_integer(&self.stock)?,
        })
    }
}

/// Fields submitted with the edit form. `slug` is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct UpdateProductForm {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[validate(custom = "validate_sku")]
    pub sku: String,
    #[validate(custom = "validate_description")]
    pub description: String,
    #[validate(custom = "validate_category_id")]
    pub category_id: String,
    #[validate(custom = "validate_price")]
    pub price: String,
    #[validate(custom = "validate_stock")]
    pub stock: String,
    /// Stored as submitted; not validated or uploaded
    pub image: Option<String>,
}

impl UpdateProductForm {
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed(self.name),
            sku: trimmed(self.sku),
            description: trimmed(self.description),
            category_id: trimmed(self.category_id),
            price: trimmed(self.price),
            stock: trimmed(self.stock),
            image: self.image.map(trimmed).filter(|value| !value.is_empty()),
        }
    }

    pub fn to_changes(&self) -> Option<ProductChanges> {
        Some(ProductChanges {
            name: self.name.clone(),
            sku: self.sku.clone(),
            description: self.description.clone(),
            category_id: parse_integer(&self.category_id)?,
            price: parse_decimal(&self.price)?,
            stock: parse_integer(&self.stock)?,
            image: self.image.clone(),
        })
    }
}

/// Validated values for a product about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub category_id: i32,
    pub price: Decimal,
    pub stock: i32,
}

/// Validated values overwritten by an update
#[derive(Debug, Clone, PartialEq)]
pub struct ProductChanges {
    pub name: String,
    pub sku: String,
    pub description: String,
    pub category_id: i32,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
}

/// An image file received with the create form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedImage {
    /// Browsers submit an empty part when no file was chosen
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.file_name.as_deref().map_or(true, str::is_empty)
    }
}

/// Result of a form submission, returned instead of flashing session state
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FormOutcome {
    Success {
        message: String,
    },
    Failure {
        message: String,
        #[schema(value_type = Object)]
        errors: FieldErrors,
        /// Submitted text fields, for re-display on the create form
        #[serde(skip_serializing_if = "Option::is_none")]
        old_input: Option<StoreProductForm>,
    },
}

impl FormOutcome {
    pub fn success(message: &str) -> Self {
        FormOutcome::Success {
            message: message.to_string(),
        }
    }

    pub fn failure(errors: FieldErrors, old_input: Option<StoreProductForm>) -> Self {
        FormOutcome::Failure {
            message: messages::VALIDATION_FAILED.to_string(),
            errors,
            old_input,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FormOutcome::Success { .. })
    }

    /// Field errors of a failed submission, empty on success
    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            FormOutcome::Failure { errors, .. } => Some(errors),
            FormOutcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// Substring matched against name or description
    pub q: Option<String>,
    /// 1-based page number; anything unparsable means page 1
    #[param(value_type = Option<u64>)]
    pub page: Option<String>,
}

impl ProductListQuery {
    pub fn page(&self) -> Option<u64> {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = "Stationery")]
    pub name: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    #[schema(example = "Pen")]
    pub name: String,
    #[schema(example = "pen-01")]
    pub slug: String,
    #[schema(example = "SKU1")]
    pub sku: String,
    pub description: String,
    pub category_id: i32,
    pub category: Option<CategoryResponse>,
    #[schema(value_type = String, example = "2.5")]
    pub price: Decimal,
    pub stock: i32,
    /// Path of the stored image relative to `/storage`
    #[schema(example = "product-images/5b0e4c0f6b1d4f9e8f7b1a2c3d4e5f60.png")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn new(model: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            sku: model.sku,
            description: model.description,
            category_id: model.category_id,
            category: category.map(CategoryResponse::from),
            price: model.price,
            stock: model.stock,
            image: model.image,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    /// Search term echoed back for the search box
    pub q: Option<String>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryResponse>,
}

/// Payload of the edit form: the product, when found, plus every category
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductFormView {
    pub product: Option<ProductResponse>,
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductDetailResponse {
    pub product: Option<ProductResponse>,
}
