use super::image_list;
use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};

/// Product aggregate as stored in the `products` table.
///
/// Serialized with the field names the catalog API has always exposed, so
/// cache snapshots and API payloads share one representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(rename = "user_id")]
    pub owner_id: i64,
    #[serde(rename = "product_name")]
    pub name: String,
    #[serde(rename = "product_description", default)]
    pub description: String,
    #[serde(rename = "product_price")]
    pub price: f64,
    #[serde(rename = "product_images", default)]
    pub source_images: Vec<String>,
    #[serde(rename = "compressed_images", default)]
    pub derived_images: Vec<String>,
}

/// New Product for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(rename = "user_id")]
    pub owner_id: i64,
    #[serde(rename = "product_name")]
    pub name: String,
    #[serde(rename = "product_description", default)]
    pub description: String,
    #[serde(rename = "product_price")]
    pub price: f64,
    #[serde(rename = "product_images", default)]
    pub source_images: Vec<String>,
}

/// Full replacement of a product's mutable fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(rename = "product_name")]
    pub name: String,
    #[serde(rename = "product_description", default)]
    pub description: String,
    #[serde(rename = "product_price")]
    pub price: f64,
    #[serde(rename = "product_images", default)]
    pub source_images: Vec<String>,
    #[serde(rename = "compressed_images", default)]
    pub derived_images: Vec<String>,
}

impl Product {
    /// Cache key holding this product's snapshot
    pub fn cache_key(id: i64) -> String {
        format!("product_{id}")
    }

    /// Build a freshly inserted product from its creation payload
    pub fn from_new(id: i64, new_product: NewProduct) -> Self {
        Self {
            id,
            owner_id: new_product.owner_id,
            name: new_product.name,
            description: new_product.description,
            price: new_product.price,
            source_images: new_product.source_images,
            derived_images: Vec::new(),
        }
    }

    /// Apply a full update, keeping identity and ownership
    pub fn with_update(&self, update: ProductUpdate) -> Self {
        Self {
            id: self.id,
            owner_id: self.owner_id,
            name: update.name,
            description: update.description,
            price: update.price,
            source_images: update.source_images,
            derived_images: update.derived_images,
        }
    }
}

fn validate_common(name: &str, price: f64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CatalogError::validation("product name must not be empty"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(CatalogError::validation(format!(
            "product price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.name, self.price)?;
        image_list::validate_references(&self.source_images)
    }
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.name, self.price)?;
        image_list::validate_references(&self.source_images)?;
        image_list::validate_references(&self.derived_images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp() -> NewProduct {
        NewProduct {
            owner_id: 7,
            name: "Lamp".to_string(),
            description: "Desk lamp".to_string(),
            price: 19.99,
            source_images: vec!["http://a/1.png".to_string(), "http://a/2.png".to_string()],
        }
    }

    #[test]
    fn test_wire_field_names() {
        let product = Product::from_new(1, lamp());
        let json = serde_json::to_value(&product).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["product_name"], "Lamp");
        assert_eq!(json["product_price"], 19.99);
        assert_eq!(json["product_images"].as_array().unwrap().len(), 2);
        assert!(json["compressed_images"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_image_lists_default_to_empty() {
        let product: Product = serde_json::from_str(
            r#"{"id":3,"user_id":1,"product_name":"Mug","product_price":4.5}"#,
        )
        .unwrap();
        assert!(product.source_images.is_empty());
        assert!(product.derived_images.is_empty());
        assert_eq!(product.description, "");
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut new_product = lamp();
        new_product.price = -0.01;
        assert!(matches!(
            new_product.validate(),
            Err(CatalogError::ValidationError(_))
        ));
    }

    #[test]
    fn test_with_update_keeps_identity() {
        let product = Product::from_new(9, lamp());
        let updated = product.with_update(ProductUpdate {
            name: "Floor Lamp".to_string(),
            description: String::new(),
            price: 49.0,
            source_images: vec!["http://a/3.png".to_string()],
            derived_images: Vec::new(),
        });

        assert_eq!(updated.id, 9);
        assert_eq!(updated.owner_id, 7);
        assert_eq!(updated.name, "Floor Lamp");
        assert_eq!(updated.source_images, vec!["http://a/3.png".to_string()]);
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(Product::cache_key(12), "product_12");
    }
}
