use super::ProductRepository;
use crate::database::DatabaseConnection;
use crate::error::{CatalogError, Result};
use crate::models::{image_list, NewProduct, Product};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

const SELECT_COLUMNS: &str = "id, user_id, product_name, product_description, product_images, \
     product_price, compressed_product_images";

/// Raw `products` row; image lists are still delimited strings here
#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    user_id: i64,
    product_name: String,
    product_description: Option<String>,
    product_images: Option<String>,
    product_price: f64,
    compressed_product_images: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            owner_id: row.user_id,
            name: row.product_name,
            description: row.product_description.unwrap_or_default(),
            price: row.product_price,
            source_images: image_list::decode(row.product_images.as_deref()),
            derived_images: image_list::decode(row.compressed_product_images.as_deref()),
        }
    }
}

/// PostgreSQL-backed product repository
#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgProductRepository {
    pub fn new(database: &DatabaseConnection, statement_timeout: Duration) -> Self {
        Self {
            pool: database.pool().clone(),
            statement_timeout,
        }
    }

    /// Run a statement under the configured deadline; a timeout is retryable
    async fn bounded<T, F>(&self, operation: &'static str, statement: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.statement_timeout, statement).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation = operation, error = %e, "Repository statement failed");
                Err(e.into())
            }
            Err(_) => {
                error!(
                    operation = operation,
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    "Repository statement timed out"
                );
                Err(CatalogError::retryable_persistence(format!(
                    "{operation} timed out after {}ms",
                    self.statement_timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_by_id(&self, id: i64) -> Result<Product> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM products WHERE id = $1");
        let row = self
            .bounded(
                "select_product",
                sqlx::query_as::<_, ProductRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        let product: Product = row.ok_or(CatalogError::NotFound(id))?.into();
        debug!(product_id = id, "Fetched product");
        Ok(product)
    }

    async fn get_all(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM products ORDER BY id");
        let rows = self
            .bounded(
                "select_products",
                sqlx::query_as::<_, ProductRow>(&sql).fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn save(&self, new_product: &NewProduct) -> Result<i64> {
        let id = self
            .bounded(
                "insert_product",
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO products (user_id, product_name, product_description, product_images, product_price)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(new_product.owner_id)
                .bind(&new_product.name)
                .bind(&new_product.description)
                .bind(image_list::encode(&new_product.source_images))
                .bind(new_product.price)
                .fetch_one(&self.pool),
            )
            .await?;

        debug!(product_id = id, "Inserted product");
        Ok(id)
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let result = self
            .bounded(
                "update_product",
                sqlx::query(
                    r#"
                    UPDATE products
                    SET product_name = $1,
                        product_description = $2,
                        product_price = $3,
                        product_images = $4,
                        compressed_product_images = $5
                    WHERE id = $6
                    "#,
                )
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price)
                .bind(image_list::encode(&product.source_images))
                .bind(image_list::encode(&product.derived_images))
                .bind(product.id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(product.id));
        }
        Ok(())
    }

    async fn update_derived_images(&self, id: i64, derived_images: &[String]) -> Result<()> {
        let result = self
            .bounded(
                "update_derived_images",
                sqlx::query("UPDATE products SET compressed_product_images = $1 WHERE id = $2")
                    .bind(image_list::encode(derived_images))
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_with_null_image_lists_decodes_to_empty() {
        let product: Product = ProductRow {
            id: 4,
            user_id: 2,
            product_name: "Chair".to_string(),
            product_description: None,
            product_images: None,
            product_price: 25.0,
            compressed_product_images: None,
        }
        .into();

        assert_eq!(product.description, "");
        assert!(product.source_images.is_empty());
        assert!(product.derived_images.is_empty());
    }

    #[test]
    fn test_row_decodes_delimited_lists() {
        let product: Product = ProductRow {
            id: 5,
            user_id: 2,
            product_name: "Table".to_string(),
            product_description: Some("Oak".to_string()),
            product_images: Some("http://a/1.png§http://a/2.png".to_string()),
            product_price: 120.0,
            compressed_product_images: Some("compressed_5_0_1.jpg".to_string()),
        }
        .into();

        assert_eq!(
            product.source_images,
            vec!["http://a/1.png".to_string(), "http://a/2.png".to_string()]
        );
        assert_eq!(product.derived_images, vec!["compressed_5_0_1.jpg".to_string()]);
    }

    // Live PostgreSQL round-trips (DATABASE_URL, skipped when unreachable)
    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use crate::config::DatabaseConfig;
        use tracing::warn;

        async fn repository() -> Option<PgProductRepository> {
            let config = DatabaseConfig {
                url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url),
                ..DatabaseConfig::default()
            };
            let database = match DatabaseConnection::connect(&config).await {
                Ok(database) => database,
                Err(e) => {
                    warn!("Skipping PostgreSQL test (not available): {}", e);
                    return None;
                }
            };
            database.run_migrations().await.unwrap();
            Some(PgProductRepository::new(&database, config.statement_timeout()))
        }

        #[tokio::test]
        async fn test_save_get_update_round_trip() {
            let Some(repo) = repository().await else {
                return;
            };

            let new_product = NewProduct {
                owner_id: 1,
                name: "Lamp".to_string(),
                description: "round trip".to_string(),
                price: 19.99,
                source_images: vec!["http://a/x,y.png".to_string(), "http://a/2.png".to_string()],
            };
            let id = repo.save(&new_product).await.unwrap();

            let fetched = repo.get_by_id(id).await.unwrap();
            assert_eq!(fetched.source_images, new_product.source_images);
            assert!(fetched.derived_images.is_empty());

            repo.update_derived_images(id, &["compressed_a.jpg".to_string()])
                .await
                .unwrap();
            let fetched = repo.get_by_id(id).await.unwrap();
            assert_eq!(fetched.derived_images, vec!["compressed_a.jpg".to_string()]);
            assert_eq!(fetched.source_images, new_product.source_images);
        }

        #[tokio::test]
        async fn test_update_missing_row_is_not_found() {
            let Some(repo) = repository().await else {
                return;
            };
            let err = repo
                .update_derived_images(i64::MAX, &[])
                .await
                .unwrap_err();
            assert_eq!(err, CatalogError::NotFound(i64::MAX));
        }
    }
}
