//! Catalog service.

use async_trait::async_trait;
use mockall::automock;
use shop_core::{Product, ProductCatalog};
use tracing::info;

use crate::{
    catalog::{errors::CatalogError, repository::SqliteProductsRepository},
    database::Db,
};

#[derive(Debug, Clone)]
pub struct SqliteCatalogService {
    db: Db,
    repository: SqliteProductsRepository,
}

impl SqliteCatalogService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: SqliteProductsRepository::new(),
        }
    }
}

#[async_trait]
impl CatalogService for SqliteCatalogService {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let products = self.repository.list_products(&mut tx).await?;

        tx.commit().await?;

        Ok(products)
    }

    async fn get_product(&self, id: &str) -> Result<Product, CatalogError> {
        let mut tx = self.db.begin().await?;

        let product = self
            .repository
            .find_product(&mut tx, id)
            .await?
            .ok_or(CatalogError::NotFound)?;

        tx.commit().await?;

        Ok(product)
    }

    async fn seed(&self, catalog: &ProductCatalog) -> Result<u64, CatalogError> {
        let mut tx = self.db.begin().await?;

        let mut inserted = 0;
        for product in &catalog.products {
            inserted += self.repository.insert_if_absent(&mut tx, product).await?;
        }

        tx.commit().await?;

        info!(
            "Seeded catalog: {} of {} products inserted",
            inserted,
            catalog.products.len()
        );

        Ok(inserted)
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Retrieves all products.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// Retrieve a single product.
    async fn get_product(&self, id: &str) -> Result<Product, CatalogError>;

    /// Inserts every catalog product whose id is not yet stored.
    async fn seed(&self, catalog: &ProductCatalog) -> Result<u64, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    async fn service() -> SqliteCatalogService {
        let db = Db::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteCatalogService::new(db)
    }

    fn catalog(stock: u32) -> ProductCatalog {
        let mut catalog = ProductCatalog::new();
        catalog.add(Product::new("p-1", "Teh Melati", Decimal::from(10_000), stock));
        catalog.add(Product::new("p-2", "Kopi Bubuk", Decimal::new(2_550_050, 2), 3));
        catalog
    }

    #[tokio::test]
    async fn test_seed_then_get() -> TestResult {
        let service = service().await;

        assert_eq!(service.seed(&catalog(5)).await?, 2);

        let product = service.get_product("p-2").await?;
        assert_eq!(product.price, Decimal::new(2_550_050, 2));
        assert_eq!(product.slug, "kopi-bubuk");
        assert_eq!(service.list_products().await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_reseed_keeps_existing_stock() -> TestResult {
        let service = service().await;

        service.seed(&catalog(5)).await?;
        assert_eq!(service.seed(&catalog(99)).await?, 0);

        assert_eq!(service.get_product("p-1").await?.stock, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let service = service().await;

        let result = service.get_product("missing").await;

        assert!(matches!(result, Err(CatalogError::NotFound)));
    }
}
