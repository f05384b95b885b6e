//! Shared test fixtures

use rust_decimal::Decimal;
use shop_core::{Customer, Product, ProductCatalog, ShippingAddress, ShippingSelection};
use tempfile::{tempdir, TempDir};

use crate::{
    catalog::{CatalogService, SqliteCatalogService},
    database::Db,
};

/// A migrated private in-memory database
pub(crate) async fn migrated_db() -> Db {
    let db = Db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.migrate().await.expect("Failed to apply migrations");
    db
}

/// A migrated database file served by a pool of several connections, so
/// concurrent transactions contend on SQLite's real write lock. The file
/// lives as long as the returned directory.
pub(crate) async fn file_db() -> (Db, TempDir) {
    let dir = tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("shop.db").display());

    let db = Db::connect(&url)
        .await
        .expect("Failed to open database file");
    db.migrate().await.expect("Failed to apply migrations");

    (db, dir)
}

/// A migrated in-memory database holding `(id, price, stock)` products
pub(crate) async fn db_with_products(products: &[(&str, i64, u32)]) -> Db {
    let db = migrated_db().await;
    seed(&db, products).await;
    db
}

/// [`file_db`] holding `(id, price, stock)` products
pub(crate) async fn file_db_with_products(products: &[(&str, i64, u32)]) -> (Db, TempDir) {
    let (db, dir) = file_db().await;
    seed(&db, products).await;
    (db, dir)
}

async fn seed(db: &Db, products: &[(&str, i64, u32)]) {
    let mut catalog = ProductCatalog::new();
    for (id, price, stock) in products {
        catalog.add(Product::new(*id, format!("Product {id}"), Decimal::from(*price), *stock));
    }
    SqliteCatalogService::new(db.clone())
        .seed(&catalog)
        .await
        .expect("Failed to seed products");
}

pub(crate) fn customer(id: &str) -> Customer {
    Customer {
        id: id.to_string(),
        first_name: "Dewi".to_string(),
        last_name: "Lestari".to_string(),
        email: format!("{id}@example.com"),
    }
}

pub(crate) fn address() -> ShippingAddress {
    ShippingAddress {
        first_name: "Dewi".to_string(),
        last_name: "Lestari".to_string(),
        address1: "Jl. Melati No. 7".to_string(),
        address2: String::new(),
        city: "Bandung".to_string(),
        province: "Jawa Barat".to_string(),
        phone: "081200000000".to_string(),
        email: "dewi@example.com".to_string(),
        post_code: "40115".to_string(),
    }
}

pub(crate) fn jne_bandung() -> ShippingSelection {
    ShippingSelection {
        courier: "JNE".to_string(),
        service: "REG".to_string(),
        province: "Jawa Barat".to_string(),
        city: "Bandung".to_string(),
        cost: Decimal::from(18_000),
    }
}
