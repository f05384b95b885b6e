//! Cart store.
//!
//! Every mutation runs in one transaction that changes the lines, re-derives
//! the cart totals from them and writes those totals back. The recomputed
//! cart is what each mutation returns, so there is no path that changes a
//! line without also refreshing the aggregates.
//!
//! Re-pricing rule: a line is priced from the product's current price
//! whenever its quantity changes. Lines that are not touched keep their
//! snapshot.

use async_trait::async_trait;
use chrono::Utc;
use mockall::automock;
use shop_core::{Cart, CartItem, LinePrice, ShippingSelection, TaxRate};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    carts::{
        errors::CartError,
        repositories::{SqliteCartItemsRepository, SqliteCartsRepository},
    },
    catalog::repository::SqliteProductsRepository,
    database::Db,
};

#[derive(Debug, Clone)]
pub struct SqliteCartStore {
    db: Db,
    tax_rate: TaxRate,
    carts_repository: SqliteCartsRepository,
    items_repository: SqliteCartItemsRepository,
    products_repository: SqliteProductsRepository,
}

impl SqliteCartStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self::with_tax_rate(db, TaxRate::DEFAULT)
    }

    /// A store that prices new and changed lines at `tax_rate`.
    #[must_use]
    pub fn with_tax_rate(db: Db, tax_rate: TaxRate) -> Self {
        Self {
            db,
            tax_rate,
            carts_repository: SqliteCartsRepository::new(),
            items_repository: SqliteCartItemsRepository::new(),
            products_repository: SqliteProductsRepository::new(),
        }
    }

    #[must_use]
    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Take the write lock on an existing cart.
    async fn lock_cart(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<(), CartError> {
        if self.carts_repository.touch(tx, cart_id).await? == 0 {
            return Err(CartError::CartNotFound);
        }

        Ok(())
    }

    async fn load(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts_repository
            .find_cart(tx, cart_id)
            .await?
            .ok_or(CartError::CartNotFound)?;

        cart.items = self.items_repository.get_cart_items(tx, cart_id).await?;

        Ok(cart)
    }

    /// Recompute the totals from the current lines and persist them.
    async fn finish(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<Cart, CartError> {
        let mut cart = self.load(tx, cart_id).await?;

        let totals = cart.recompute();
        self.carts_repository
            .save_totals(tx, cart_id, &totals)
            .await?;
        cart.apply_totals(totals);

        debug!(
            "Cart recomputed: id={}, lines={}, grand_total={}",
            cart.id,
            cart.items.len(),
            cart.grand_total
        );

        Ok(cart)
    }

    /// Price `quantity` units of a product, refusing more than is in stock.
    async fn quote_line(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        quantity: u32,
    ) -> Result<(String, LinePrice), CartError> {
        let product = self
            .products_repository
            .find_product(tx, product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        if !product.has_stock_for(quantity) {
            return Err(CartError::InsufficientStock {
                product_id: product.id,
                requested: quantity,
                available: product.stock,
            });
        }

        let price = LinePrice::quote(product.price, quantity, self.tax_rate);

        Ok((product.name, price))
    }
}

fn positive_quantity(qty: i64) -> Result<u32, CartError> {
    if qty <= 0 {
        return Err(CartError::InvalidQuantity);
    }

    u32::try_from(qty).map_err(|_| CartError::InvalidQuantity)
}

#[async_trait]
impl CartStore for SqliteCartStore {
    async fn get_or_create(&self, cart_id: &str) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        self.carts_repository
            .create_or_touch(&mut tx, cart_id, self.tax_rate.as_percent())
            .await?;
        let cart = self.load(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    async fn get(&self, cart_id: &str) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        let cart = self.load(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn add_item(&self, cart_id: &str, product_id: &str, qty: i64) -> Result<Cart, CartError> {
        let qty = positive_quantity(qty)?;

        let mut tx = self.db.begin().await?;

        self.carts_repository
            .create_or_touch(&mut tx, cart_id, self.tax_rate.as_percent())
            .await?;

        let existing = self
            .items_repository
            .find_by_product(&mut tx, cart_id, product_id)
            .await?;

        let quantity = existing
            .as_ref()
            .map_or(0, CartItem::quantity)
            .checked_add(qty)
            .ok_or(CartError::InvalidQuantity)?;

        let (product_name, price) = self.quote_line(&mut tx, product_id, quantity).await?;

        match existing {
            Some(item) => {
                self.items_repository
                    .reprice_cart_item(&mut tx, &item.id, &product_name, &price)
                    .await?;
            }
            None => {
                let now = Utc::now();
                let item = CartItem {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart_id.to_string(),
                    product_id: product_id.to_string(),
                    product_name,
                    price,
                    created_at: now,
                    updated_at: now,
                };
                self.items_repository
                    .create_cart_item(&mut tx, &item)
                    .await?;
            }
        }

        let cart = self.finish(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn update_qty(&self, cart_id: &str, item_id: &str, qty: i64) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        self.lock_cart(&mut tx, cart_id).await?;

        if qty <= 0 {
            let removed = self
                .items_repository
                .delete_cart_item(&mut tx, cart_id, item_id)
                .await?;
            if removed == 0 {
                return Err(CartError::CartItemNotFound);
            }
        } else {
            let item = self
                .items_repository
                .find_cart_item(&mut tx, cart_id, item_id)
                .await?
                .ok_or(CartError::CartItemNotFound)?;

            let quantity = positive_quantity(qty)?;
            let (product_name, price) = self
                .quote_line(&mut tx, &item.product_id, quantity)
                .await?;

            self.items_repository
                .reprice_cart_item(&mut tx, &item.id, &product_name, &price)
                .await?;
        }

        let cart = self.finish(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, cart_id: &str, item_id: &str) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        self.lock_cart(&mut tx, cart_id).await?;

        let removed = self
            .items_repository
            .delete_cart_item(&mut tx, cart_id, item_id)
            .await?;
        if removed == 0 {
            return Err(CartError::CartItemNotFound);
        }

        let cart = self.finish(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn clear(&self, cart_id: &str) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        self.lock_cart(&mut tx, cart_id).await?;

        self.items_repository
            .delete_cart_items(&mut tx, cart_id)
            .await?;
        self.carts_repository
            .set_shipping(&mut tx, cart_id, None)
            .await?;

        let cart = self.finish(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn delete(&self, cart_id: &str) -> Result<(), CartError> {
        let mut tx = self.db.begin().await?;

        if self.carts_repository.delete_cart(&mut tx, cart_id).await? == 0 {
            return Err(CartError::CartNotFound);
        }

        tx.commit().await?;

        debug!("Cart deleted: id={}", cart_id);

        Ok(())
    }

    #[instrument(skip(self, selection), fields(courier = %selection.courier))]
    async fn set_shipping(
        &self,
        cart_id: &str,
        selection: ShippingSelection,
    ) -> Result<Cart, CartError> {
        let mut tx = self.db.begin().await?;

        self.lock_cart(&mut tx, cart_id).await?;

        self.carts_repository
            .set_shipping(&mut tx, cart_id, Some(&selection))
            .await?;

        let cart = self.finish(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(cart)
    }
}

#[automock]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the cart, creating an empty one on first use.
    async fn get_or_create(&self, cart_id: &str) -> Result<Cart, CartError>;

    /// Retrieve an existing cart.
    async fn get(&self, cart_id: &str) -> Result<Cart, CartError>;

    /// Adds `qty` units of a product, merging with an existing line.
    async fn add_item(&self, cart_id: &str, product_id: &str, qty: i64) -> Result<Cart, CartError>;

    /// Sets a line's quantity; zero or less removes the line.
    async fn update_qty(&self, cart_id: &str, item_id: &str, qty: i64) -> Result<Cart, CartError>;

    /// Removes a line.
    async fn remove_item(&self, cart_id: &str, item_id: &str) -> Result<Cart, CartError>;

    /// Removes every line and the shipping selection.
    async fn clear(&self, cart_id: &str) -> Result<Cart, CartError>;

    /// Destroys the cart and its lines.
    async fn delete(&self, cart_id: &str) -> Result<(), CartError>;

    /// Stores the shipping option and its cost.
    async fn set_shipping(
        &self,
        cart_id: &str,
        selection: ShippingSelection,
    ) -> Result<Cart, CartError>;
}
