use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::Product;

use super::{Store, lock, read, write};

/// Catalog side of the store. The `stock` field of each product is the
/// reservation ledger; every mutation goes through `reserve_stock`,
/// `release_stock` or `adjust_stock`, each a single check-and-write inside
/// the product's own mutex.
impl Store {
    fn product_handle(&self, id: Uuid) -> Option<Arc<Mutex<Product>>> {
        read(&self.products).get(&id).cloned()
    }

    pub fn product(&self, id: Uuid) -> Result<Product, AppError> {
        self.product_handle(id)
            .map(|handle| lock(&handle).clone())
            .ok_or(AppError::NotFound)
    }

    pub fn product_exists(&self, id: Uuid) -> bool {
        read(&self.products).contains_key(&id)
    }

    pub fn products(&self) -> Vec<Product> {
        read(&self.products)
            .values()
            .map(|handle| lock(handle).clone())
            .collect()
    }

    pub fn insert_product(&self, product: Product) -> Result<(), AppError> {
        let mut products = write(&self.products);
        let duplicate = products
            .values()
            .any(|handle| lock(handle).name == product.name);
        if duplicate {
            return Err(AppError::Validation("Product already exists".into()));
        }
        products.insert(product.id, Arc::new(Mutex::new(product)));
        Ok(())
    }

    /// Field updates only; `stock` is off limits here and changes solely
    /// through the reservation ledger operations below.
    pub fn update_product<F>(&self, id: Uuid, apply: F) -> Result<Product, AppError>
    where
        F: FnOnce(&mut Product),
    {
        let handle = self.product_handle(id).ok_or(AppError::NotFound)?;
        let mut product = lock(&handle);
        let stock = product.stock;
        apply(&mut product);
        product.stock = stock;
        Ok(product.clone())
    }

    pub fn remove_product(&self, id: Uuid) -> Result<(), AppError> {
        write(&self.products)
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound)
    }

    /// Atomic check-then-decrement. Either the full quantity is reserved or
    /// stock is left untouched; concurrent callers on the same product are
    /// serialized by its mutex. Returns the product as it stood after the
    /// reservation, which is where cart lines take their price snapshot.
    pub fn reserve_stock(&self, id: Uuid, quantity: i32) -> Result<Product, AppError> {
        let handle = self.product_handle(id).ok_or(AppError::NotFound)?;
        let mut product = lock(&handle);

        if product.stock < quantity {
            return Err(AppError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.clone())
    }

    /// Undo a reservation. Uncapped: nothing records an original maximum. A
    /// product deleted while reserved quantities were in carts has no ledger
    /// to return to, and the release is dropped.
    pub fn release_stock(&self, id: Uuid, quantity: i32) {
        if let Some(handle) = self.product_handle(id) {
            lock(&handle).stock += quantity;
        }
    }

    /// Signed adjustment for the admin surface. `stock >= 0` always holds.
    pub fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<Product, AppError> {
        let handle = self.product_handle(id).ok_or(AppError::NotFound)?;
        let mut product = lock(&handle);

        let new_stock = product.stock + delta;
        if new_stock < 0 {
            return Err(AppError::Validation("stock cannot be negative".into()));
        }
        product.stock = new_stock;
        Ok(product.clone())
    }
}
