use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Cart, CartItem, Category, Order, OrderItem, OrderStatus, Product, Review, User};

pub mod catalog;
pub mod snapshot;

use snapshot::Snapshot;

/// In-memory entity store. Products and carts sit behind their own mutex so
/// stock reservation and cart mutation are serialized per entity; the outer
/// maps only guard membership. Guards are held across the bounded in-memory
/// mutation and never across the durable-sink write.
pub struct Store {
    products: RwLock<HashMap<Uuid, Arc<Mutex<Product>>>>,
    carts: RwLock<HashMap<Uuid, Arc<Mutex<Cart>>>>,
    users: RwLock<HashMap<Uuid, User>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    categories: RwLock<Vec<Category>>,
    reviews: RwLock<Vec<Review>>,
    order_seq: AtomicI64,
    /// `(user, request_id)` pairs already fulfilled, for retriable checkout.
    fulfilled: Mutex<HashMap<(Uuid, String), Uuid>>,
    degraded: AtomicBool,
}

/// Lock helpers that survive a poisoned guard; a writer panicking mid-request
/// must not wedge every later request on the same entity.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Store {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let next_number = snapshot
            .orders
            .iter()
            .map(|order| order.number)
            .max()
            .unwrap_or(0)
            + 1;

        Self {
            products: RwLock::new(
                snapshot
                    .products
                    .into_iter()
                    .map(|p| (p.id, Arc::new(Mutex::new(p))))
                    .collect(),
            ),
            carts: RwLock::new(
                snapshot
                    .carts
                    .into_iter()
                    .map(|c| (c.user_id, Arc::new(Mutex::new(c))))
                    .collect(),
            ),
            users: RwLock::new(snapshot.users.into_iter().map(|u| (u.id, u)).collect()),
            orders: RwLock::new(snapshot.orders.into_iter().map(|o| (o.id, o)).collect()),
            categories: RwLock::new(snapshot.categories),
            reviews: RwLock::new(snapshot.reviews),
            order_seq: AtomicI64::new(next_number),
            fulfilled: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Full self-consistent state for the durable sink. Collections are
    /// ordered so successive snapshots of the same state are identical.
    pub fn snapshot(&self) -> Snapshot {
        let mut products: Vec<Product> = read(&self.products)
            .values()
            .map(|handle| lock(handle).clone())
            .collect();
        products.sort_by_key(|p| (p.created_at, p.id));

        let mut carts: Vec<Cart> = read(&self.carts)
            .values()
            .map(|handle| lock(handle).clone())
            .collect();
        carts.sort_by_key(|c| (c.created_at, c.user_id));

        let mut users: Vec<User> = read(&self.users).values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));

        let mut orders: Vec<Order> = read(&self.orders).values().cloned().collect();
        orders.sort_by_key(|o| o.number);

        Snapshot {
            users,
            products,
            categories: read(&self.categories).clone(),
            reviews: read(&self.reviews).clone(),
            carts,
            orders,
        }
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    // ---- users ----

    pub fn insert_user(&self, user: User) {
        write(&self.users).insert(user.id, user);
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        read(&self.users).get(&id).cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        read(&self.users)
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    // ---- carts ----

    fn cart_handle(&self, user_id: Uuid) -> Option<Arc<Mutex<Cart>>> {
        read(&self.carts).get(&user_id).cloned()
    }

    /// Carts are created lazily on first add and never deleted, only emptied.
    fn cart_handle_or_create(&self, user_id: Uuid) -> Arc<Mutex<Cart>> {
        if let Some(handle) = self.cart_handle(user_id) {
            return handle;
        }
        write(&self.carts)
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Cart::new(user_id))))
            .clone()
    }

    /// Never fails: a user without a cart gets a synthetic empty one.
    pub fn cart_view(&self, user_id: Uuid) -> Cart {
        match self.cart_handle(user_id) {
            Some(handle) => lock(&handle).clone(),
            None => Cart::new(user_id),
        }
    }

    /// Reserve stock and merge the line into the user's cart as one unit.
    /// The cart lock is taken first, so no failure path leaves a reservation
    /// without a matching cart line or vice versa.
    pub fn add_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, AppError> {
        if self.user(user_id).is_none() {
            return Err(AppError::NotFound);
        }

        let handle = self.cart_handle_or_create(user_id);
        let mut cart = lock(&handle);

        let reserved = self.reserve_stock(product_id, quantity)?;

        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => cart.items.push(CartItem {
                id: Uuid::new_v4(),
                product_id,
                quantity,
                price: reserved.price,
            }),
        }
        cart.recompute_total();
        Ok(cart.clone())
    }

    /// The only path that returns reserved stock before order placement.
    pub fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<Cart, AppError> {
        let handle = self.cart_handle(user_id).ok_or(AppError::NotFound)?;
        let mut cart = lock(&handle);

        let position = cart
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or(AppError::NotFound)?;
        let item = cart.items.remove(position);

        self.release_stock(item.product_id, item.quantity);
        cart.recompute_total();
        Ok(cart.clone())
    }

    // ---- orders ----

    /// Convert the user's cart into a pending order. Holds the cart lock for
    /// the whole sequence so a concurrent item removal cannot interleave:
    /// dedup check, empty check, line re-validation, order creation and cart
    /// clearing all see the same cart state. Stock is untouched here; it was
    /// reserved when each line entered the cart.
    pub fn place_order(
        &self,
        user_id: Uuid,
        request_id: Option<&str>,
    ) -> Result<Order, AppError> {
        let handle = self.cart_handle(user_id).ok_or(AppError::EmptyCart)?;
        let mut cart = lock(&handle);

        // A retried request returns the order it already produced, even
        // though the cart has been cleared since.
        if let Some(rid) = request_id {
            let fulfilled = lock(&self.fulfilled);
            if let Some(order_id) = fulfilled.get(&(user_id, rid.to_string())) {
                if let Some(order) = read(&self.orders).get(order_id) {
                    return Ok(order.clone());
                }
            }
        }

        if cart.items.is_empty() {
            return Err(AppError::EmptyCart);
        }

        // Reject lines whose product vanished from the catalog since they
        // were added. No stock check: quantities are already reserved.
        {
            let products = read(&self.products);
            for item in &cart.items {
                if !products.contains_key(&item.product_id) {
                    return Err(AppError::NotFound);
                }
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            number: self.order_seq.fetch_add(1, Ordering::SeqCst),
            user_id,
            items: cart
                .items
                .iter()
                .map(|i| OrderItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
            total_price: cart.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        write(&self.orders).insert(order.id, order.clone());
        if let Some(rid) = request_id {
            lock(&self.fulfilled).insert((user_id, rid.to_string()), order.id);
        }

        // Clearing the cart is what prevents the same reservation from being
        // ordered twice.
        cart.items.clear();
        cart.total_amount = 0;

        Ok(order)
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        read(&self.orders).get(&id).cloned()
    }

    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        read(&self.orders)
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn all_orders(&self) -> Vec<Order> {
        read(&self.orders).values().cloned().collect()
    }

    /// Advance an order along the lifecycle chain. Only the unique successor
    /// of the current status is legal; `confirmed` has no stock side effect.
    pub fn transition_order(&self, id: Uuid, target: OrderStatus) -> Result<Order, AppError> {
        let mut orders = write(&self.orders);
        let order = orders.get_mut(&id).ok_or(AppError::NotFound)?;

        if order.status.successor() != Some(target) {
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }

        order.status = target;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    // ---- categories ----

    pub fn categories(&self) -> Vec<Category> {
        read(&self.categories).clone()
    }

    pub fn category(&self, id: Uuid) -> Option<Category> {
        read(&self.categories).iter().find(|c| c.id == id).cloned()
    }

    pub fn insert_category(&self, category: Category) -> Result<(), AppError> {
        let mut categories = write(&self.categories);
        if categories.iter().any(|c| c.name == category.name) {
            return Err(AppError::Validation("Category already exists".into()));
        }
        categories.push(category);
        Ok(())
    }

    // ---- reviews ----

    pub fn reviews(&self) -> Vec<Review> {
        read(&self.reviews).clone()
    }

    pub fn review(&self, id: Uuid) -> Option<Review> {
        read(&self.reviews).iter().find(|r| r.id == id).cloned()
    }

    pub fn reviews_for_product(&self, product_id: Uuid) -> Vec<Review> {
        read(&self.reviews)
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect()
    }

    pub fn insert_review(&self, review: Review) -> Result<(), AppError> {
        let mut reviews = write(&self.reviews);
        if reviews
            .iter()
            .any(|r| r.user_id == review.user_id && r.product_id == review.product_id)
        {
            return Err(AppError::Validation(
                "Product already reviewed by this user".into(),
            ));
        }
        reviews.push(review);
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
