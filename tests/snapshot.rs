use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use storefront_api::{
    dto::cart::AddToCartRequest,
    middleware::auth::AuthUser,
    models::{Product, User},
    services::cart_service,
    state::AppState,
    store::Store,
    store::snapshot::{JsonSnapshotFile, MemorySink, Snapshot, SnapshotSink},
};

fn seed_user(store: &Store, email: &str) -> AuthUser {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "dummy".to_string(),
        role: "customer".to_string(),
        created_at: Utc::now(),
    };
    let auth = AuthUser {
        user_id: user.id,
        role: "customer".to_string(),
    };
    store.insert_user(user);
    auth
}

fn seed_product(store: &Store, name: &str, price: i64, stock: i32) -> Uuid {
    let product = Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        price,
        category: "Testing".to_string(),
        stock,
        created_at: Utc::now(),
    };
    let id = product.id;
    store.insert_product(product).expect("seed product");
    id
}

#[tokio::test]
async fn json_file_round_trips_the_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.json");
    let sink = JsonSnapshotFile::new(&path);

    // A missing file loads as an empty snapshot.
    let loaded = sink.load().await?;
    assert!(loaded.users.is_empty());

    let store = Store::new();
    let user = seed_user(&store, "user@example.com");
    let product_id = seed_product(&store, "Widget", 1000, 5);
    store.add_cart_item(user.user_id, product_id, 2)?;

    sink.save(&store.snapshot()).await?;

    let restored = Store::from_snapshot(sink.load().await?);
    assert_eq!(restored.product(product_id)?.stock, 3);
    let cart = restored.cart_view(user.user_id);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_amount, 2000);
    assert!(restored.user(user.user_id).is_some());
    Ok(())
}

#[tokio::test]
async fn restored_store_continues_the_order_sequence() -> anyhow::Result<()> {
    let store = Store::new();
    let user = seed_user(&store, "user@example.com");
    let product_id = seed_product(&store, "Widget", 1000, 10);

    store.add_cart_item(user.user_id, product_id, 1)?;
    let first = store.place_order(user.user_id, None)?;
    assert_eq!(first.number, 1);

    let restored = Store::from_snapshot(store.snapshot());
    restored.add_cart_item(user.user_id, product_id, 1)?;
    let second = restored.place_order(user.user_id, None)?;
    assert_eq!(second.number, 2);
    Ok(())
}

#[tokio::test]
async fn every_mutation_emits_a_full_snapshot() -> anyhow::Result<()> {
    let sink = Arc::new(MemorySink::default());
    let store = Arc::new(Store::new());
    let user = seed_user(&store, "user@example.com");
    let product_id = seed_product(&store, "Widget", 1000, 5);
    let state = AppState::new(store, sink.clone());

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    // The emitted snapshot holds the cart and the product in the same state
    // the request left them in.
    let snapshot = sink.last().expect("snapshot written");
    assert_eq!(snapshot.products[0].stock, 3);
    assert_eq!(snapshot.carts[0].total_amount, 2000);
    assert_eq!(snapshot.users.len(), 1);
    Ok(())
}

struct FailingSink;

#[async_trait]
impl SnapshotSink for FailingSink {
    async fn load(&self) -> Result<Snapshot> {
        Ok(Snapshot::default())
    }

    async fn save(&self, _snapshot: &Snapshot) -> Result<()> {
        Err(anyhow::anyhow!("disk on fire"))
    }
}

#[tokio::test]
async fn sink_failure_degrades_but_does_not_unwind() -> anyhow::Result<()> {
    let store = Arc::new(Store::new());
    let user = seed_user(&store, "user@example.com");
    let product_id = seed_product(&store, "Widget", 1000, 5);
    let state = AppState::new(store, Arc::new(FailingSink));

    let resp = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    // The customer-visible reservation stands even though the write failed.
    assert_eq!(resp.data.expect("cart").total_amount, 2000);
    assert_eq!(state.store.product(product_id)?.stock, 3);
    assert!(state.store.is_degraded());
    Ok(())
}
