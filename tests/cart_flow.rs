use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use storefront_api::{
    dto::cart::AddToCartRequest,
    dto::products::UpdateProductRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{Product, User},
    routes::params::Pagination,
    services::{cart_service, product_service},
    state::AppState,
    store::Store,
    store::snapshot::MemorySink,
};

fn test_state() -> AppState {
    AppState::new(Arc::new(Store::new()), Arc::new(MemorySink::default()))
}

fn seed_user(state: &AppState, email: &str, role: &str) -> AuthUser {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "dummy".to_string(),
        role: role.to_string(),
        created_at: Utc::now(),
    };
    let auth = AuthUser {
        user_id: user.id,
        role: role.to_string(),
    };
    state.store.insert_user(user);
    auth
}

fn seed_product(state: &AppState, name: &str, price: i64, stock: i32) -> Uuid {
    let product = Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: Some("A product for testing".to_string()),
        price,
        category: "Testing".to_string(),
        stock,
        created_at: Utc::now(),
    };
    let id = product.id;
    state.store.insert_product(product).expect("seed product");
    id
}

#[tokio::test]
async fn empty_cart_is_synthesized() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");

    let resp = cart_service::get_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await?;
    let cart = resp.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);
    Ok(())
}

#[tokio::test]
async fn add_reserves_stock_and_keeps_total_consistent() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Widget", 1000, 5);

    let resp = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;
    let cart = resp.data.expect("cart");

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.total_amount, 3000);
    assert_eq!(state.store.product(product_id)?.stock, 2);

    // Adding the same product again merges the line instead of duplicating it.
    let resp = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let cart = resp.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(cart.total_amount, 4000);
    assert_eq!(state.store.product(product_id)?.stock, 1);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_leaves_everything_untouched() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Widget", 1000, 1);

    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await
    .expect_err("reservation should fail");
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(state.store.product(product_id)?.stock, 1);
    let cart = state.store.cart_view(user.user_id);
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);
    Ok(())
}

#[tokio::test]
async fn remove_releases_the_reservation() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Widget", 1000, 5);

    let resp = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;
    let item_id = resp.data.expect("cart").items[0].id;
    assert_eq!(state.store.product(product_id)?.stock, 2);

    let resp = cart_service::remove_from_cart(&state, &user, item_id).await?;
    let cart = resp.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);

    // Conservation: the matching remove returns stock to its initial level.
    assert_eq!(state.store.product(product_id)?.stock, 5);

    let err = cart_service::remove_from_cart(&state, &user, item_id)
        .await
        .expect_err("item is gone");
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn invalid_quantity_is_rejected() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Widget", 1000, 5);

    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 0,
        },
    )
    .await
    .expect_err("zero quantity");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(state.store.product(product_id)?.stock, 5);
    Ok(())
}

#[tokio::test]
async fn cart_price_is_a_snapshot() -> anyhow::Result<()> {
    let state = test_state();
    let admin = seed_user(&state, "admin@example.com", "admin");
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Widget", 1000, 5);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    // A later catalog price change must not reprice lines already in carts.
    product_service::update_product(
        &state,
        &admin,
        product_id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(9999),
            category: None,
        },
    )
    .await?;

    let cart = state.store.cart_view(user.user_id);
    assert_eq!(cart.items[0].price, 1000);
    assert_eq!(cart.total_amount, 2000);
    Ok(())
}
