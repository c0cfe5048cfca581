use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use storefront_api::{
    dto::cart::AddToCartRequest,
    dto::orders::CheckoutRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Product, User},
    routes::admin::{LowStockQuery, UpdateOrderStatusRequest},
    routes::params::Pagination,
    services::{admin_service, cart_service, order_service},
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

// Integration flow: user adds to cart -> checkout -> admin walks the order
// through the lifecycle and sees low stock. Stock moves exactly once, at
// add-to-cart time.
#[tokio::test]
async fn checkout_and_admin_lifecycle_flow() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let admin = seed_user(&state, "admin@example.com", "admin");
    let product_id = seed_product(&state, "Test Widget", 1000, 10);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;
    assert_eq!(state.store.product(product_id)?.stock, 8);

    let checkout_resp =
        order_service::checkout(&state, &user, CheckoutRequest { request_id: None }).await?;
    let order = checkout_resp.data.expect("order");
    assert_eq!(order.total_price, 2000);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);

    // Placement itself does not touch stock, and it empties the cart.
    assert_eq!(state.store.product(product_id)?.stock, 8);
    assert!(state.store.cart_view(user.user_id).items.is_empty());
    assert_eq!(state.store.cart_view(user.user_id).total_amount, 0);

    // Confirmation commits the order without a second deduction.
    let updated = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await?;
    assert_eq!(updated.data.expect("order").status, OrderStatus::Confirmed);
    assert_eq!(state.store.product(product_id)?.stock, 8);

    for status in ["shipped", "delivered"] {
        admin_service::update_order_status(
            &state,
            &admin,
            order.id,
            UpdateOrderStatusRequest {
                status: status.into(),
            },
        )
        .await?;
    }
    assert_eq!(
        state.store.order(order.id).expect("order").status,
        OrderStatus::Delivered
    );

    // Delivered is terminal.
    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
        },
    )
    .await
    .expect_err("no transition out of delivered");
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            pagination: Pagination {
                page: Some(1),
                per_page: Some(20),
            },
            threshold: Some(10),
        },
    )
    .await?;
    assert!(
        low.data.expect("products").items.iter().any(|p| p.id == product_id),
        "expected product to appear in low-stock list"
    );

    Ok(())
}

#[tokio::test]
async fn lifecycle_cannot_skip_or_regress() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let admin = seed_user(&state, "admin@example.com", "admin");
    let product_id = seed_product(&state, "Test Widget", 1000, 5);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::checkout(&state, &user, CheckoutRequest::default())
        .await?
        .data
        .expect("order");

    // The only legal successor of pending is confirmed.
    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await
    .expect_err("skipping a state");
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        }
    ));

    admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await?;

    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "pending".into(),
        },
    )
    .await
    .expect_err("regressing");
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "refunded".into(),
        },
    )
    .await
    .expect_err("unknown status");
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn transitions_require_admin_role() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Test Widget", 1000, 5);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::checkout(&state, &user, CheckoutRequest::default())
        .await?
        .data
        .expect("order");

    let err = admin_service::update_order_status(
        &state,
        &user,
        order.id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await
    .expect_err("customer may not transition orders");
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(
        state.store.order(order.id).expect("order").status,
        OrderStatus::Pending
    );
    Ok(())
}

#[tokio::test]
async fn checkout_of_empty_cart_fails() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");

    let err = order_service::checkout(&state, &user, CheckoutRequest::default())
        .await
        .expect_err("no cart yet");
    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

#[tokio::test]
async fn checkout_with_request_id_is_retriable() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Test Widget", 1000, 10);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let first = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            request_id: Some("req-1".into()),
        },
    )
    .await?
    .data
    .expect("order");

    // The retry lands on an already-cleared cart and still succeeds, handing
    // back the order the first attempt created.
    let second = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            request_id: Some("req-1".into()),
        },
    )
    .await?
    .data
    .expect("order");

    assert_eq!(first.id, second.id);
    assert_eq!(state.store.all_orders().len(), 1);
    assert_eq!(state.store.product(product_id)?.stock, 8);

    // A different token on the empty cart is a genuine empty-cart failure.
    let err = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            request_id: Some("req-2".into()),
        },
    )
    .await
    .expect_err("cart is empty");
    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

#[tokio::test]
async fn checkout_rejects_vanished_products() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Test Widget", 1000, 5);

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    state.store.remove_product(product_id)?;

    let err = order_service::checkout(&state, &user, CheckoutRequest::default())
        .await
        .expect_err("product vanished");
    assert!(matches!(err, AppError::NotFound));

    // Nothing was created and the cart is intact for the user to fix up.
    assert!(state.store.all_orders().is_empty());
    assert_eq!(state.store.cart_view(user.user_id).items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn order_numbers_are_monotonic() -> anyhow::Result<()> {
    let state = test_state();
    let user = seed_user(&state, "user@example.com", "customer");
    let product_id = seed_product(&state, "Test Widget", 1000, 10);

    let mut numbers = Vec::new();
    for _ in 0..3 {
        cart_service::add_to_cart(
            &state,
            &user,
            AddToCartRequest {
                product_id,
                quantity: 1,
            },
        )
        .await?;
        let order = order_service::checkout(&state, &user, CheckoutRequest::default())
            .await?
            .data
            .expect("order");
        numbers.push(order.number);
    }
    assert_eq!(numbers, vec![1, 2, 3]);

    let visible = order_service::get_order(&state, &user, state.store.all_orders()[0].id).await;
    assert!(visible.is_ok());

    // Another user cannot read this user's order.
    let other = seed_user(&state, "other@example.com", "customer");
    let err = order_service::get_order(&state, &other, state.store.all_orders()[0].id)
        .await
        .expect_err("foreign order");
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
