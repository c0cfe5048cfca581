use uuid::Uuid;

use crate::{
    dto::cart::AddToCartRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Cart,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Never fails: a user without a cart sees an empty one. Items are paginated
/// in the response; the meta block carries the full line count.
pub async fn get_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<Cart>> {
    let (page, limit, offset) = pagination.normalize();
    let mut cart = state.store.cart_view(user.user_id);
    let total = cart.items.len() as i64;

    cart.items = cart
        .items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", cart, Some(meta)))
}

/// Reserves stock the moment the item enters the cart, so two users cannot
/// both believe the last unit is available. Reservation and cart update are
/// one unit inside the store; nothing is persisted on a failure path.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }

    let cart = state
        .store
        .add_cart_item(user.user_id, payload.product_id, payload.quantity)?;

    state.persist().await;
    Ok(ApiResponse::success("OK", cart, None))
}

/// Removing a line is the only pre-order path that returns reserved stock.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let cart = state.store.remove_cart_item(user.user_id, item_id)?;

    state.persist().await;
    Ok(ApiResponse::success(
        "Removed from cart",
        cart,
        Some(Meta::empty()),
    ))
}
