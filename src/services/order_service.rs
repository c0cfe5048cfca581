use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let status = parse_status_filter(query.status.as_deref())?;

    let mut orders = state.store.orders_for_user(user.user_id);
    if let Some(status) = status {
        orders.retain(|o| o.status == status);
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    match sort_order {
        SortOrder::Asc => orders.sort_by_key(|o| o.number),
        SortOrder::Desc => orders.sort_by_key(|o| std::cmp::Reverse(o.number)),
    }

    let total = orders.len() as i64;
    let items: Vec<Order> = orders
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

/// Convert the caller's cart into an order. The cart empties in the same
/// step, so one reservation can only ever be ordered once; passing the same
/// `request_id` again hands back the order the first call created.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .store
        .place_order(user.user_id, payload.request_id.as_deref())?;

    state.persist().await;

    tracing::info!(
        order_id = %order.id,
        order_number = order.number,
        user_id = %user.user_id,
        total = order.total_price,
        "order placed"
    );

    Ok(ApiResponse::success(
        "Checkout success",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .store
        .order(id)
        .filter(|o| o.user_id == user.user_id)
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub(crate) fn parse_status_filter(status: Option<&str>) -> AppResult<Option<OrderStatus>> {
    match status.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<OrderStatus>()
            .map(Some)
            .map_err(|_| AppError::Validation("Invalid order status".into())),
    }
}
