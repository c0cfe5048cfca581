use uuid::Uuid;

use crate::{
    dto::orders::OrderList,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::admin::{InventoryAdjustRequest, LowStockQuery, ProductList, UpdateOrderStatusRequest},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::parse_status_filter,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let status = parse_status_filter(query.status.as_deref())?;

    let mut orders = state.store.all_orders();
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
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = state.store.order(id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Order found", order, Some(Meta::empty())))
}

/// Advance an order one step along the lifecycle. `confirmed` deliberately
/// touches no stock: the quantities were reserved when the lines entered the
/// cart, and confirming only commits the order.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let target = payload
        .status
        .parse::<OrderStatus>()
        .map_err(|_| AppError::Validation("Invalid order status".into()))?;

    let order = state.store.transition_order(id, target)?;
    state.persist().await;

    tracing::info!(order_id = %order.id, status = %order.status, "order status updated");

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination.normalize();

    let mut products: Vec<Product> = state
        .store
        .products()
        .into_iter()
        .filter(|p| p.stock <= threshold)
        .collect();
    products.sort_by(|a, b| {
        a.stock
            .cmp(&b.stock)
            .then(b.created_at.cmp(&a.created_at))
    });

    let total = products.len() as i64;
    let items: Vec<Product> = products
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

/// Manual restock or correction. Goes through the same ledger operation as
/// reservations, so the non-negative invariant holds here too.
pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".into()));
    }

    let product = state.store.adjust_stock(id, payload.delta)?;
    state.persist().await;

    Ok(ApiResponse::success(
        "Inventory updated",
        product,
        Some(Meta::empty()),
    ))
}
