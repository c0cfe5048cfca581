use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut products = state.store.products();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        products.retain(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description
                    .as_ref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        });
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        products.retain(|p| p.category.eq_ignore_ascii_case(category));
    }
    if let Some(min_price) = query.min_price {
        products.retain(|p| p.price >= min_price);
    }
    if let Some(max_price) = query.max_price {
        products.retain(|p| p.price <= max_price);
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    products.sort_by(|a, b| {
        let ordering = match sort_by {
            ProductSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            ProductSortBy::Price => a.price.cmp(&b.price),
            ProductSortBy::Name => a.name.cmp(&b.name),
        };
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let total = products.len() as i64;
    let items: Vec<Product> = products
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = state.store.product(id)?;
    Ok(ApiResponse::success("Product", product, None))
}

/// Keyword search over name and category, the shape the storefront search box
/// uses.
pub async fn search_products(
    state: &AppState,
    q: Option<String>,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = pagination.normalize();
    let needle = q.unwrap_or_default().to_lowercase();

    let mut products = state.store.products();
    products.retain(|p| {
        p.name.to_lowercase().contains(&needle) || p.category.to_lowercase().contains(&needle)
    });
    products.sort_by(|a, b| a.name.cmp(&b.name));

    let total = products.len() as i64;
    let items: Vec<Product> = products
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Search results", ProductList { items }, Some(meta)))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::Validation("stock must not be negative".into()));
    }

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        description: Some(payload.description),
        price: payload.price,
        category: payload.category,
        stock: payload.stock,
        created_at: Utc::now(),
    };
    state.store.insert_product(product.clone())?;
    state.persist().await;

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price.is_some_and(|p| p < 0) {
        return Err(AppError::Validation("price must not be negative".into()));
    }

    let product = state.store.update_product(id, |product| {
        if let Some(name) = payload.name {
            product.name = name;
        }
        if let Some(description) = payload.description {
            product.description = Some(description);
        }
        if let Some(price) = payload.price {
            product.price = price;
        }
        if let Some(category) = payload.category {
            product.category = category;
        }
    })?;
    state.persist().await;

    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    state.store.remove_product(id)?;
    state.persist().await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
