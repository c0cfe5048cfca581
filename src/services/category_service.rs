use uuid::Uuid;

use crate::{
    dto::categories::{CategoryList, CreateCategoryRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_categories(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut categories = state.store.categories();
    categories.sort_by(|a, b| a.name.cmp(&b.name));

    let total = categories.len() as i64;
    let items: Vec<Category> = categories
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Categories", CategoryList { items }, Some(meta)))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = state.store.category(id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Category", category, None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    if payload.name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }

    let category = Category {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
    };
    state.store.insert_category(category.clone())?;
    state.persist().await;

    Ok(ApiResponse::success(
        "Category created",
        category,
        Some(Meta::empty()),
    ))
}
