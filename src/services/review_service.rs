use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_reviews(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut reviews = state.store.reviews();
    reviews.sort_by_key(|r| std::cmp::Reverse(r.created_at));

    let total = reviews.len() as i64;
    let items: Vec<Review> = reviews
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn get_review(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Review>> {
    let review = state.store.review(id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Review", review, None))
}

pub async fn list_reviews_for_product(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut reviews = state.store.reviews_for_product(product_id);
    reviews.sort_by_key(|r| std::cmp::Reverse(r.created_at));

    let total = reviews.len() as i64;
    let items: Vec<Review> = reviews
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }
    if state.store.user(user.user_id).is_none() {
        return Err(AppError::NotFound);
    }
    if !state.store.product_exists(payload.product_id) {
        return Err(AppError::NotFound);
    }

    let review = Review {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        product_id: payload.product_id,
        rating: payload.rating,
        comment: payload.comment.unwrap_or_default(),
        created_at: Utc::now(),
    };
    state.store.insert_review(review.clone())?;
    state.persist().await;

    Ok(ApiResponse::success(
        "Review created",
        review,
        Some(Meta::empty()),
    ))
}
