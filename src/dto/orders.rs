use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Order;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Optional deduplication token. Retrying checkout with the same value
    /// returns the order the first attempt created.
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
