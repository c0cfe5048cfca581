use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::UserProfile,
        categories::CategoryList,
        orders::OrderList,
        products,
        reviews::ReviewList,
    },
    models::{Cart, CartItem, Category, Order, OrderItem, OrderStatus, Product, Review},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, health, orders, params, products as product_routes,
        reviews, search,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        auth::me,
        cart::get_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        reviews::list_reviews,
        reviews::get_review,
        reviews::list_reviews_for_product,
        reviews::create_review,
        search::search_products,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            UserProfile,
            Product,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Category,
            Review,
            admin::ProductList,
            admin::UpdateOrderStatusRequest,
            admin::InventoryAdjustRequest,
            admin::LowStockQuery,
            CategoryList,
            ReviewList,
            OrderList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::SearchQuery,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<products::ProductList>,
            ApiResponse<admin::ProductList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Search", description = "Search endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
