use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    AsChangeset, Selectable,
    prelude::{Associations, Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

// Identity

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::addresses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct AddressEntity {
    pub id: i32,
    pub user_id: i32,
    pub label: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::addresses)]
pub struct CreateAddressEntity {
    pub user_id: i32,
    pub label: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub is_primary: bool,
}

// Catalog

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct RestaurantEntity {
    pub id: i32,
    pub owner_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::restaurants)]
pub struct CreateRestaurantEntity {
    pub owner_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(RestaurantEntity, foreign_key = restaurant_id))]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntity {
    pub id: i32,
    pub restaurant_id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub restaurant_id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(RestaurantEntity, foreign_key = restaurant_id))]
#[diesel(table_name = crate::schema::menu_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct MenuItemEntity {
    pub id: i32,
    pub restaurant_id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "10.00")]
    pub price: BigDecimal,
    pub is_available: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct CreateMenuItemEntity {
    pub restaurant_id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub is_available: bool,
    pub image_url: Option<String>,
}

/// Mutable catalog fields. `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct UpdateMenuItemEntity {
    pub category_id: Option<i32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub is_available: Option<bool>,
    pub image_url: Option<String>,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CartEntity {
    pub id: i32,
    pub user_id: Option<i32>,
    pub restaurant_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity {
    pub user_id: Option<i32>,
    pub restaurant_id: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(CartEntity, foreign_key = cart_id))]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CartItemEntity {
    pub id: i32,
    pub cart_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    #[schema(value_type = String, example = "10.00")]
    pub price_at_add: BigDecimal,
    pub added_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub cart_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub price_at_add: BigDecimal,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderEntity {
    pub id: i32,
    pub order_number: i64,
    pub user_id: i32,
    pub restaurant_id: i32,
    pub address_id: Option<i32>,
    pub status: String,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
    #[schema(value_type = String)]
    pub tax: BigDecimal,
    #[schema(value_type = String)]
    pub discount: BigDecimal,
    #[schema(value_type = String)]
    pub delivery_fee: BigDecimal,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    pub payment_status: String,
    pub payment_method: String,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub order_number: i64,
    pub user_id: i32,
    pub restaurant_id: i32,
    pub address_id: Option<i32>,
    pub status: String,
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub discount: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub total_amount: BigDecimal,
    pub payment_status: String,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub menu_item_id: Option<i32>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price_at_order: BigDecimal,
    pub item_name_snapshot: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub menu_item_id: Option<i32>,
    pub quantity: i32,
    pub price_at_order: BigDecimal,
    pub item_name_snapshot: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_status_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusHistoryEntity {
    pub id: i32,
    pub order_id: i32,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub actor_type: String,
    pub changed_by: Option<i32>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_status_history)]
pub struct CreateOrderStatusHistoryEntity {
    pub order_id: i32,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub actor_type: String,
    pub changed_by: Option<i32>,
    pub note: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntity {
    pub id: Uuid,
    pub order_id: i32,
    pub driver_id: i32,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::deliveries)]
pub struct CreateDeliveryEntity {
    pub order_id: i32,
    pub driver_id: i32,
    pub status: String,
}

// Ratings

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::rating_reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct RatingReviewEntity {
    pub id: i32,
    pub user_id: i32,
    pub menu_item_id: i32,
    pub order_id: i32,
    pub rating: i32,
    pub review: Option<String>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::rating_reviews)]
pub struct CreateRatingReviewEntity {
    pub user_id: i32,
    pub menu_item_id: i32,
    pub order_id: i32,
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::review_responses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponseEntity {
    pub id: i32,
    pub rating_id: i32,
    pub responder_id: Option<i32>,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::review_responses)]
pub struct CreateReviewResponseEntity {
    pub rating_id: i32,
    pub responder_id: Option<i32>,
    pub response: String,
}
