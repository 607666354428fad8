use std::collections::HashMap;

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, sql_types::BigInt,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    app_error::AppError,
    domain::{
        order_number::{day_range, next_order_number},
        order_status::{OrderStatus, PaymentMethod, PaymentStatus},
        pricing::{OrderCharges, line_subtotal},
        roles::{Principal, Role},
    },
    models::{
        AddressEntity, CartEntity, CartItemEntity, CreateDeliveryEntity, CreateOrderEntity,
        CreateOrderItemEntity, CreateOrderStatusHistoryEntity, DeliveryEntity, OrderEntity,
        OrderItemEntity, OrderStatusHistoryEntity, RestaurantEntity, UserEntity,
    },
    schema::{
        addresses, cart_items, carts, deliveries, menu_items, order_items, order_status_history,
        orders, restaurants, users,
    },
};

/// Advisory lock key serialising order-number allocation across concurrent checkouts.
const ORDER_NUMBER_LOCK_KEY: i64 = 0x6f72_6465_725f_6e6f;

/// Input for converting a cart into an order. Charges other than the subtotal are supplied by
/// the caller; `total_amount`, when present, must agree with them.
#[derive(Debug)]
pub struct CreateOrderInput {
    pub cart_id: i32,
    pub address_id: i32,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub tax: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: Option<BigDecimal>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSummary {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: i32,
    pub order_number: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
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
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub customer: CustomerSummary,
    pub restaurant: RestaurantSummary,
    pub address: Option<AddressEntity>,
    pub items: Vec<OrderItemEntity>,
    pub status_history: Vec<OrderStatusHistoryEntity>,
    pub delivery: Option<DeliveryEntity>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}

pub(crate) fn parse_status(order: &OrderEntity) -> Result<OrderStatus, AppError> {
    Ok(order
        .status
        .parse::<OrderStatus>()
        .with_context(|| format!("Order #{} carries an unknown status", order.id))?)
}

/// Loads an order the principal may see: its owner, or any admin role.
pub(crate) async fn find_visible_order(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    principal: &Principal,
) -> Result<OrderEntity, AppError> {
    let mut query = orders::table
        .find(order_id)
        .select(OrderEntity::as_select())
        .into_boxed();

    if !principal.role.is_admin() {
        query = query.filter(orders::user_id.eq(principal.id));
    }

    query
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn load_order_detail(
    conn: &mut AsyncPgConnection,
    order: OrderEntity,
) -> Result<OrderDetail, AppError> {
    let customer: UserEntity = users::table
        .find(order.user_id)
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .context("Failed to get order customer")?;

    let restaurant: RestaurantEntity = restaurants::table
        .find(order.restaurant_id)
        .select(RestaurantEntity::as_select())
        .first(conn)
        .await
        .context("Failed to get order restaurant")?;

    let address: Option<AddressEntity> = match order.address_id {
        Some(address_id) => addresses::table
            .find(address_id)
            .select(AddressEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get order address")?,
        None => None,
    };

    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .order_by(order_items::id.asc())
        .select(OrderItemEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let status_history: Vec<OrderStatusHistoryEntity> = order_status_history::table
        .filter(order_status_history::order_id.eq(order.id))
        .order_by(order_status_history::id.desc())
        .select(OrderStatusHistoryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order status history")?;

    let delivery: Option<DeliveryEntity> = deliveries::table
        .filter(deliveries::order_id.eq(order.id))
        .select(DeliveryEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get order delivery")?;

    Ok(OrderDetail {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        payment_status: order.payment_status,
        payment_method: order.payment_method,
        subtotal: order.subtotal,
        tax: order.tax,
        discount: order.discount,
        delivery_fee: order.delivery_fee,
        total_amount: order.total_amount,
        notes: order.notes,
        placed_at: order.placed_at,
        paid_at: order.paid_at,
        customer: CustomerSummary {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
        },
        restaurant: RestaurantSummary {
            id: restaurant.id,
            name: restaurant.name,
            address: restaurant.address,
            phone: restaurant.phone,
        },
        address,
        items,
        status_history,
        delivery,
    })
}

/// Allocates the next order number for today. Must run inside the transaction that inserts the
/// order: the advisory lock is released on commit or rollback.
async fn generate_order_number(conn: &mut AsyncPgConnection) -> Result<i64, AppError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(ORDER_NUMBER_LOCK_KEY)
        .execute(conn)
        .await
        .context("Failed to acquire order number lock")?;

    let today = Utc::now().date_naive();
    let (first, last) = day_range(today);

    let last_today: Option<i64> = orders::table
        .filter(orders::order_number.between(first, last))
        .select(diesel::dsl::max(orders::order_number))
        .get_result(conn)
        .await
        .context("Failed to read today's last order number")?;

    next_order_number(today, last_today)
        .ok_or_else(|| anyhow::anyhow!("Order number sequence for {today} is exhausted").into())
}

/// Converts the caller's cart into an order.
///
/// Everything happens in one transaction: the order, its item snapshots and the initial
/// `placed` history entry are written and the cart is torn down, or nothing changes at all.
pub async fn create_order_from_cart(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    input: CreateOrderInput,
) -> Result<OrderDetail, AppError> {
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let cart: CartEntity = carts::table
                    .find(input.cart_id)
                    .filter(carts::user_id.eq(user_id))
                    .select(CartEntity::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Cart"))?;

                let cart_lines: Vec<CartItemEntity> = cart_items::table
                    .filter(cart_items::cart_id.eq(cart.id))
                    .order_by(cart_items::id.asc())
                    .select(CartItemEntity::as_select())
                    .get_results(conn)
                    .await
                    .context("Failed to get cart items")?;

                if cart_lines.is_empty() {
                    return Err(AppError::BadRequest("Cart is empty".into()));
                }

                let address_id: i32 = addresses::table
                    .find(input.address_id)
                    .filter(addresses::user_id.eq(user_id))
                    .select(addresses::id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Address"))?;

                let subtotal = line_subtotal(
                    cart_lines
                        .iter()
                        .map(|line| (&line.price_at_add, line.quantity)),
                );
                let charges = OrderCharges::assemble(
                    subtotal,
                    input.tax,
                    input.delivery_fee,
                    input.discount,
                    input.total_amount,
                )
                .map_err(|err| AppError::BadRequest(err.to_string()))?;

                let menu_item_ids: Vec<i32> =
                    cart_lines.iter().map(|line| line.menu_item_id).collect();
                let names: HashMap<i32, String> = menu_items::table
                    .filter(menu_items::id.eq_any(&menu_item_ids))
                    .select((menu_items::id, menu_items::name))
                    .get_results::<(i32, String)>(conn)
                    .await
                    .context("Failed to get menu item names")?
                    .into_iter()
                    .collect();

                let order_number = generate_order_number(conn).await?;

                let order = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        order_number,
                        user_id,
                        restaurant_id: cart.restaurant_id,
                        address_id: Some(address_id),
                        status: OrderStatus::Placed.as_str().into(),
                        subtotal: charges.subtotal,
                        tax: charges.tax,
                        discount: charges.discount,
                        delivery_fee: charges.delivery_fee,
                        total_amount: charges.total_amount,
                        payment_status: PaymentStatus::Pending.as_str().into(),
                        payment_method: input.payment_method.as_str().into(),
                        notes: input.notes,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let snapshots: Vec<CreateOrderItemEntity> = cart_lines
                    .into_iter()
                    .map(|line| CreateOrderItemEntity {
                        order_id: order.id,
                        menu_item_id: Some(line.menu_item_id),
                        quantity: line.quantity,
                        item_name_snapshot: names
                            .get(&line.menu_item_id)
                            .cloned()
                            .unwrap_or_else(|| format!("Menu item #{}", line.menu_item_id)),
                        price_at_order: line.price_at_add,
                    })
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(snapshots)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                diesel::insert_into(order_status_history::table)
                    .values(CreateOrderStatusHistoryEntity {
                        order_id: order.id,
                        previous_status: None,
                        new_status: OrderStatus::Placed.as_str().into(),
                        actor_type: Role::Customer.as_str().into(),
                        changed_by: Some(user_id),
                        note: Some("Order placed".into()),
                    })
                    .execute(conn)
                    .await
                    .context("Failed to record initial order status")?;

                diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart.id)))
                    .execute(conn)
                    .await
                    .context("Failed to clear cart items")?;

                diesel::delete(carts::table.find(cart.id))
                    .execute(conn)
                    .await
                    .context("Failed to delete cart")?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!(
        "Order #{} ({}) placed by user #{}",
        order.id, order.order_number, user_id
    );

    load_order_detail(conn, order).await
}

/// Moves an order along the status state machine and appends the change to its history,
/// atomically. Transitions outside the table are rejected.
pub async fn update_order_status(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    new_status: OrderStatus,
    actor: Principal,
    note: Option<String>,
) -> Result<OrderDetail, AppError> {
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(order_id)
                    .select(OrderEntity::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Order"))?;

                let current = parse_status(&order)?;
                if !current.can_transition_to(new_status) {
                    return Err(AppError::BadRequest(format!(
                        "Invalid status transition from {current} to {new_status}"
                    )));
                }

                let updated = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(new_status.as_str()),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order status")?;

                let note = note
                    .filter(|note| !note.trim().is_empty())
                    .unwrap_or_else(|| format!("Status changed from {current} to {new_status}"));

                diesel::insert_into(order_status_history::table)
                    .values(CreateOrderStatusHistoryEntity {
                        order_id: order.id,
                        previous_status: Some(current.as_str().into()),
                        new_status: new_status.as_str().into(),
                        actor_type: actor.role.as_str().into(),
                        changed_by: Some(actor.id),
                        note: Some(note),
                    })
                    .execute(conn)
                    .await
                    .context("Failed to append order status history")?;

                Ok::<OrderEntity, AppError>(updated)
            })
        })
        .await?;

    info!(
        "Order #{} moved to {} by user #{}",
        order.id, order.status, actor.id
    );

    load_order_detail(conn, order).await
}

/// Hands an order to a delivery driver. Each order has at most one delivery record; assigning
/// again replaces the driver.
pub async fn assign_delivery(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    driver_id: i32,
) -> Result<DeliveryEntity, AppError> {
    let delivery = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(order_id)
                    .select(OrderEntity::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Order"))?;

                let driver_role: String = users::table
                    .find(driver_id)
                    .select(users::role)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Driver"))?;

                if driver_role.parse::<Role>().ok() != Some(Role::Delivery) {
                    return Err(AppError::BadRequest(
                        "Assigned user is not a delivery driver".into(),
                    ));
                }

                let status = parse_status(&order)?;
                if !status.accepts_delivery_assignment() {
                    return Err(AppError::BadRequest(format!(
                        "Cannot assign delivery to an order that is {status}"
                    )));
                }

                let delivery = diesel::insert_into(deliveries::table)
                    .values(CreateDeliveryEntity {
                        order_id: order.id,
                        driver_id,
                        status: "assigned".into(),
                    })
                    .on_conflict(deliveries::order_id)
                    .do_update()
                    .set((
                        deliveries::driver_id.eq(driver_id),
                        deliveries::status.eq("assigned"),
                        deliveries::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(DeliveryEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to upsert delivery")?;

                Ok::<DeliveryEntity, AppError>(delivery)
            })
        })
        .await?;

    info!(
        "Delivery {} for order #{} assigned to driver #{}",
        delivery.id, delivery.order_id, delivery.driver_id
    );

    Ok(delivery)
}

/// Records payment metadata. Payment is independent of the fulfilment status.
pub async fn update_payment_status(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    payment_status: PaymentStatus,
) -> Result<OrderEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let order: OrderEntity = orders::table
                .find(order_id)
                .select(OrderEntity::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::not_found("Order"))?;

            let was_paid = order.paid_at.is_some();
            let paid_at = match payment_status {
                PaymentStatus::Paid => order.paid_at.or_else(|| Some(Utc::now())),
                PaymentStatus::Refunded if !was_paid => {
                    return Err(AppError::BadRequest(
                        "Only paid orders can be refunded".into(),
                    ));
                }
                PaymentStatus::Refunded => order.paid_at,
                PaymentStatus::Pending | PaymentStatus::Failed => None,
            };

            let updated = diesel::update(orders::table.find(order.id))
                .set((
                    orders::payment_status.eq(payment_status.as_str()),
                    orders::paid_at.eq(paid_at),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to update payment status")?;

            Ok::<OrderEntity, AppError>(updated)
        })
    })
    .await
}

pub async fn get_order(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    principal: &Principal,
) -> Result<OrderDetail, AppError> {
    let order = find_visible_order(conn, order_id, principal).await?;
    load_order_detail(conn, order).await
}

pub async fn get_order_by_number(
    conn: &mut AsyncPgConnection,
    order_number: i64,
    principal: &Principal,
) -> Result<OrderDetail, AppError> {
    let mut query = orders::table
        .filter(orders::order_number.eq(order_number))
        .select(OrderEntity::as_select())
        .into_boxed();

    if !principal.role.is_admin() {
        query = query.filter(orders::user_id.eq(principal.id));
    }

    let order = query
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Order"))?;

    load_order_detail(conn, order).await
}

async fn attach_items(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
) -> Result<Vec<OrderWithItems>, AppError> {
    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .order_by(order_items::id.asc())
        .select(OrderItemEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let mut group: HashMap<i32, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = group.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

pub async fn get_my_orders(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> Result<Vec<OrderWithItems>, AppError> {
    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::user_id.eq(user_id))
        .order_by(orders::placed_at.desc())
        .select(OrderEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    attach_items(conn, orders).await
}

pub async fn list_orders(
    conn: &mut AsyncPgConnection,
    status: Option<OrderStatus>,
) -> Result<Vec<OrderWithItems>, AppError> {
    let mut query = orders::table
        .select(OrderEntity::as_select())
        .order_by(orders::placed_at.desc())
        .into_boxed();

    if let Some(status) = status {
        query = query.filter(orders::status.eq(status.as_str()));
    }

    let orders: Vec<OrderEntity> = query
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    attach_items(conn, orders).await
}
