use std::collections::HashMap;

use anyhow::Context;
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, upsert::excluded};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    app_error::AppError,
    domain::pricing::line_subtotal,
    models::{CartEntity, CartItemEntity, CreateCartEntity, CreateCartItemEntity, MenuItemEntity},
    schema::{cart_items, carts, menu_items, restaurants},
};

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CartDetail {
    pub cart: CartEntity,
    pub items: Vec<CartItemEntity>,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
}

impl CartDetail {
    fn new(cart: CartEntity, items: Vec<CartItemEntity>) -> Self {
        let subtotal = line_subtotal(items.iter().map(|item| (&item.price_at_add, item.quantity)));
        Self {
            cart,
            items,
            subtotal,
        }
    }
}

/// Upper bound for a single cart line, merged quantities included.
pub const MAX_ITEM_QUANTITY: i32 = 99;

fn ensure_quantity(quantity: i32) -> Result<(), AppError> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(AppError::BadRequest(format!(
            "Quantity must be between 1 and {MAX_ITEM_QUANTITY}"
        )));
    }
    Ok(())
}

/// Loads a cart the caller may act on. Carts owned by someone else are reported as missing.
pub(crate) async fn find_accessible_cart(
    conn: &mut AsyncPgConnection,
    cart_id: i32,
    caller: Option<i32>,
) -> Result<CartEntity, AppError> {
    let cart: CartEntity = carts::table
        .find(cart_id)
        .select(CartEntity::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    match cart.user_id {
        Some(owner) if Some(owner) != caller => Err(AppError::not_found("Cart")),
        _ => Ok(cart),
    }
}

async fn touch_cart(conn: &mut AsyncPgConnection, cart_id: i32) -> Result<(), AppError> {
    diesel::update(carts::table.find(cart_id))
        .set(carts::updated_at.eq(diesel::dsl::now))
        .execute(conn)
        .await
        .context("Failed to update cart timestamp")?;
    Ok(())
}

/// Opens an empty cart against a restaurant. A user holds at most one cart per restaurant.
pub async fn create_cart(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
    user_id: Option<i32>,
) -> Result<CartEntity, AppError> {
    let restaurant_exists: i64 = restaurants::table
        .find(restaurant_id)
        .filter(restaurants::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up restaurant")?;

    if restaurant_exists == 0 {
        return Err(AppError::not_found("Restaurant"));
    }

    if let Some(user_id) = user_id {
        let existing: Option<i32> = carts::table
            .filter(carts::user_id.eq(user_id))
            .filter(carts::restaurant_id.eq(restaurant_id))
            .select(carts::id)
            .first(conn)
            .await
            .optional()
            .context("Failed to look up existing cart")?;

        if let Some(existing) = existing {
            return Err(AppError::Conflict(format!(
                "Cart {existing} already exists for this restaurant"
            )));
        }
    }

    let cart = diesel::insert_into(carts::table)
        .values(CreateCartEntity {
            user_id,
            restaurant_id,
        })
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Cart #{} created for restaurant #{}", cart.id, restaurant_id);

    Ok(cart)
}

pub async fn get_cart(
    conn: &mut AsyncPgConnection,
    cart_id: i32,
    caller: Option<i32>,
) -> Result<CartDetail, AppError> {
    let cart = find_accessible_cart(conn, cart_id, caller).await?;

    let items: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::cart_id.eq(cart.id))
        .order_by(cart_items::id.asc())
        .select(CartItemEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    Ok(CartDetail::new(cart, items))
}

pub async fn get_my_carts(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> Result<Vec<CartDetail>, AppError> {
    let carts: Vec<CartEntity> = carts::table
        .filter(carts::user_id.eq(user_id))
        .order_by(carts::updated_at.desc())
        .select(CartEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get my carts")?;

    let cart_ids: Vec<i32> = carts.iter().map(|cart| cart.id).collect();

    let items: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::cart_id.eq_any(&cart_ids))
        .order_by(cart_items::id.asc())
        .select(CartItemEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let mut group: HashMap<i32, Vec<CartItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.cart_id).or_default().push(item);
    }

    Ok(carts
        .into_iter()
        .map(|cart| {
            let items = group.remove(&cart.id).unwrap_or_default();
            CartDetail::new(cart, items)
        })
        .collect())
}

/// Adds a menu item to the cart. Adding an item already in the cart increments its quantity and
/// keeps the price captured when it was first added.
pub async fn add_item(
    conn: &mut AsyncPgConnection,
    cart_id: i32,
    caller: Option<i32>,
    menu_item_id: i32,
    quantity: i32,
) -> Result<CartItemEntity, AppError> {
    ensure_quantity(quantity)?;

    conn.transaction(move |conn| {
        Box::pin(async move {
            let cart = find_accessible_cart(conn, cart_id, caller).await?;

            let menu_item: MenuItemEntity = menu_items::table
                .find(menu_item_id)
                .select(MenuItemEntity::as_select())
                .first(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::not_found("Menu item"))?;

            if menu_item.restaurant_id != cart.restaurant_id {
                return Err(AppError::BadRequest(
                    "Menu item belongs to a different restaurant than the cart".into(),
                ));
            }

            if !menu_item.is_available {
                return Err(AppError::BadRequest(format!(
                    "{} is currently unavailable",
                    menu_item.name
                )));
            }

            let existing: Option<i32> = cart_items::table
                .filter(cart_items::cart_id.eq(cart.id))
                .filter(cart_items::menu_item_id.eq(menu_item.id))
                .select(cart_items::quantity)
                .for_update()
                .first(conn)
                .await
                .optional()?;
            if let Some(existing) = existing {
                ensure_quantity(existing.saturating_add(quantity))?;
            }

            let item = diesel::insert_into(cart_items::table)
                .values(CreateCartItemEntity {
                    cart_id: cart.id,
                    menu_item_id: menu_item.id,
                    quantity,
                    price_at_add: menu_item.price,
                })
                .on_conflict((cart_items::cart_id, cart_items::menu_item_id))
                .do_update()
                .set(cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)))
                .returning(CartItemEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to upsert cart item")?;

            touch_cart(conn, cart.id).await?;

            Ok::<CartItemEntity, AppError>(item)
        })
    })
    .await
}

async fn find_accessible_cart_item(
    conn: &mut AsyncPgConnection,
    cart_item_id: i32,
    caller: Option<i32>,
) -> Result<CartItemEntity, AppError> {
    let item: CartItemEntity = cart_items::table
        .find(cart_item_id)
        .select(CartItemEntity::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Cart item"))?;

    find_accessible_cart(conn, item.cart_id, caller)
        .await
        .map_err(|_| AppError::not_found("Cart item"))?;

    Ok(item)
}

pub async fn update_item(
    conn: &mut AsyncPgConnection,
    cart_item_id: i32,
    caller: Option<i32>,
    quantity: i32,
) -> Result<CartItemEntity, AppError> {
    ensure_quantity(quantity)?;

    conn.transaction(move |conn| {
        Box::pin(async move {
            let item = find_accessible_cart_item(conn, cart_item_id, caller).await?;

            let updated = diesel::update(cart_items::table.find(item.id))
                .set(cart_items::quantity.eq(quantity))
                .returning(CartItemEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to update cart item")?;

            touch_cart(conn, item.cart_id).await?;

            Ok::<CartItemEntity, AppError>(updated)
        })
    })
    .await
}

pub async fn remove_item(
    conn: &mut AsyncPgConnection,
    cart_item_id: i32,
    caller: Option<i32>,
) -> Result<CartItemEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let item = find_accessible_cart_item(conn, cart_item_id, caller).await?;

            let removed = diesel::delete(cart_items::table.find(item.id))
                .returning(CartItemEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to delete cart item")?;

            touch_cart(conn, item.cart_id).await?;

            Ok::<CartItemEntity, AppError>(removed)
        })
    })
    .await
}

/// Hard-deletes the cart; its items go with it through the foreign-key cascade.
pub async fn delete_cart(
    conn: &mut AsyncPgConnection,
    cart_id: i32,
    caller: Option<i32>,
) -> Result<CartEntity, AppError> {
    let cart = find_accessible_cart(conn, cart_id, caller).await?;

    let deleted = diesel::delete(carts::table.find(cart.id))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Cart #{} deleted", deleted.id);

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;

    use super::*;

    fn item(id: i32, price: &str, quantity: i32) -> CartItemEntity {
        CartItemEntity {
            id,
            cart_id: 1,
            menu_item_id: id,
            quantity,
            price_at_add: BigDecimal::from_str(price).unwrap(),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn cart_detail_sums_snapshot_prices() {
        let cart = CartEntity {
            id: 1,
            user_id: Some(5),
            restaurant_id: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let detail = CartDetail::new(cart, vec![item(1, "10.00", 2), item(2, "5.00", 1)]);
        assert_eq!(detail.subtotal, BigDecimal::from_str("25.00").unwrap());
    }

    #[test]
    fn rejects_non_positive_quantities() {
        assert!(ensure_quantity(1).is_ok());
        assert!(matches!(ensure_quantity(0), Err(AppError::BadRequest(_))));
        assert!(matches!(ensure_quantity(-3), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_quantities_above_line_limit() {
        assert!(ensure_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(matches!(
            ensure_quantity(MAX_ITEM_QUANTITY + 1),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(ensure_quantity(i32::MAX), Err(AppError::BadRequest(_))));
    }
}
