use std::collections::HashMap;

use anyhow::Context;
use bigdecimal::{BigDecimal, Zero};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    app_error::AppError,
    models::{
        CategoryEntity, CreateCategoryEntity, CreateMenuItemEntity, CreateRestaurantEntity,
        MenuItemEntity, RestaurantEntity, UpdateMenuItemEntity,
    },
    schema::{categories, menu_items, restaurants},
};

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithItems {
    pub category: CategoryEntity,
    pub items: Vec<MenuItemEntity>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantMenu {
    pub restaurant: RestaurantEntity,
    pub categories: Vec<CategoryWithItems>,
}

#[derive(Debug)]
pub struct NewMenuItem {
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub is_available: bool,
    pub image_url: Option<String>,
}

impl UpdateMenuItemEntity {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.is_available.is_none()
            && self.image_url.is_none()
    }
}

fn ensure_price(price: &BigDecimal) -> Result<(), AppError> {
    if price < &BigDecimal::zero() {
        return Err(AppError::BadRequest("Price must not be negative".into()));
    }
    Ok(())
}

async fn ensure_category_of(
    conn: &mut AsyncPgConnection,
    category_id: i32,
    restaurant_id: i32,
) -> Result<(), AppError> {
    let matches: i64 = categories::table
        .find(category_id)
        .filter(categories::restaurant_id.eq(restaurant_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up category")?;

    if matches == 0 {
        return Err(AppError::BadRequest(
            "Category does not belong to this restaurant".into(),
        ));
    }
    Ok(())
}

async fn find_restaurant(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
) -> Result<RestaurantEntity, AppError> {
    restaurants::table
        .find(restaurant_id)
        .select(RestaurantEntity::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Restaurant"))
}

pub async fn list_restaurants(
    conn: &mut AsyncPgConnection,
) -> Result<Vec<RestaurantEntity>, AppError> {
    let restaurants = restaurants::table
        .filter(restaurants::is_active.eq(true))
        .order_by(restaurants::name.asc())
        .select(RestaurantEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get restaurants")?;

    Ok(restaurants)
}

/// Restaurant with its menu grouped by category.
pub async fn get_restaurant(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
) -> Result<RestaurantMenu, AppError> {
    let restaurant = find_restaurant(conn, restaurant_id).await?;

    let categories: Vec<CategoryEntity> = categories::table
        .filter(categories::restaurant_id.eq(restaurant.id))
        .order_by(categories::name.asc())
        .select(CategoryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    let items: Vec<MenuItemEntity> = menu_items::table
        .filter(menu_items::restaurant_id.eq(restaurant.id))
        .order_by(menu_items::name.asc())
        .select(MenuItemEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;

    let mut group: HashMap<i32, Vec<MenuItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.category_id).or_default().push(item);
    }

    let categories = categories
        .into_iter()
        .map(|category| {
            let items = group.remove(&category.id).unwrap_or_default();
            CategoryWithItems { category, items }
        })
        .collect();

    Ok(RestaurantMenu {
        restaurant,
        categories,
    })
}

pub async fn create_restaurant(
    conn: &mut AsyncPgConnection,
    restaurant: CreateRestaurantEntity,
) -> Result<RestaurantEntity, AppError> {
    let restaurant = diesel::insert_into(restaurants::table)
        .values(restaurant)
        .returning(RestaurantEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Restaurant #{} created", restaurant.id);

    Ok(restaurant)
}

pub async fn create_category(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
    name: String,
) -> Result<CategoryEntity, AppError> {
    let restaurant = find_restaurant(conn, restaurant_id).await?;

    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }

    let category = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            restaurant_id: restaurant.id,
            name,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(category)
}

pub async fn create_menu_item(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
    item: NewMenuItem,
) -> Result<MenuItemEntity, AppError> {
    let restaurant = find_restaurant(conn, restaurant_id).await?;
    ensure_price(&item.price)?;
    ensure_category_of(conn, item.category_id, restaurant.id).await?;

    let item = diesel::insert_into(menu_items::table)
        .values(CreateMenuItemEntity {
            restaurant_id: restaurant.id,
            category_id: item.category_id,
            name: item.name,
            description: item.description,
            price: item.price.with_scale(2),
            is_available: item.is_available,
            image_url: item.image_url,
        })
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Menu item #{} added to restaurant #{}", item.id, restaurant_id);

    Ok(item)
}

/// Applies only the supplied fields. Existing carts and orders keep the prices they captured.
pub async fn update_menu_item(
    conn: &mut AsyncPgConnection,
    menu_item_id: i32,
    mut changes: UpdateMenuItemEntity,
) -> Result<MenuItemEntity, AppError> {
    if changes.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }

    let current: MenuItemEntity = menu_items::table
        .find(menu_item_id)
        .select(MenuItemEntity::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Menu item"))?;

    if let Some(price) = changes.price.take() {
        ensure_price(&price)?;
        changes.price = Some(price.with_scale(2));
    }

    if let Some(category_id) = changes.category_id {
        ensure_category_of(conn, category_id, current.restaurant_id).await?;
    }

    let updated = diesel::update(menu_items::table.find(current.id))
        .set((&changes, menu_items::updated_at.eq(diesel::dsl::now)))
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to update menu item")?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateMenuItemEntity::default().is_empty());
        let changes = UpdateMenuItemEntity {
            is_available: Some(false),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn negative_prices_are_rejected() {
        assert!(ensure_price(&BigDecimal::from_str("0.00").unwrap()).is_ok());
        assert!(matches!(
            ensure_price(&BigDecimal::from_str("-0.01").unwrap()),
            Err(AppError::BadRequest(_))
        ));
    }
}
