use anyhow::Context;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::{
    app_error::AppError,
    models::{AddressEntity, CreateAddressEntity},
    schema::addresses,
};

#[derive(Debug)]
pub struct NewAddress {
    pub label: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub make_primary: bool,
}

pub async fn list_my_addresses(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> Result<Vec<AddressEntity>, AppError> {
    let addresses = addresses::table
        .filter(addresses::user_id.eq(user_id))
        .order_by((addresses::is_primary.desc(), addresses::id.asc()))
        .select(AddressEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get addresses")?;

    Ok(addresses)
}

async fn clear_primary(conn: &mut AsyncPgConnection, user_id: i32) -> Result<(), AppError> {
    diesel::update(
        addresses::table
            .filter(addresses::user_id.eq(user_id))
            .filter(addresses::is_primary.eq(true)),
    )
    .set(addresses::is_primary.eq(false))
    .execute(conn)
    .await
    .context("Failed to clear primary address")?;
    Ok(())
}

/// Stores a new address. A user's first address becomes primary regardless of the request.
pub async fn create_address(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    address: NewAddress,
) -> Result<AddressEntity, AppError> {
    if address.street.trim().is_empty() || address.city.trim().is_empty() {
        return Err(AppError::BadRequest("Street and city are required".into()));
    }

    conn.transaction(move |conn| {
        Box::pin(async move {
            let existing: i64 = addresses::table
                .filter(addresses::user_id.eq(user_id))
                .count()
                .get_result(conn)
                .await
                .context("Failed to count addresses")?;

            let is_primary = existing == 0 || address.make_primary;
            if is_primary {
                clear_primary(conn, user_id).await?;
            }

            let created = diesel::insert_into(addresses::table)
                .values(CreateAddressEntity {
                    user_id,
                    label: address.label,
                    street: address.street,
                    city: address.city,
                    postal_code: address.postal_code,
                    is_primary,
                })
                .returning(AddressEntity::as_returning())
                .get_result(conn)
                .await?;

            Ok::<AddressEntity, AppError>(created)
        })
    })
    .await
}

/// Makes `address_id` the user's only primary address.
pub async fn set_primary_address(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    address_id: i32,
) -> Result<AddressEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let address: AddressEntity = addresses::table
                .find(address_id)
                .filter(addresses::user_id.eq(user_id))
                .select(AddressEntity::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::not_found("Address"))?;

            clear_primary(conn, user_id).await?;

            let updated = diesel::update(addresses::table.find(address.id))
                .set(addresses::is_primary.eq(true))
                .returning(AddressEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to set primary address")?;

            Ok::<AddressEntity, AppError>(updated)
        })
    })
    .await
}
