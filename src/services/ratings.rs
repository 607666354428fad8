use std::collections::HashMap;

use anyhow::Context;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::DatabaseErrorKind,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    app_error::{AppError, DieselError},
    domain::order_status::OrderStatus,
    models::{
        CreateRatingReviewEntity, CreateReviewResponseEntity, OrderEntity, RatingReviewEntity,
        ReviewResponseEntity,
    },
    schema::{menu_items, order_items, orders, rating_reviews, review_responses},
    services::orders::parse_status,
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug)]
pub struct SubmitRatingInput {
    pub menu_item_id: i32,
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RatingWithResponse {
    pub rating: RatingReviewEntity,
    pub response: Option<ReviewResponseEntity>,
}

fn ensure_rating_in_range(rating: i32) -> Result<(), AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::BadRequest(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

/// Records a user's rating of one item of one of their delivered orders.
pub async fn submit_rating(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    order_id: i32,
    input: SubmitRatingInput,
) -> Result<RatingReviewEntity, AppError> {
    ensure_rating_in_range(input.rating)?;

    let order: OrderEntity = orders::table
        .find(order_id)
        .filter(orders::user_id.eq(user_id))
        .select(OrderEntity::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Order"))?;

    if parse_status(&order)? != OrderStatus::Delivered {
        return Err(AppError::BadRequest(
            "Only delivered orders can be rated".into(),
        ));
    }

    let in_order: i64 = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .filter(order_items::menu_item_id.eq(input.menu_item_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up order item")?;

    if in_order == 0 {
        return Err(AppError::NotFound(
            "Menu item is not part of this order".into(),
        ));
    }

    let already_rated: i64 = rating_reviews::table
        .filter(rating_reviews::user_id.eq(user_id))
        .filter(rating_reviews::menu_item_id.eq(input.menu_item_id))
        .filter(rating_reviews::order_id.eq(order.id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up existing rating")?;

    if already_rated > 0 {
        return Err(AppError::Conflict(
            "This item has already been rated for this order".into(),
        ));
    }

    let review = input
        .review
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let rating = diesel::insert_into(rating_reviews::table)
        .values(CreateRatingReviewEntity {
            user_id,
            menu_item_id: input.menu_item_id,
            order_id: order.id,
            rating: input.rating,
            review,
        })
        .returning(RatingReviewEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        "User #{} rated menu item #{} on order #{}",
        user_id, rating.menu_item_id, order.id
    );

    Ok(rating)
}

/// Attaches the single admin response a review may carry.
pub async fn respond_to_review(
    conn: &mut AsyncPgConnection,
    rating_id: i32,
    responder_id: i32,
    text: String,
) -> Result<ReviewResponseEntity, AppError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Response text is required".into()));
    }

    let rating_exists: i64 = rating_reviews::table
        .find(rating_id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up rating")?;

    if rating_exists == 0 {
        return Err(AppError::not_found("Review"));
    }

    let existing_response: Option<i32> = review_responses::table
        .filter(review_responses::rating_id.eq(rating_id))
        .select(review_responses::id)
        .first(conn)
        .await
        .optional()
        .context("Failed to look up review response")?;

    if existing_response.is_some() {
        return Err(AppError::BadRequest(
            "This review already has a response".into(),
        ));
    }

    let response = diesel::insert_into(review_responses::table)
        .values(CreateReviewResponseEntity {
            rating_id,
            responder_id: Some(responder_id),
            response: text,
        })
        .returning(ReviewResponseEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::BadRequest("This review already has a response".into())
            }
            other => other.into(),
        })?;

    info!("Review #{} answered by user #{}", rating_id, responder_id);

    Ok(response)
}

async fn attach_responses(
    conn: &mut AsyncPgConnection,
    ratings: Vec<RatingReviewEntity>,
) -> Result<Vec<RatingWithResponse>, AppError> {
    let rating_ids: Vec<i32> = ratings.iter().map(|rating| rating.id).collect();

    let responses: Vec<ReviewResponseEntity> = review_responses::table
        .filter(review_responses::rating_id.eq_any(&rating_ids))
        .select(ReviewResponseEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get review responses")?;

    let mut by_rating: HashMap<i32, ReviewResponseEntity> = responses
        .into_iter()
        .map(|response| (response.rating_id, response))
        .collect();

    Ok(ratings
        .into_iter()
        .map(|rating| {
            let response = by_rating.remove(&rating.id);
            RatingWithResponse { rating, response }
        })
        .collect())
}

pub async fn list_menu_item_ratings(
    conn: &mut AsyncPgConnection,
    menu_item_id: i32,
) -> Result<Vec<RatingWithResponse>, AppError> {
    let ratings: Vec<RatingReviewEntity> = rating_reviews::table
        .filter(rating_reviews::menu_item_id.eq(menu_item_id))
        .filter(rating_reviews::is_visible.eq(true))
        .order_by(rating_reviews::created_at.desc())
        .select(RatingReviewEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get menu item ratings")?;

    attach_responses(conn, ratings).await
}

pub async fn list_restaurant_ratings(
    conn: &mut AsyncPgConnection,
    restaurant_id: i32,
) -> Result<Vec<RatingWithResponse>, AppError> {
    let ratings: Vec<RatingReviewEntity> = rating_reviews::table
        .inner_join(menu_items::table)
        .filter(menu_items::restaurant_id.eq(restaurant_id))
        .filter(rating_reviews::is_visible.eq(true))
        .order_by(rating_reviews::created_at.desc())
        .select(RatingReviewEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get restaurant ratings")?;

    attach_responses(conn, ratings).await
}
