//! End-to-end service flows against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::{
    str::FromStr,
    sync::atomic::{AtomicU32, Ordering},
};

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use tokio::sync::oneshot;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use foodhub_orderservice::{
    app_error::AppError,
    db,
    domain::{
        order_status::{OrderStatus, PaymentMethod, PaymentStatus},
        roles::{Principal, Role},
    },
    models::{
        AddressEntity, CategoryEntity, CreateAddressEntity, CreateCategoryEntity,
        CreateMenuItemEntity, CreateRestaurantEntity, CreateUserEntity, MenuItemEntity,
        RestaurantEntity, UpdateMenuItemEntity, UserEntity,
    },
    schema::{addresses, carts, categories, deliveries, menu_items, restaurants, users},
    services::{
        carts::{self as cart_service, MAX_ITEM_QUANTITY},
        catalog,
        orders::{self, CreateOrderInput},
        ratings::{self, SubmitRatingInput},
        status_history,
    },
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static SEQ: AtomicU32 = AtomicU32::new(0);

fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

struct Fixture {
    customer: UserEntity,
    admin: UserEntity,
    driver: UserEntity,
    address: AddressEntity,
    restaurant: RestaurantEntity,
    pizza: MenuItemEntity,
    soda: MenuItemEntity,
}

impl Fixture {
    fn customer(&self) -> Principal {
        Principal {
            id: self.customer.id,
            role: Role::Customer,
        }
    }

    fn admin(&self) -> Principal {
        Principal {
            id: self.admin.id,
            role: Role::Admin,
        }
    }
}

async fn insert_user(
    conn: &mut AsyncPgConnection,
    name: &str,
    role: &str,
    tag: &str,
) -> UserEntity {
    diesel::insert_into(users::table)
        .values(CreateUserEntity {
            name: name.into(),
            email: format!("{}-{tag}@example.test", name.to_lowercase()),
            phone: None,
            role: role.into(),
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap()
}

async fn connect() -> AsyncPgConnection {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    db::run_migrations_blocking(MIGRATIONS, &url).await.unwrap();
    AsyncPgConnection::establish(&url).await.unwrap()
}

async fn seed(conn: &mut AsyncPgConnection) -> Fixture {
    let tag = format!(
        "{}-{}",
        Utc::now().timestamp_micros(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    );

    let customer = insert_user(conn, "Ada", "customer", &tag).await;
    let admin = insert_user(conn, "Grace", "admin", &tag).await;
    let driver = insert_user(conn, "Dan", "delivery", &tag).await;

    let address: AddressEntity = diesel::insert_into(addresses::table)
        .values(CreateAddressEntity {
            user_id: customer.id,
            label: Some("Home".into()),
            street: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: None,
            is_primary: true,
        })
        .returning(AddressEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();

    let restaurant: RestaurantEntity = diesel::insert_into(restaurants::table)
        .values(CreateRestaurantEntity {
            owner_id: None,
            name: format!("Luigi's {tag}"),
            description: None,
            address: "2 Main St".into(),
            phone: None,
        })
        .returning(RestaurantEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();

    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            restaurant_id: restaurant.id,
            name: "Mains".into(),
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();

    let insert_item = |name: &str, price: &str| CreateMenuItemEntity {
        restaurant_id: restaurant.id,
        category_id: category.id,
        name: name.into(),
        description: None,
        price: dec(price),
        is_available: true,
        image_url: None,
    };
    let pizza_row = insert_item("Pizza", "10.00");
    let soda_row = insert_item("Soda", "2.50");

    let pizza: MenuItemEntity = diesel::insert_into(menu_items::table)
        .values(pizza_row)
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();
    let soda: MenuItemEntity = diesel::insert_into(menu_items::table)
        .values(soda_row)
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();

    Fixture {
        customer,
        admin,
        driver,
        address,
        restaurant,
        pizza,
        soda,
    }
}

fn order_input(cart_id: i32, address_id: i32) -> CreateOrderInput {
    CreateOrderInput {
        cart_id,
        address_id,
        payment_method: PaymentMethod::Card,
        notes: Some("Ring twice".into()),
        tax: dec("2.50"),
        delivery_fee: dec("3.00"),
        discount: dec("0"),
        total_amount: Some(dec("30.50")),
    }
}

/// Cart with two pizzas and two sodas: subtotal 25.00.
async fn filled_cart(conn: &mut AsyncPgConnection, fixture: &Fixture) -> i32 {
    let cart = cart_service::create_cart(conn, fixture.restaurant.id, Some(fixture.customer.id))
        .await
        .unwrap();
    cart_service::add_item(conn, cart.id, Some(fixture.customer.id), fixture.pizza.id, 2)
        .await
        .unwrap();
    cart_service::add_item(conn, cart.id, Some(fixture.customer.id), fixture.soda.id, 2)
        .await
        .unwrap();
    cart.id
}

async fn place_order(conn: &mut AsyncPgConnection, fixture: &Fixture) -> orders::OrderDetail {
    let cart_id = filled_cart(conn, fixture).await;
    orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap()
}

async fn advance(
    conn: &mut AsyncPgConnection,
    fixture: &Fixture,
    order_id: i32,
    statuses: &[OrderStatus],
) {
    for status in statuses {
        orders::update_order_status(conn, order_id, *status, fixture.admin(), None)
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn adding_same_item_twice_merges_quantities() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;

    let cart = cart_service::create_cart(conn, fixture.restaurant.id, Some(fixture.customer.id))
        .await
        .unwrap();
    cart_service::add_item(conn, cart.id, Some(fixture.customer.id), fixture.pizza.id, 1)
        .await
        .unwrap();
    let merged =
        cart_service::add_item(conn, cart.id, Some(fixture.customer.id), fixture.pizza.id, 2)
            .await
            .unwrap();

    assert_eq!(merged.quantity, 3);

    let detail = cart_service::get_cart(conn, cart.id, Some(fixture.customer.id))
        .await
        .unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.subtotal, dec("30.00"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn second_cart_for_same_restaurant_conflicts() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;

    cart_service::create_cart(conn, fixture.restaurant.id, Some(fixture.customer.id))
        .await
        .unwrap();
    let second =
        cart_service::create_cart(conn, fixture.restaurant.id, Some(fixture.customer.id)).await;

    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn checkout_converts_cart_into_order() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;

    let order = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap();

    assert_eq!(order.status, "placed");
    assert_eq!(order.payment_status, "pending");
    assert_eq!(order.subtotal, dec("25.00"));
    assert_eq!(order.total_amount, dec("30.50"));
    assert_eq!(order.items.len(), 2);
    assert!(
        order
            .items
            .iter()
            .any(|item| item.item_name_snapshot == "Pizza" && item.price_at_order == dec("10.00"))
    );
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(order.status_history[0].new_status, "placed");
    assert_eq!(order.status_history[0].previous_status, None);

    let today = Utc::now().format("%y%m%d").to_string();
    assert!(order.order_number.to_string().starts_with(&today));

    let remaining: i64 = carts::table
        .filter(carts::id.eq(cart_id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn checkout_rejects_mismatched_total_and_keeps_cart() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;

    let mut input = order_input(cart_id, fixture.address.id);
    input.total_amount = Some(dec("99.99"));
    let result = orders::create_order_from_cart(conn, fixture.customer.id, input).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    let cart = cart_service::get_cart(conn, cart_id, Some(fixture.customer.id))
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn empty_cart_cannot_be_checked_out() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart = cart_service::create_cart(conn, fixture.restaurant.id, Some(fixture.customer.id))
        .await
        .unwrap();

    let result = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart.id, fixture.address.id),
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_checkouts_get_distinct_order_numbers() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let conn = &mut connect().await;

    let mut jobs = Vec::new();
    for _ in 0..4 {
        let fixture = seed(conn).await;
        let cart_id = filled_cart(conn, &fixture).await;
        let url = url.clone();
        jobs.push(tokio::spawn(async move {
            let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
            orders::create_order_from_cart(
                &mut conn,
                fixture.customer.id,
                order_input(cart_id, fixture.address.id),
            )
            .await
            .unwrap()
            .order_number
        }));
    }

    let mut numbers = Vec::new();
    for job in jobs {
        numbers.push(job.await.unwrap());
    }
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 4);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn lifecycle_follows_allowed_transitions() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;
    let order = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap();

    let skipped = orders::update_order_status(
        conn,
        order.id,
        OrderStatus::Delivered,
        fixture.admin(),
        None,
    )
    .await;
    assert!(matches!(skipped, Err(AppError::BadRequest(_))));

    for status in [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OnTheWay,
    ] {
        orders::update_order_status(conn, order.id, status, fixture.admin(), None)
            .await
            .unwrap();
    }

    let latest = status_history::get_latest_status(conn, order.id, &fixture.customer())
        .await
        .unwrap();
    assert_eq!(latest.new_status, "on_the_way");
    assert_eq!(latest.previous_status.as_deref(), Some("ready"));

    let history = status_history::get_order_status_history(conn, order.id, &fixture.customer())
        .await
        .unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].new_status, "on_the_way");

    let delivered = orders::update_order_status(
        conn,
        order.id,
        OrderStatus::Delivered,
        fixture.admin(),
        None,
    )
    .await
    .unwrap();
    assert_eq!(delivered.status, "delivered");

    let reopened =
        orders::update_order_status(conn, order.id, OrderStatus::Placed, fixture.admin(), None)
            .await;
    assert!(matches!(reopened, Err(AppError::BadRequest(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn other_customers_cannot_see_an_order() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let stranger = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;
    let order = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap();

    let result = orders::get_order(conn, order.id, &stranger.customer()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn payment_marks_paid_and_refund_needs_payment() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;
    let order = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap();

    let refund = orders::update_payment_status(conn, order.id, PaymentStatus::Refunded).await;
    assert!(matches!(refund, Err(AppError::BadRequest(_))));

    let paid = orders::update_payment_status(conn, order.id, PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, "paid");
    assert!(paid.paid_at.is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn delivered_items_can_be_rated_once() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;
    let order = orders::create_order_from_cart(
        conn,
        fixture.customer.id,
        order_input(cart_id, fixture.address.id),
    )
    .await
    .unwrap();

    let early = ratings::submit_rating(
        conn,
        fixture.customer.id,
        order.id,
        SubmitRatingInput {
            menu_item_id: fixture.pizza.id,
            rating: 5,
            review: None,
        },
    )
    .await;
    assert!(matches!(early, Err(AppError::BadRequest(_))));

    for status in [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
    ] {
        orders::update_order_status(conn, order.id, status, fixture.admin(), None)
            .await
            .unwrap();
    }

    let rating = ratings::submit_rating(
        conn,
        fixture.customer.id,
        order.id,
        SubmitRatingInput {
            menu_item_id: fixture.pizza.id,
            rating: 5,
            review: Some("Great crust".into()),
        },
    )
    .await
    .unwrap();

    let again = ratings::submit_rating(
        conn,
        fixture.customer.id,
        order.id,
        SubmitRatingInput {
            menu_item_id: fixture.pizza.id,
            rating: 4,
            review: None,
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    ratings::respond_to_review(conn, rating.id, fixture.admin.id, "Thank you!".into())
        .await
        .unwrap();
    let second_response =
        ratings::respond_to_review(conn, rating.id, fixture.admin.id, "Again".into()).await;
    assert!(matches!(second_response, Err(AppError::BadRequest(_))));

    let listed = ratings::list_restaurant_ratings(conn, fixture.restaurant.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].response.is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn latest_status_follows_commit_order_of_interleaved_updates() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let order = place_order(conn, &fixture).await;

    let (began_tx, began_rx) = oneshot::channel::<()>();
    let (resume_tx, resume_rx) = oneshot::channel::<()>();
    let order_id = order.id;
    let actor = fixture.admin();

    // Opens its transaction before the competing update commits, and writes after it.
    let late_writer = tokio::spawn(async move {
        let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
        conn.transaction(move |conn| {
            Box::pin(async move {
                diesel::sql_query("SELECT 1").execute(conn).await?;
                let _ = began_tx.send(());
                let _ = resume_rx.await;
                orders::update_order_status(conn, order_id, OrderStatus::Cancelled, actor, None)
                    .await?;
                Ok::<(), AppError>(())
            })
        })
        .await
    });

    began_rx.await.unwrap();
    orders::update_order_status(conn, order.id, OrderStatus::Preparing, fixture.admin(), None)
        .await
        .unwrap();
    resume_tx.send(()).unwrap();
    late_writer.await.unwrap().unwrap();

    let current = orders::get_order(conn, order.id, &fixture.customer())
        .await
        .unwrap();
    let latest = status_history::get_latest_status(conn, order.id, &fixture.customer())
        .await
        .unwrap();

    assert_eq!(current.status, "cancelled");
    assert_eq!(latest.new_status, current.status);
    assert_eq!(latest.previous_status.as_deref(), Some("preparing"));
    assert_eq!(current.status_history[0].new_status, "cancelled");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn sub_cent_charges_are_rejected_at_checkout() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let cart_id = filled_cart(conn, &fixture).await;

    let mut input = order_input(cart_id, fixture.address.id);
    input.tax = dec("0.005");
    input.delivery_fee = dec("0.005");
    input.total_amount = None;
    let result = orders::create_order_from_cart(conn, fixture.customer.id, input).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    let cart = cart_service::get_cart(conn, cart_id, Some(fixture.customer.id))
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn merged_quantity_is_capped_per_line() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let caller = Some(fixture.customer.id);
    let cart = cart_service::create_cart(conn, fixture.restaurant.id, caller)
        .await
        .unwrap();

    let overflow = cart_service::add_item(conn, cart.id, caller, fixture.pizza.id, i32::MAX).await;
    assert!(matches!(overflow, Err(AppError::BadRequest(_))));

    cart_service::add_item(conn, cart.id, caller, fixture.pizza.id, MAX_ITEM_QUANTITY)
        .await
        .unwrap();
    let merged = cart_service::add_item(conn, cart.id, caller, fixture.pizza.id, 1).await;
    assert!(matches!(merged, Err(AppError::BadRequest(_))));

    let detail = cart_service::get_cart(conn, cart.id, caller).await.unwrap();
    assert_eq!(detail.items[0].quantity, MAX_ITEM_QUANTITY);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn add_item_keeps_cart_to_one_available_restaurant_menu() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let elsewhere = seed(conn).await;
    let caller = Some(fixture.customer.id);
    let cart = cart_service::create_cart(conn, fixture.restaurant.id, caller)
        .await
        .unwrap();

    let foreign = cart_service::add_item(conn, cart.id, caller, elsewhere.pizza.id, 1).await;
    assert!(matches!(foreign, Err(AppError::BadRequest(_))));

    catalog::update_menu_item(
        conn,
        fixture.soda.id,
        UpdateMenuItemEntity {
            is_available: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let sold_out = cart_service::add_item(conn, cart.id, caller, fixture.soda.id, 1).await;
    assert!(matches!(sold_out, Err(AppError::BadRequest(_))));

    let missing = cart_service::add_item(conn, cart.id, caller, -1, 1).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn price_snapshot_survives_menu_price_change() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let caller = Some(fixture.customer.id);
    let cart = cart_service::create_cart(conn, fixture.restaurant.id, caller)
        .await
        .unwrap();
    cart_service::add_item(conn, cart.id, caller, fixture.pizza.id, 2)
        .await
        .unwrap();

    catalog::update_menu_item(
        conn,
        fixture.pizza.id,
        UpdateMenuItemEntity {
            price: Some(dec("12.00")),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let merged = cart_service::add_item(conn, cart.id, caller, fixture.pizza.id, 1)
        .await
        .unwrap();
    assert_eq!(merged.quantity, 3);
    assert_eq!(merged.price_at_add, dec("10.00"));

    let mut input = order_input(cart.id, fixture.address.id);
    input.total_amount = None;
    let order = orders::create_order_from_cart(conn, fixture.customer.id, input)
        .await
        .unwrap();
    assert_eq!(order.items[0].price_at_order, dec("10.00"));
    assert_eq!(order.subtotal, dec("30.00"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn cart_lines_and_carts_are_scoped_to_their_owner() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let stranger = seed(conn).await;
    let owner = Some(fixture.customer.id);
    let intruder = Some(stranger.customer.id);

    let cart = cart_service::create_cart(conn, fixture.restaurant.id, owner)
        .await
        .unwrap();
    let line = cart_service::add_item(conn, cart.id, owner, fixture.pizza.id, 1)
        .await
        .unwrap();

    assert!(matches!(
        cart_service::update_item(conn, line.id, intruder, 2).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart_service::remove_item(conn, line.id, intruder).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart_service::delete_cart(conn, cart.id, intruder).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart_service::update_item(conn, line.id, None, 2).await,
        Err(AppError::NotFound(_))
    ));

    let updated = cart_service::update_item(conn, line.id, owner, 4).await.unwrap();
    assert_eq!(updated.quantity, 4);
    cart_service::remove_item(conn, line.id, owner).await.unwrap();
    assert!(matches!(
        cart_service::remove_item(conn, line.id, owner).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart_service::update_item(conn, line.id, owner, 1).await,
        Err(AppError::NotFound(_))
    ));

    cart_service::delete_cart(conn, cart.id, owner).await.unwrap();
    assert!(matches!(
        cart_service::delete_cart(conn, cart.id, owner).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn delivery_assignment_checks_driver_and_status() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let order = place_order(conn, &fixture).await;

    let placed = orders::assign_delivery(conn, order.id, fixture.driver.id).await;
    assert!(matches!(placed, Err(AppError::BadRequest(_))));

    advance(conn, &fixture, order.id, &[OrderStatus::Preparing]).await;

    let missing_driver = orders::assign_delivery(conn, order.id, -1).await;
    assert!(matches!(missing_driver, Err(AppError::NotFound(_))));

    let not_a_driver = orders::assign_delivery(conn, order.id, fixture.customer.id).await;
    assert!(matches!(not_a_driver, Err(AppError::BadRequest(_))));

    let missing_order = orders::assign_delivery(conn, -1, fixture.driver.id).await;
    assert!(matches!(missing_order, Err(AppError::NotFound(_))));

    let first = orders::assign_delivery(conn, order.id, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(first.driver_id, fixture.driver.id);

    advance(conn, &fixture, order.id, &[OrderStatus::Ready]).await;
    let other_driver = seed(conn).await.driver;
    let second = orders::assign_delivery(conn, order.id, other_driver.id)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.driver_id, other_driver.id);

    let rows: i64 = deliveries::table
        .filter(deliveries::order_id.eq(order.id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    advance(conn, &fixture, order.id, &[OrderStatus::OnTheWay]).await;
    let late = orders::assign_delivery(conn, order.id, fixture.driver.id).await;
    assert!(matches!(late, Err(AppError::BadRequest(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn same_item_can_be_rated_again_on_another_order() {
    let conn = &mut connect().await;
    let fixture = seed(conn).await;
    let delivered = [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
    ];

    let mut ratings_submitted = Vec::new();
    for stars in [5, 3] {
        let order = place_order(conn, &fixture).await;
        advance(conn, &fixture, order.id, &delivered).await;
        let rating = ratings::submit_rating(
            conn,
            fixture.customer.id,
            order.id,
            SubmitRatingInput {
                menu_item_id: fixture.pizza.id,
                rating: stars,
                review: None,
            },
        )
        .await
        .unwrap();
        ratings_submitted.push(rating.id);
    }

    assert_ne!(ratings_submitted[0], ratings_submitted[1]);
    let listed = ratings::list_menu_item_ratings(conn, fixture.pizza.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
}
