//! Pure business rules shared by the services: the order state machine, order-number
//! derivation, money arithmetic and caller roles. Nothing here touches the database.

pub mod order_number;
pub mod order_status;
pub mod pricing;
pub mod roles;
