use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    RestaurantAdmin,
    Delivery,
}

/// Roles allowed to manage catalog entries and drive the order lifecycle.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::RestaurantAdmin];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::RestaurantAdmin => "restaurant_admin",
            Role::Delivery => "delivery",
        }
    }

    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.contains(self)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "restaurant_admin" => Ok(Role::RestaurantAdmin),
            "delivery" => Ok(Role::Delivery),
            other => Err(anyhow::anyhow!("Unknown role: {other}")),
        }
    }
}

/// Authenticated caller as forwarded by the identity gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: i32,
    pub role: Role,
}

impl Principal {
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}
