use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Staff,
    QualitySupervisor,
    PhysicalSupervisor,
    InventoryStaff,
    FinancialAccount,
    Manager,
    Owner,
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Staff,
        Role::QualitySupervisor,
        Role::PhysicalSupervisor,
        Role::InventoryStaff,
        Role::FinancialAccount,
        Role::Manager,
        Role::Owner,
        Role::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::QualitySupervisor => "quality_supervisor",
            Role::PhysicalSupervisor => "physical_supervisor",
            Role::InventoryStaff => "inventory_staff",
            Role::FinancialAccount => "financial_account",
            Role::Manager => "manager",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }

    /// Admin passes every role gate.
    pub fn satisfies(self, allowed: &[Role]) -> bool {
        self == Role::Admin || allowed.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let role = match normalized.as_str() {
            "staff" => Role::Staff,
            "quality_supervisor" | "quality" => Role::QualitySupervisor,
            "physical_supervisor" | "physical" => Role::PhysicalSupervisor,
            "inventory_staff" | "inventory" => Role::InventoryStaff,
            "financial_account" | "accounts" => Role::FinancialAccount,
            "manager" => Role::Manager,
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            _ => {
                return Err(ParseRoleError {
                    value: value.to_string(),
                })
            }
        };
        Ok(role)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Role::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role '{value}': expected one of {}", expected_roles())]
pub struct ParseRoleError {
    value: String,
}

fn expected_roles() -> String {
    Role::ALL
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Who is performing a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("actor user name cannot be empty")]
pub struct EmptyActorError;

impl Actor {
    pub fn new(user: &str, role: Role) -> Result<Self, EmptyActorError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(EmptyActorError);
        }
        Ok(Self {
            user: user.to_string(),
            role,
        })
    }
}
