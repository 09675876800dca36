use serde::{Deserialize, Serialize};

use crate::Capability;

/// Role granted to a principal via its token claims.
///
/// The role-to-capability mapping is static and lives here, not in a policy
/// store. Two roles cover the shop floor: admins run the whole system, stock
/// operators handle day-to-day material and production work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StockOperator,
}

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::StockRead,
    Capability::StockAdjust,
    Capability::ItemsManage,
    Capability::OrdersPlace,
    Capability::OrdersDeliver,
    Capability::ProductionRecord,
    Capability::MachinesManage,
    Capability::ReconcileRun,
];

const STOCK_OPERATOR_CAPABILITIES: &[Capability] = &[
    Capability::StockRead,
    Capability::StockAdjust,
    Capability::OrdersDeliver,
    Capability::ProductionRecord,
];

impl Role {
    /// Capabilities this role grants.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN_CAPABILITIES,
            Role::StockOperator => STOCK_OPERATOR_CAPABILITIES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::StockOperator => "stock_operator",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_covers_every_operator_capability() {
        for capability in Role::StockOperator.capabilities() {
            assert!(Role::Admin.capabilities().contains(capability));
        }
    }

    #[test]
    fn operator_cannot_manage_machines_or_items() {
        let caps = Role::StockOperator.capabilities();
        assert!(!caps.contains(&Capability::MachinesManage));
        assert!(!caps.contains(&Capability::ItemsManage));
        assert!(!caps.contains(&Capability::ReconcileRun));
    }

    #[test]
    fn roles_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::StockOperator).unwrap(),
            "\"stock_operator\""
        );
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
