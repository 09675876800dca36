use serde::{Deserialize, Serialize};

/// A single action a principal may be allowed to perform.
///
/// Capabilities are the unit of authorization: routes declare the capability
/// they require and [`crate::authorize`] checks it against the principal's
/// roles. The set is closed; new operations get a new variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Read stock levels, movements, and item details.
    #[serde(rename = "stock.read")]
    StockRead,

    /// Book stock movements (intake, deduction, correction).
    #[serde(rename = "stock.adjust")]
    StockAdjust,

    /// Register, link, and retire stock items.
    #[serde(rename = "items.manage")]
    ItemsManage,

    /// Place customer orders.
    #[serde(rename = "orders.place")]
    OrdersPlace,

    /// Deliver orders (deduct stock and flip order status).
    #[serde(rename = "orders.deliver")]
    OrdersDeliver,

    /// Record production runs.
    #[serde(rename = "production.record")]
    ProductionRecord,

    /// Register and decommission machines.
    #[serde(rename = "machines.manage")]
    MachinesManage,

    /// Run the ledger-versus-read-model reconciliation audit.
    #[serde(rename = "reconcile.run")]
    ReconcileRun,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::StockRead => "stock.read",
            Capability::StockAdjust => "stock.adjust",
            Capability::ItemsManage => "items.manage",
            Capability::OrdersPlace => "orders.place",
            Capability::OrdersDeliver => "orders.deliver",
            Capability::ProductionRecord => "production.record",
            Capability::MachinesManage => "machines.manage",
            Capability::ReconcileRun => "reconcile.run",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
