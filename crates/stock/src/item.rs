use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moldtrack_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UniqueCode, UserId};
use moldtrack_events::Event;

/// Stock item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(pub AggregateId);

impl StockItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What kind of stock-bearing item this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Sellable assembly tracked by a unique code (scanned at intake).
    Kit,
    /// Individually produced component, may be consumed into kits.
    Mold,
    /// Raw material tracked by weight.
    Material,
}

/// Unit of measure for the on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Pieces,
    Kilograms,
}

/// Movement direction of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// The signed delta this direction applies for a positive quantity.
    pub fn signed(self, quantity: i64) -> i64 {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

/// Bill-of-materials link: how many units of a component are consumed per
/// kit unit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLink {
    pub component_id: StockItemId,
    pub quantity_required: i64,
}

/// Aggregate root: StockItem.
///
/// Owns the on-hand quantity. The quantity changes only through
/// `AdjustStock`; each successful adjustment is one `StockAdjusted` event,
/// so the stream of adjustments is the movement ledger and
/// `quantity == initial + Σ signed(adjustments)` holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    kind: ItemKind,
    code: Option<UniqueCode>,
    name: String,
    unit: Unit,
    quantity: i64,
    components: Vec<ComponentLink>,
    retired: bool,
    version: u64,
    registered: bool,
}

impl StockItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            kind: ItemKind::Kit,
            code: None,
            name: String::new(),
            unit: Unit::Pieces,
            quantity: 0,
            components: Vec::new(),
            retired: false,
            version: 0,
            registered: false,
        }
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn code(&self) -> Option<&UniqueCode> {
        self.code.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn components(&self) -> &[ComponentLink] {
        &self.components
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub item_id: StockItemId,
    pub kind: ItemKind,
    pub code: Option<UniqueCode>,
    pub name: String,
    pub unit: Unit,
    pub initial_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: StockItemId,
    pub direction: Direction,
    pub quantity: i64,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkComponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkComponent {
    pub item_id: StockItemId,
    pub component_id: StockItemId,
    pub quantity_required: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireItem {
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    RegisterItem(RegisterItem),
    AdjustStock(AdjustStock),
    LinkComponent(LinkComponent),
    RetireItem(RetireItem),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: StockItemId,
    pub kind: ItemKind,
    pub code: Option<UniqueCode>,
    pub name: String,
    pub unit: Unit,
    pub initial_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
///
/// This event is the movement-ledger entry: direction, positive quantity,
/// acting user, and an optional note, immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: StockItemId,
    pub direction: Direction,
    pub quantity: i64,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockAdjusted {
    pub fn signed_delta(&self) -> i64 {
        self.direction.signed(self.quantity)
    }
}

/// Event: ComponentLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLinked {
    pub item_id: StockItemId,
    pub component_id: StockItemId,
    pub quantity_required: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRetired {
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    ItemRegistered(ItemRegistered),
    StockAdjusted(StockAdjusted),
    ComponentLinked(ComponentLinked),
    ItemRetired(ItemRetired),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::ItemRegistered(_) => "stock.item.registered",
            StockEvent::StockAdjusted(_) => "stock.item.adjusted",
            StockEvent::ComponentLinked(_) => "stock.item.component_linked",
            StockEvent::ItemRetired(_) => "stock.item.retired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::ItemRegistered(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
            StockEvent::ComponentLinked(e) => e.occurred_at,
            StockEvent::ItemRetired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.kind = e.kind;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.unit = e.unit;
                self.quantity = e.initial_quantity;
                self.components.clear();
                self.retired = false;
                self.registered = true;
            }
            StockEvent::StockAdjusted(e) => {
                self.quantity += e.signed_delta();
            }
            StockEvent::ComponentLinked(e) => {
                self.components.push(ComponentLink {
                    component_id: e.component_id,
                    quantity_required: e.quantity_required,
                });
            }
            StockEvent::ItemRetired(_) => {
                self.retired = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::RegisterItem(cmd) => self.handle_register(cmd),
            StockCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            StockCommand::LinkComponent(cmd) => self.handle_link_component(cmd),
            StockCommand::RetireItem(cmd) => self.handle_retire(cmd),
        }
    }
}

impl StockItem {
    fn ensure_item_id(&self, item_id: StockItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.registered {
            return Err(DomainError::not_found());
        }
        if self.retired {
            return Err(DomainError::invariant("item is retired"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<StockEvent>, DomainError> {
        if self.registered {
            return Err(DomainError::conflict("item already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        if cmd.kind == ItemKind::Kit && cmd.code.is_none() {
            return Err(DomainError::validation("kits require a unique code"));
        }

        Ok(vec![StockEvent::ItemRegistered(ItemRegistered {
            item_id: cmd.item_id,
            kind: cmd.kind,
            code: cmd.code.clone(),
            name: cmd.name.clone(),
            unit: cmd.unit,
            initial_quantity: cmd.initial_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        // Rejecting negative-stock policy, applied uniformly across flows.
        let new_quantity = self.quantity + cmd.direction.signed(cmd.quantity);
        if new_quantity < 0 {
            return Err(DomainError::validation(format!(
                "insufficient stock: {} on hand, {} requested out",
                self.quantity, cmd.quantity
            )));
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            item_id: cmd.item_id,
            direction: cmd.direction,
            quantity: cmd.quantity,
            actor_id: cmd.actor_id,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_component(&self, cmd: &LinkComponent) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_item_id(cmd.item_id)?;

        if self.kind != ItemKind::Kit {
            return Err(DomainError::invariant(
                "only kits carry bill-of-materials links",
            ));
        }
        if cmd.component_id == self.id {
            return Err(DomainError::validation("kit cannot contain itself"));
        }
        if cmd.quantity_required <= 0 {
            return Err(DomainError::validation("quantity_required must be positive"));
        }
        if self
            .components
            .iter()
            .any(|c| c.component_id == cmd.component_id)
        {
            return Err(DomainError::conflict("component already linked"));
        }

        Ok(vec![StockEvent::ComponentLinked(ComponentLinked {
            item_id: cmd.item_id,
            component_id: cmd.component_id,
            quantity_required: cmd.quantity_required,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireItem) -> Result<Vec<StockEvent>, DomainError> {
        // Cross-aggregate references (BOM links from other kits, open order
        // lines) are checked by the retirement service before dispatch; the
        // aggregate only guards its own lifecycle.
        self.ensure_active()?;
        self.ensure_item_id(cmd.item_id)?;

        Ok(vec![StockEvent::ItemRetired(ItemRetired {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
