use chrono::{DateTime, Utc};

/// Behavior shared by every domain event.
///
/// Events are immutable facts. Once appended they are never edited or
/// removed, so renaming or reshaping one requires a new `version()` rather
/// than a change in place.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type tag, e.g. `"stock.item.adjusted"`. Stored alongside the
    /// payload so streams stay readable without deserializing.
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type, bumped on shape changes.
    fn version(&self) -> u32;

    /// Business time: when the fact happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
