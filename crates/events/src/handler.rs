/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` returns events (pure, no mutation)
/// 2. **Evolve**: each event is applied to the aggregate via `aggregate.apply(event)`
///
/// The aggregate maintains its own version tracking during `apply()`,
/// typically +1 per applied event.
///
/// This mutates the aggregate in place and skips persistence/publication.
/// Useful in tests and inline workflows; production paths go through the
/// command dispatcher, which adds persistence, optimistic concurrency, and
/// publication.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: moldtrack_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
