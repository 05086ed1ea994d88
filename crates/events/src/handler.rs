/// Execute an aggregate command in memory: decide, then evolve.
///
/// 1. `aggregate.handle(command)` produces events without touching state.
/// 2. Each event is applied through `aggregate.apply(event)`.
///
/// No persistence and no publication happen here; use the infra
/// `CommandDispatcher` for the full pipeline. On error nothing is applied.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storefront_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
