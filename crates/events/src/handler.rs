use lexbill_core::Aggregate;

/// Runs a command against an aggregate and applies the resulting events.
///
/// Returns the produced events so callers can persist or publish them.
/// The aggregate is left unchanged when the command is rejected.
pub fn execute<A: Aggregate>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error> {
    let events = aggregate.handle(command)?;
    for event in &events {
        aggregate.apply(event);
    }
    Ok(events)
}
