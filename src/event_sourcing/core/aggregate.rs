use anyhow::{Context, Result};

use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root
// ============================================================================
//
// An aggregate is a fold over its event stream. `handle_command` decides,
// `apply_*` records. Only applied events change state, and the stream is
// the aggregate's audit log.
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Build the aggregate from the event that opened its stream
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Fold one more event in. Implementations bump `version`.
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Decide which events a command produces; `self` is left untouched
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Stream id in the event store
    fn aggregate_id(&self) -> &str;

    fn version(&self) -> i64;

    /// Replay a stream, oldest event first
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let (first, rest) = events
            .split_first()
            .context("Cannot replay an empty event stream")?;

        let mut aggregate = Self::apply_first_event(&first.event_data)
            .map_err(|e| anyhow::anyhow!("Replay of {} failed at event 1: {}", first.aggregate_id, e))?;

        for envelope in rest {
            aggregate.apply_event(&envelope.event_data).map_err(|e| {
                anyhow::anyhow!(
                    "Replay of {} failed at event {}: {}",
                    envelope.aggregate_id,
                    envelope.sequence_number,
                    e
                )
            })?;
        }

        Ok(aggregate)
    }
}
