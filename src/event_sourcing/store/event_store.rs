use std::collections::HashMap;
use std::marker::PhantomData;
use anyhow::{Result, bail};
use tokio::sync::RwLock;

use crate::event_sourcing::core::{DomainEvent, EventEnvelope, Aggregate};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// Responsibilities:
// 1. Append events to a per-aggregate stream (append-only)
// 2. Load event history for aggregates
// 3. Optimistic concurrency control: the expected-version check and the
//    append happen under one write lock, so two writers racing on the same
//    stream cannot both succeed
//
// Streams live in process memory. The storage technology behind the
// engine is not part of this crate.
//
// ============================================================================

pub struct EventStore<E: DomainEvent> {
    streams: RwLock<HashMap<String, Vec<EventEnvelope<E>>>>,
    aggregate_type_name: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(aggregate_type_name: &str) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub fn aggregate_type_name(&self) -> &str {
        &self.aggregate_type_name
    }

    /// Append events to the event store.
    /// Returns the new version number after appending.
    pub async fn append_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64> {
        if events.is_empty() {
            bail!("Cannot append empty event list");
        }

        if let Some(foreign) = events.iter().find(|e| e.aggregate_id != aggregate_id) {
            bail!(
                "Event {} belongs to {}, not {}",
                foreign.event_id,
                foreign.aggregate_id,
                aggregate_id
            );
        }

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id.to_string()).or_default();

        let current_version = stream.last().map(|e| e.sequence_number).unwrap_or(0);
        if current_version != expected_version {
            bail!(
                "Concurrency conflict on {} {}: expected version {}, but current is {}",
                self.aggregate_type_name,
                aggregate_id,
                expected_version,
                current_version
            );
        }

        let mut new_version = expected_version;
        for mut envelope in events {
            new_version += 1;
            envelope.sequence_number = new_version;
            stream.push(envelope);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            "Appended events to event store"
        );

        Ok(new_version)
    }

    /// Load all events for an aggregate, oldest first
    pub async fn load_events(&self, aggregate_id: &str) -> Result<Vec<EventEnvelope<E>>> {
        let streams = self.streams.read().await;
        Ok(streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    pub async fn get_current_version(&self, aggregate_id: &str) -> Result<i64> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0))
    }

    /// Load aggregate from events; `None` when the stream does not exist
    pub async fn load_aggregate<A>(&self, aggregate_id: &str) -> Result<Option<A>>
    where
        A: Aggregate<Event = E>,
        <A as Aggregate>::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await?;

        if events.is_empty() {
            return Ok(None);
        }

        A::load_from_events(events).map(Some)
    }

    pub async fn aggregate_exists(&self, aggregate_id: &str) -> Result<bool> {
        let version = self.get_current_version(aggregate_id).await?;
        Ok(version > 0)
    }

    /// Ids of every stream in the store
    pub async fn aggregate_ids(&self) -> Result<Vec<String>> {
        let streams = self.streams.read().await;
        Ok(streams
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
