//! In-memory store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ephem_core::{
    Body, BodyId, Center, EphemError, EphemerisStore, InsertOutcome, Position, PositionKey, Result,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Simple in-memory store for testing and development.
///
/// Positions live in a `BTreeMap` keyed by (body, center, time), so a window
/// query is a range scan that already comes back in time order. Everything is
/// lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    bodies: RwLock<HashMap<BodyId, Body>>,
    positions: RwLock<BTreeMap<PositionKey, Position>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored positions.
    pub async fn position_count(&self) -> usize {
        self.positions.read().await.len()
    }
}

#[async_trait]
impl EphemerisStore for InMemoryStore {
    #[instrument(skip(self), fields(body = %id))]
    async fn get_body(&self, id: BodyId) -> Result<Option<Body>> {
        let bodies = self.bodies.read().await;
        let body = bodies.get(&id).cloned();
        debug!(found = body.is_some(), "Body lookup");
        Ok(body)
    }

    #[instrument(skip(self, body), fields(body = %body.id))]
    async fn insert_body(&self, body: &Body) -> Result<()> {
        let mut bodies = self.bodies.write().await;
        bodies.entry(body.id).or_insert_with(|| body.clone());
        Ok(())
    }

    #[instrument(skip(self), fields(body = %body, center = %center))]
    async fn get_positions(
        &self,
        body: BodyId,
        center: &Center,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Position>> {
        if stop < start {
            return Ok(Vec::new());
        }

        let positions = self.positions.read().await;
        let low = PositionKey {
            body,
            center: center.clone(),
            time: start,
        };
        let high = PositionKey {
            body,
            center: center.clone(),
            time: stop,
        };
        let found: Vec<Position> = positions.range(low..=high).map(|(_, p)| p.clone()).collect();

        debug!("Found {} stored positions", found.len());
        Ok(found)
    }

    #[instrument(skip(self, position), fields(body = %position.body, time = %position.time))]
    async fn insert_position(&self, position: &Position) -> Result<InsertOutcome> {
        if !self.bodies.read().await.contains_key(&position.body) {
            return Err(EphemError::Store(format!(
                "unknown body {} for position",
                position.body
            )));
        }

        let mut positions = self.positions.write().await;
        let key = position.key();
        if positions.contains_key(&key) {
            return Ok(InsertOutcome::Conflict);
        }
        positions.insert(key, position.clone());
        Ok(InsertOutcome::Inserted)
    }

    #[instrument(skip(self, position), fields(body = %position.body, time = %position.time))]
    async fn update_position(&self, position: &Position) -> Result<bool> {
        let mut positions = self.positions.write().await;
        match positions.get_mut(&position.key()) {
            Some(stored) => {
                stored.elements = position.elements;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.positions.write().await.clear();
        self.bodies.write().await.clear();
        debug!("Cleared all stored data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use ephem_core::{OrbitalElements, upsert_positions};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn position(body: i64, center: &str, hours: i64, axis: f64) -> Position {
        Position::new(
            BodyId::new(body),
            Center::new(center).unwrap(),
            start() + TimeDelta::hours(hours),
            OrbitalElements {
                semimajor_axis: axis,
                ..Default::default()
            },
        )
    }

    async fn store_with_bodies() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_body(&Body::new(BodyId::new(399), "Earth"))
            .await
            .unwrap();
        store
            .insert_body(&Body::new(BodyId::new(499), "Mars"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_body_keeps_first() {
        let store = InMemoryStore::new();
        let id = BodyId::new(399);
        store.insert_body(&Body::new(id, "Earth")).await.unwrap();
        store.insert_body(&Body::new(id, "Renamed")).await.unwrap();
        assert_eq!(store.get_body(id).await.unwrap().unwrap().name, "Earth");
        assert!(store.get_body(BodyId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_range_scan_is_scoped() {
        let store = store_with_bodies().await;
        let batch = vec![
            position(399, "500@10", 3, 1.0),
            position(399, "500@10", 1, 1.0),
            position(399, "500@0", 2, 1.0),
            position(499, "500@10", 2, 1.0),
            position(399, "500@10", 2, 1.0),
            position(399, "500@10", 9, 1.0),
        ];
        upsert_positions(&store, &batch).await.unwrap();
        assert_eq!(store.position_count().await, 6);

        let center = Center::new("500@10").unwrap();
        let found = store
            .get_positions(
                BodyId::new(399),
                &center,
                start() + TimeDelta::hours(1),
                start() + TimeDelta::hours(3),
            )
            .await
            .unwrap();
        let hours: Vec<_> = found
            .iter()
            .map(|p| (p.time - start()).num_hours())
            .collect();
        assert_eq!(hours, vec![1, 2, 3]);
        assert!(found.iter().all(|p| p.body == BodyId::new(399)));
        assert!(found.iter().all(|p| p.center == center));
    }

    #[tokio::test]
    async fn test_conflict_then_update() {
        let store = store_with_bodies().await;
        let first = position(399, "500@10", 0, 1.0);
        assert_eq!(
            store.insert_position(&first).await.unwrap(),
            InsertOutcome::Inserted
        );

        let refined = position(399, "500@10", 0, 2.0);
        assert_eq!(
            store.insert_position(&refined).await.unwrap(),
            InsertOutcome::Conflict
        );
        assert!(store.update_position(&refined).await.unwrap());
        assert!(
            !store
                .update_position(&position(399, "500@10", 7, 2.0))
                .await
                .unwrap()
        );

        let found = store
            .get_positions(first.body, &first.center, first.time, first.time)
            .await
            .unwrap();
        assert_eq!(found[0].elements.semimajor_axis, 2.0);
    }

    #[tokio::test]
    async fn test_position_for_unknown_body_fails() {
        let store = InMemoryStore::new();
        let err = store
            .insert_position(&position(399, "500@10", 0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EphemError::Store(_)));
    }

    #[tokio::test]
    async fn test_inverted_window_is_empty() {
        let store = store_with_bodies().await;
        store
            .insert_position(&position(399, "500@10", 0, 1.0))
            .await
            .unwrap();
        let found = store
            .get_positions(
                BodyId::new(399),
                &Center::new("500@10").unwrap(),
                start() + TimeDelta::hours(1),
                start(),
            )
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store_with_bodies().await;
        store
            .insert_position(&position(399, "500@10", 0, 1.0))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.position_count().await, 0);
        assert!(store.get_body(BodyId::new(399)).await.unwrap().is_none());
    }
}
