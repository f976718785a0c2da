//! Insert-or-update merging of fetched positions.
//!
//! Fresh rows from the remote source often overlap rows that are already
//! cached. Each row is inserted on its own; a key conflict turns into an
//! update of the six elements. There is no batch transaction: rows processed
//! before a failure stay merged.

use tracing::{debug, instrument};

use crate::{
    error::{EphemError, Result},
    store::{EphemerisStore, InsertOutcome},
    types::Position,
};

/// Counts of rows written by [`upsert_positions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows stored under a new key.
    pub inserted: usize,
    /// Rows whose key already existed and whose elements were overwritten.
    pub updated: usize,
}

impl MergeStats {
    /// Total number of rows written.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Inserts every position, updating in place when its key already exists.
///
/// # Errors
/// Returns the first store error. Rows merged before it remain stored.
#[instrument(skip(store, positions), fields(count = positions.len()))]
pub async fn upsert_positions<S>(store: &S, positions: &[Position]) -> Result<MergeStats>
where
    S: EphemerisStore + ?Sized,
{
    let mut stats = MergeStats::default();

    for position in positions {
        match store.insert_position(position).await? {
            InsertOutcome::Inserted => stats.inserted += 1,
            InsertOutcome::Conflict => {
                if !store.update_position(position).await? {
                    // Removed between the insert and the update.
                    return Err(EphemError::Store(format!(
                        "position {} {} {} vanished during update",
                        position.body, position.center, position.time
                    )));
                }
                stats.updated += 1;
            }
        }
    }

    debug!(
        inserted = stats.inserted,
        updated = stats.updated,
        "Merged positions"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Body, BodyId, Center, OrbitalElements, PositionKey};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Minimal map-backed store for exercising the merge logic.
    #[derive(Default)]
    struct MapStore {
        rows: Mutex<BTreeMap<PositionKey, Position>>,
        fail_after: Option<usize>,
        writes: Mutex<usize>,
    }

    impl MapStore {
        fn failing_after(writes: usize) -> Self {
            Self {
                fail_after: Some(writes),
                ..Default::default()
            }
        }

        fn count_write(&self) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_after == Some(*writes) {
                return Err(EphemError::Store("disk full".to_string()));
            }
            *writes += 1;
            Ok(())
        }

        fn rows(&self) -> Vec<Position> {
            self.rows.lock().unwrap().values().cloned().collect()
        }
    }

    #[async_trait]
    impl EphemerisStore for MapStore {
        async fn get_body(&self, _id: BodyId) -> Result<Option<Body>> {
            Ok(None)
        }

        async fn insert_body(&self, _body: &Body) -> Result<()> {
            Ok(())
        }

        async fn get_positions(
            &self,
            _body: BodyId,
            _center: &Center,
            _start: DateTime<Utc>,
            _stop: DateTime<Utc>,
        ) -> Result<Vec<Position>> {
            Ok(self.rows())
        }

        async fn insert_position(&self, position: &Position) -> Result<InsertOutcome> {
            self.count_write()?;
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&position.key()) {
                return Ok(InsertOutcome::Conflict);
            }
            rows.insert(position.key(), position.clone());
            Ok(InsertOutcome::Inserted)
        }

        async fn update_position(&self, position: &Position) -> Result<bool> {
            self.count_write()?;
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&position.key()) {
                Some(row) => {
                    row.elements = position.elements;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn clear(&self) -> Result<()> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
    }

    fn position(day: i64, axis: f64) -> Position {
        Position::new(
            BodyId::new(399),
            Center::new("500@10").unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + TimeDelta::days(day),
            OrbitalElements {
                semimajor_axis: axis,
                eccentricity: 0.1,
                inclination: 0.2,
                mean_longitude: 0.3,
                longitude_of_periapsis: 0.4,
                longitude_of_ascending_node: 0.5,
            },
        )
    }

    #[tokio::test]
    async fn test_novel_keys_are_inserted() {
        let store = MapStore::default();
        let stats = upsert_positions(&store, &[position(0, 1.0), position(1, 1.0)])
            .await
            .unwrap();
        assert_eq!(stats, MergeStats { inserted: 2, updated: 0 });
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_key_updates_elements_only() {
        let store = MapStore::default();
        upsert_positions(&store, &[position(0, 1.0)]).await.unwrap();

        let refined = position(0, 1.5);
        let batch = [refined.clone(), position(1, 2.0)];
        let stats = upsert_positions(&store, &batch).await.unwrap();

        assert_eq!(stats, MergeStats { inserted: 1, updated: 1 });
        assert_eq!(stats.total(), batch.len());

        let rows = store.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key(), refined.key());
        assert_eq!(rows[0].elements.semimajor_axis, 1.5);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_rows() {
        let store = MapStore::failing_after(2);
        let batch = [position(0, 1.0), position(1, 1.0), position(2, 1.0)];
        let err = upsert_positions(&store, &batch).await.unwrap_err();
        assert!(matches!(err, EphemError::Store(_)));
        assert_eq!(store.rows().len(), 2);
    }
}
