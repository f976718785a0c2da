//! SQLite-based store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ephem_core::{
    Body, BodyId, Center, EphemError, EphemerisStore, InsertOutcome, OrbitalElements, Position,
    Result,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Fixed-width, lexicographically sortable timestamp format.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// SQLite-based store for bodies and positions.
///
/// Data persists across restarts. Timestamps are stored as fixed-width UTC
/// text so that string order is time order.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| EphemError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EphemError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| EphemError::Store(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS orbital_body (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                first_ephemeris_date TEXT NOT NULL,
                last_ephemeris_date TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| EphemError::Store(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS orbital_position (
                orbital_body_id INTEGER NOT NULL
                    REFERENCES orbital_body(id) ON DELETE CASCADE,
                center TEXT NOT NULL,
                time TEXT NOT NULL,
                semimajor_axis REAL NOT NULL,
                eccentricity REAL NOT NULL,
                inclination REAL NOT NULL,
                mean_longitude REAL NOT NULL,
                longitude_of_periapsis REAL NOT NULL,
                longitude_of_ascending_node REAL NOT NULL,
                UNIQUE (orbital_body_id, center, time)
            )",
            [],
        )
        .map_err(|e| EphemError::Store(e.to_string()))?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    /// Returns the number of stored positions.
    ///
    /// # Errors
    /// Returns an error if the count query fails.
    pub fn count_positions(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM orbital_position", [], |row| row.get(0))
            .map_err(|e| EphemError::Store(e.to_string()))?;
        usize::try_from(count).map_err(|e| EphemError::Store(e.to_string()))
    }

    /// Convert a timestamp to its stored text form.
    fn time_to_str(time: DateTime<Utc>) -> String {
        time.format(TIME_FORMAT).to_string()
    }

    /// Convert stored text back into a timestamp.
    fn str_to_time(s: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| EphemError::Store(format!("Invalid stored time {s}: {e}")))
    }
}

#[async_trait]
impl EphemerisStore for SqliteStore {
    #[instrument(skip(self), fields(body = %id))]
    async fn get_body(&self, id: BodyId) -> Result<Option<Body>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        let row = conn
            .query_row(
                "SELECT name, first_ephemeris_date, last_ephemeris_date
                 FROM orbital_body WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        match row {
            Some((name, first, last)) => {
                debug!("Found stored body");
                let body = Body::new(id, name)
                    .with_bounds(Self::str_to_time(&first)?, Self::str_to_time(&last)?);
                Ok(Some(body))
            }
            None => {
                debug!("Body not stored");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, body), fields(body = %body.id))]
    async fn insert_body(&self, body: &Body) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        conn.execute(
            "INSERT INTO orbital_body (id, name, first_ephemeris_date, last_ephemeris_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO NOTHING",
            params![
                body.id.get(),
                body.name,
                Self::time_to_str(body.first_ephemeris_date),
                Self::time_to_str(body.last_ephemeris_date)
            ],
        )
        .map_err(|e| EphemError::Store(e.to_string()))?;

        debug!("Stored body {}", body);
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
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT time, semimajor_axis, eccentricity, inclination, mean_longitude,
                        longitude_of_periapsis, longitude_of_ascending_node
                 FROM orbital_position
                 WHERE orbital_body_id = ?1 AND center = ?2 AND time >= ?3 AND time <= ?4
                 ORDER BY time ASC",
            )
            .map_err(|e| EphemError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    body.get(),
                    center.as_str(),
                    Self::time_to_str(start),
                    Self::time_to_str(stop)
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        OrbitalElements {
                            semimajor_axis: row.get(1)?,
                            eccentricity: row.get(2)?,
                            inclination: row.get(3)?,
                            mean_longitude: row.get(4)?,
                            longitude_of_periapsis: row.get(5)?,
                            longitude_of_ascending_node: row.get(6)?,
                        },
                    ))
                },
            )
            .map_err(|e| EphemError::Store(e.to_string()))?;

        let mut positions = Vec::new();
        for row in rows {
            let (time, elements) = row.map_err(|e| EphemError::Store(e.to_string()))?;
            positions.push(Position::new(
                body,
                center.clone(),
                Self::str_to_time(&time)?,
                elements,
            ));
        }

        debug!("Found {} stored positions", positions.len());
        Ok(positions)
    }

    #[instrument(skip(self, position), fields(body = %position.body, time = %position.time))]
    async fn insert_position(&self, position: &Position) -> Result<InsertOutcome> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;
        let e = &position.elements;

        let changed = conn
            .execute(
                "INSERT INTO orbital_position
                 (orbital_body_id, center, time, semimajor_axis, eccentricity, inclination,
                  mean_longitude, longitude_of_periapsis, longitude_of_ascending_node)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(orbital_body_id, center, time) DO NOTHING",
                params![
                    position.body.get(),
                    position.center.as_str(),
                    Self::time_to_str(position.time),
                    e.semimajor_axis,
                    e.eccentricity,
                    e.inclination,
                    e.mean_longitude,
                    e.longitude_of_periapsis,
                    e.longitude_of_ascending_node
                ],
            )
            .map_err(|e| EphemError::Store(e.to_string()))?;

        if changed == 0 {
            Ok(InsertOutcome::Conflict)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip(self, position), fields(body = %position.body, time = %position.time))]
    async fn update_position(&self, position: &Position) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;
        let e = &position.elements;

        let changed = conn
            .execute(
                "UPDATE orbital_position
                 SET semimajor_axis = ?4, eccentricity = ?5, inclination = ?6,
                     mean_longitude = ?7, longitude_of_periapsis = ?8,
                     longitude_of_ascending_node = ?9
                 WHERE orbital_body_id = ?1 AND center = ?2 AND time = ?3",
                params![
                    position.body.get(),
                    position.center.as_str(),
                    Self::time_to_str(position.time),
                    e.semimajor_axis,
                    e.eccentricity,
                    e.inclination,
                    e.mean_longitude,
                    e.longitude_of_periapsis,
                    e.longitude_of_ascending_node
                ],
            )
            .map_err(|e| EphemError::Store(e.to_string()))?;

        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EphemError::Store(e.to_string()))?;

        conn.execute("DELETE FROM orbital_position", [])
            .map_err(|e| EphemError::Store(e.to_string()))?;
        conn.execute("DELETE FROM orbital_body", [])
            .map_err(|e| EphemError::Store(e.to_string()))?;

        debug!("Cleared all stored data");
        Ok(())
    }
}
