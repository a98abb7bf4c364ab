use rusqlite::{params, Connection, Result as SqlResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use super::data::{ImageRecord, MeasurementRow, TileRecord};

/// The Library manages the SQLite catalog database.
/// It stores detectors, measurements, images and their tiles.
///
/// One connection is opened per run and closed when the Library is dropped.
/// Ids are allocated by the ingestion run, so only one run may write at a time.
pub struct Library {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Library {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    /// The parent directory must already exist.
    pub fn open(db_path: &Path) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;

        info!(path = %db_path.display(), "Database opened");

        let mut library = Library {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Open a private in-memory catalog
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut library = Library { conn, db_path: None };
        library.init_schema()?;
        Ok(library)
    }

    /// Get the path where the database should be stored by default
    /// - Linux: ~/.local/share/tile-ingest/catalog.db
    /// - macOS: ~/Library/Application Support/tile-ingest/catalog.db
    /// - Windows: %APPDATA%\tile-ingest\catalog.db
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("tile-ingest");
        path.push("catalog.db");
        Some(path)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> SqlResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS detector (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                abbreviation    TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS measurement (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                detectorId      INTEGER REFERENCES detector(id),
                abbreviation    TEXT NOT NULL
            )",
            [],
        )?;

        // One image per measurement, instant and file type, so re-running over
        // the same tree is rejected row by row instead of duplicating images
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS image (
                id              INTEGER PRIMARY KEY,
                measurementId   INTEGER NOT NULL REFERENCES measurement(id),
                timestamp       TEXT NOT NULL,
                filetype        TEXT NOT NULL,
                UNIQUE(measurementId, timestamp, filetype)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tile (
                imageId         INTEGER NOT NULL REFERENCES image(id) ON DELETE CASCADE,
                x               INTEGER NOT NULL,
                y               INTEGER NOT NULL,
                zoomLevel       INTEGER NOT NULL,
                url             TEXT,
                content         BLOB,
                PRIMARY KEY (imageId, x, y, zoomLevel)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_image_timestamp
             ON image(timestamp DESC)",
            [],
        )?;

        debug!("Database schema initialized");

        Ok(())
    }

    /// Get the path to the database file (None for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Get a count of images in the catalog
    pub fn image_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM image", [], |row| row.get(0))
    }

    /// Get a count of tiles in the catalog
    pub fn tile_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM tile", [], |row| row.get(0))
    }

    /// All measurements joined with their detector abbreviation
    pub fn measurement_rows(&self) -> SqlResult<Vec<MeasurementRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT detector.abbreviation, measurement.abbreviation, measurement.id
             FROM measurement
             LEFT JOIN detector ON measurement.detectorId = detector.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(MeasurementRow {
                detector: row.get(0)?,
                measurement: row.get(1)?,
                measurement_id: row.get(2)?,
            })
        })?;

        let mut measurements = Vec::new();
        for row in rows {
            measurements.push(row?);
        }

        Ok(measurements)
    }

    /// Highest image id in the catalog, None when the table is empty
    pub fn max_image_id(&self) -> SqlResult<Option<i64>> {
        self.conn
            .query_row("SELECT MAX(id) FROM image", [], |row| row.get(0))
    }

    /// Insert an image row with its pre-allocated id
    pub fn insert_image(&self, image: &ImageRecord) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO image (id, measurementId, timestamp, filetype) VALUES (?1, ?2, ?3, ?4)",
            params![image.id, image.measurement_id, image.timestamp, image.file_type],
        )?;
        Ok(())
    }

    /// Insert a tile row; content is bound as a BLOB parameter
    pub fn insert_tile(&self, tile: &TileRecord) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO tile (imageId, x, y, zoomLevel, url, content) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tile.image_id,
                tile.x,
                tile.y,
                tile.zoom_level,
                tile.payload.url(),
                tile.payload.content(),
            ],
        )?;
        Ok(())
    }

    /// Register a detector/measurement pair, returning the measurement id
    #[cfg(test)]
    pub(crate) fn add_measurement(&self, detector: &str, measurement: &str) -> SqlResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO detector (abbreviation) VALUES (?1)",
            [detector],
        )?;
        self.conn.execute(
            "INSERT INTO measurement (detectorId, abbreviation)
             SELECT id, ?2 FROM detector WHERE abbreviation = ?1",
            [detector, measurement],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
