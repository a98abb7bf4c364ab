use std::collections::HashMap;
use tracing::debug;

use crate::error::IngestError;
use crate::state::library::Library;

/// Measurement ids keyed by detector + measurement abbreviation (e.g. "EIT195")
#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    ids: HashMap<String, i64>,
}

impl MeasurementTable {
    /// Load every detector/measurement pair with a single join query.
    ///
    /// Any failure here is fatal for the run: no image can be inserted
    /// without its measurement id.
    pub fn load(library: &Library) -> Result<Self, IngestError> {
        let rows = library
            .measurement_rows()
            .map_err(|e| IngestError::Resolution(e.to_string()))?;

        let mut ids = HashMap::with_capacity(rows.len());
        for row in rows {
            let detector = row.detector.ok_or_else(|| {
                IngestError::Resolution(format!(
                    "measurement {} ('{}') has no detector",
                    row.measurement_id, row.measurement
                ))
            })?;
            ids.insert(format!("{}{}", detector, row.measurement), row.measurement_id);
        }

        debug!(count = ids.len(), "Measurement table loaded");

        Ok(Self { ids })
    }

    pub fn lookup(&self, key: &str) -> Result<i64, IngestError> {
        self.ids
            .get(key)
            .copied()
            .ok_or_else(|| IngestError::UnknownMeasurement { key: key.to_string() })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_concatenate_detector_and_measurement() {
        let library = Library::open_in_memory().unwrap();
        let eit = library.add_measurement("EIT", "195").unwrap();
        let c2 = library.add_measurement("0C2", "0WL").unwrap();

        let table = MeasurementTable::load(&library).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("EIT195").unwrap(), eit);
        assert_eq!(table.lookup("0C20WL").unwrap(), c2);
    }

    #[test]
    fn test_unknown_key() {
        let library = Library::open_in_memory().unwrap();
        let table = MeasurementTable::load(&library).unwrap();

        assert!(table.is_empty());
        assert!(matches!(
            table.lookup("AIA304"),
            Err(IngestError::UnknownMeasurement { key }) if key == "AIA304"
        ));
    }

    #[test]
    fn test_query_failure_is_resolution_error() {
        let library = Library::open_in_memory().unwrap();
        library.conn().execute_batch("DROP TABLE measurement;").unwrap();

        assert!(matches!(
            MeasurementTable::load(&library),
            Err(IngestError::Resolution(_))
        ));
    }

    #[test]
    fn test_missing_detector_is_resolution_error() {
        let library = Library::open_in_memory().unwrap();
        library
            .conn()
            .execute("INSERT INTO measurement (detectorId, abbreviation) VALUES (NULL, '195')", [])
            .unwrap();

        assert!(matches!(
            MeasurementTable::load(&library),
            Err(IngestError::Resolution(_))
        ));
    }
}
