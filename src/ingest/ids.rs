use crate::error::IngestError;
use crate::state::library::Library;

/// Hands out image ids for one ingestion run.
///
/// The store is queried once; later ids are counted locally. This is only
/// sound while a single ingestion process writes to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    /// Start after the highest existing image id, or at 0 for an empty table
    pub fn from_library(library: &Library) -> Result<Self, IngestError> {
        let next = match library
            .max_image_id()
            .map_err(|e| IngestError::Resolution(e.to_string()))?
        {
            Some(max) => max + 1,
            None => 0,
        };
        Ok(Self::starting_at(next))
    }

    pub fn starting_at(next: i64) -> Self {
        Self { next }
    }

    /// The id the next committed image will receive
    pub fn peek(&self) -> i64 {
        self.next
    }

    /// Consume and return the next id
    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ImageRecord;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_table_starts_at_zero() {
        let library = Library::open_in_memory().unwrap();
        assert_eq!(IdAllocator::from_library(&library).unwrap().peek(), 0);
    }

    #[test]
    fn test_starts_after_max() {
        let library = Library::open_in_memory().unwrap();
        let measurement = library.add_measurement("EIT", "195").unwrap();
        library
            .insert_image(&ImageRecord {
                id: 41,
                measurement_id: measurement,
                timestamp: NaiveDate::from_ymd_opt(2003, 1, 17)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                file_type: "jpg",
            })
            .unwrap();

        let mut ids = IdAllocator::from_library(&library).unwrap();
        assert_eq!(ids.next_id(), 42);
    }

    #[test]
    fn test_sequential_without_gaps() {
        let mut ids = IdAllocator::starting_at(5);
        assert_eq!(ids.peek(), 5);
        assert_eq!(ids.peek(), 5);

        let issued: Vec<i64> = (0..4).map(|_| ids.next_id()).collect();
        assert_eq!(issued, vec![5, 6, 7, 8]);
        assert_eq!(ids.peek(), 9);
    }
}
