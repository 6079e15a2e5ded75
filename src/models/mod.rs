use serde::{Deserialize, Serialize};

/// One merged rating row: a user's rating of a titled movie.
///
/// The timestamp is carried through from the source files but is not used
/// when computing recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub movie_id: u32,
    pub title: String,
    pub user_id: u32,
    pub rating: f64,
    pub timestamp: i64,
}

/// Immutable snapshot of the full merged ratings dataset.
///
/// Built once by the dataset loader and shared read-only across request
/// handlers; never mutated after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingTable {
    pub records: Vec<RatingRecord>,
}

impl RatingTable {
    pub fn new(records: Vec<RatingRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-movie aggregates over the full rating matrix column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovieStats {
    /// Number of users who rated the movie
    pub count: usize,
    /// Mean rating across those users
    pub mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: u32, title: &str, rating: f64) -> RatingRecord {
        RatingRecord {
            movie_id: 1,
            title: title.to_string(),
            user_id,
            rating,
            timestamp: 881250949,
        }
    }

    #[test]
    fn test_rating_table_len() {
        let table = RatingTable::new(vec![
            record(1, "Toy Story (1995)", 4.0),
            record(2, "Toy Story (1995)", 3.0),
        ]);
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
        assert!(RatingTable::default().is_empty());
    }

    #[test]
    fn test_rating_record_serde_round_trip() {
        let original = record(196, "Kolya (1996)", 3.0);
        let json = serde_json::to_string(&original).unwrap();
        let back: RatingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
