//! services/api/src/seed.rs
//!
//! Static surah reference data compiled into the binary. The memorization
//! mode reads this sequence; nothing in the service ever mutates it.

use dua_companion_core::domain::Surah;

const SURAHS_JSON: &str = include_str!("../seed/surahs.json");

/// Parses the embedded surah catalogue.
pub fn load_surahs() -> Result<Vec<Surah>, serde_json::Error> {
    serde_json::from_str(SURAHS_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalogue_parses() {
        let surahs = load_surahs().unwrap();
        assert!(!surahs.is_empty());
        for surah in &surahs {
            assert!(!surah.verses.is_empty(), "{} has no verses", surah.id);
        }
    }

    #[test]
    fn verse_numbering_is_sequential_within_each_surah() {
        for surah in load_surahs().unwrap() {
            for (i, verse) in surah.verses.iter().enumerate() {
                assert_eq!(verse.verse_number as usize, i + 1);
                assert!(verse.id.starts_with(&surah.id));
            }
        }
    }
}
