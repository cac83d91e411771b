//! Client-side text filter over an already fetched page.
//!
//! Only the rows of the current page are searched; rows on other pages are
//! never considered.

use shared::domain::WordRecord;

/// Normalized form of the search box contents. Empty means "no filter".
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Case-insensitive substring match on the English term or the joined meanings.
/// `needle` must already be normalized.
pub fn matches_query(record: &WordRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.word_en.to_lowercase().contains(needle)
        || record.joined_meanings().to_lowercase().contains(needle)
}

/// Rows of `items` matching `query`, in their original order.
pub fn filter_page(items: &[WordRecord], query: &str) -> Vec<WordRecord> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|record| matches_query(record, &needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::domain::{UserId, WordId};
    use uuid::Uuid;

    use super::*;

    fn word(en: &str, kr: &[&str]) -> WordRecord {
        WordRecord {
            id: WordId(Uuid::new_v4()),
            word_en: en.to_string(),
            word_kr: kr.iter().map(|m| m.to_string()).collect(),
            comment: None,
            category: None,
            major_name: None,
            created_at: Utc::now(),
            user_id: UserId(Uuid::nil()),
            is_checked: false,
        }
    }

    #[test]
    fn empty_query_returns_page_unchanged() {
        let page = vec![word("Apple", &["사과"]), word("Banana", &["바나나"])];
        assert_eq!(filter_page(&page, ""), page);
        assert_eq!(filter_page(&page, "   "), page);
    }

    #[test]
    fn matches_english_case_insensitively() {
        let page = vec![word("Apple", &["사과"]), word("Banana", &["바나나"])];
        let visible = filter_page(&page, "ap");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].word_en, "Apple");

        assert_eq!(filter_page(&page, " APP ").len(), 1);
    }

    #[test]
    fn matches_any_meaning_and_keeps_order() {
        let page = vec![
            word("comprise", &["이루다", "포함하다"]),
            word("include", &["포함하다"]),
            word("exclude", &["제외하다"]),
        ];
        let visible = filter_page(&page, "포함");
        let terms: Vec<_> = visible.iter().map(|w| w.word_en.as_str()).collect();
        assert_eq!(terms, vec!["comprise", "include"]);
    }

    #[test]
    fn no_match_yields_empty_page() {
        let page = vec![word("Apple", &["사과"])];
        assert!(filter_page(&page, "zebra").is_empty());
    }
}
