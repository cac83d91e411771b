use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{UserId, WordRecord};

/// Insert payload for a word table row. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWord {
    pub word_en: String,
    pub word_kr: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_name: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Partial update for a word row. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_kr: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checked: Option<bool>,
}

impl WordPatch {
    pub fn checked(is_checked: bool) -> Self {
        Self {
            is_checked: Some(is_checked),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch to a locally held copy of the row.
    pub fn apply_to(&self, record: &mut WordRecord) {
        if let Some(word_en) = &self.word_en {
            record.word_en = word_en.clone();
        }
        if let Some(word_kr) = &self.word_kr {
            record.word_kr = word_kr.clone();
        }
        if let Some(comment) = &self.comment {
            record.comment = comment.clone();
        }
        if let Some(category) = &self.category {
            record.category = category.clone();
        }
        if let Some(major_name) = &self.major_name {
            record.major_name = major_name.clone();
        }
        if let Some(is_checked) = self.is_checked {
            record.is_checked = is_checked;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMajorCategory {
    pub major_name: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorRename {
    pub major_name: String,
}
