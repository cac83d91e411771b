use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(WordId);
id_newtype!(MajorId);

/// Table holding the owner's subject list.
pub const MAJOR_CATEGORY_TABLE: &str = "major_category";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryTable {
    #[default]
    DontknowWord,
    MajorWord,
}

impl CategoryTable {
    pub const ALL: [CategoryTable; 2] = [CategoryTable::DontknowWord, CategoryTable::MajorWord];

    pub fn table_name(self) -> &'static str {
        match self {
            CategoryTable::DontknowWord => "dontknow_word",
            CategoryTable::MajorWord => "major_word",
        }
    }

    pub fn supports_subjects(self) -> bool {
        matches!(self, CategoryTable::MajorWord)
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryTable::DontknowWord => "모르는 단어",
            CategoryTable::MajorWord => "전공 용어",
        }
    }
}

impl fmt::Display for CategoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown word table '{0}'")]
pub struct UnknownTable(pub String);

impl std::str::FromStr for CategoryTable {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dontknow_word" | "dontknow" => Ok(CategoryTable::DontknowWord),
            "major_word" | "major" => Ok(CategoryTable::MajorWord),
            other => Err(UnknownTable(other.to_string())),
        }
    }
}

/// One row of a word table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub id: WordId,
    pub word_en: String,
    #[serde(deserialize_with = "meanings_from_row")]
    pub word_kr: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    #[serde(default)]
    pub is_checked: bool,
}

impl WordRecord {
    pub fn joined_meanings(&self) -> String {
        self.word_kr.join(",")
    }
}

/// Older rows stored the meanings as one joined string instead of a JSON array.
fn meanings_from_row<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Meanings {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Meanings::deserialize(deserializer)? {
        Meanings::List(list) => list,
        Meanings::Joined(joined) if joined.trim().is_empty() => Vec::new(),
        Meanings::Joined(joined) => vec![joined],
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorCategory {
    pub id: MajorId,
    pub major_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}
