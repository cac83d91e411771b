//! Seams to the hosted table API.
//!
//! The list controller and the editors only ever talk to these traits; the
//! HTTP implementation lives in [`crate::rest`].

use async_trait::async_trait;
use shared::{
    domain::{CategoryTable, MajorCategory, MajorId, UserId, WordId, WordRecord},
    protocol::{NewMajorCategory, NewWord, WordPatch},
};

use crate::error::StoreError;

/// Equality filters applied to both the count and the ranged fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: CategoryTable,
    pub owner: UserId,
    pub subject: Option<String>,
    pub checked: Option<bool>,
}

impl TableQuery {
    pub fn new(table: CategoryTable, owner: UserId) -> Self {
        Self {
            table,
            owner,
            subject: None,
            checked: None,
        }
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_checked(mut self, checked: Option<bool>) -> Self {
        self.checked = checked;
        self
    }

    /// Whether `record` would be returned by this query.
    pub fn matches(&self, table: CategoryTable, record: &WordRecord) -> bool {
        table == self.table
            && record.user_id == self.owner
            && self
                .subject
                .as_ref()
                .map_or(true, |subject| record.major_name.as_ref() == Some(subject))
            && self.checked.map_or(true, |checked| record.is_checked == checked)
    }

    /// `column=eq.value` pairs in the table API's filter syntax.
    pub fn filter_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("user_id", format!("eq.{}", self.owner))];
        if let Some(subject) = &self.subject {
            pairs.push(("major_name", format!("eq.{subject}")));
        }
        if let Some(checked) = self.checked {
            pairs.push(("is_checked", format!("eq.{checked}")));
        }
        pairs
    }
}

/// Inclusive row window `[offset, offset + limit - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub offset: u64,
    pub limit: u64,
}

impl RowRange {
    pub fn last(&self) -> u64 {
        (self.offset + self.limit).saturating_sub(1)
    }
}

#[async_trait]
pub trait RemoteTableStore: Send + Sync {
    async fn count(&self, query: &TableQuery) -> Result<u64, StoreError>;

    /// Rows ordered by `created_at` descending.
    async fn fetch_page(
        &self,
        query: &TableQuery,
        range: RowRange,
    ) -> Result<Vec<WordRecord>, StoreError>;

    async fn insert_word(
        &self,
        table: CategoryTable,
        word: &NewWord,
    ) -> Result<WordRecord, StoreError>;

    async fn update_word(
        &self,
        table: CategoryTable,
        id: WordId,
        owner: UserId,
        patch: &WordPatch,
    ) -> Result<(), StoreError>;

    async fn delete_word(
        &self,
        table: CategoryTable,
        id: WordId,
        owner: UserId,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MajorCategoryStore: Send + Sync {
    async fn list_majors(&self, owner: UserId) -> Result<Vec<MajorCategory>, StoreError>;
    async fn insert_major(&self, major: &NewMajorCategory) -> Result<MajorCategory, StoreError>;
    async fn rename_major(
        &self,
        id: MajorId,
        owner: UserId,
        major_name: &str,
    ) -> Result<(), StoreError>;
    async fn delete_major(&self, id: MajorId, owner: UserId) -> Result<(), StoreError>;
}
