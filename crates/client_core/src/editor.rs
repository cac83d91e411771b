//! Word upload form validation and the write-side operations on word tables.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{CategoryTable, UserId, WordId, WordRecord},
    protocol::{NewWord, WordPatch},
};
use tracing::info;

use crate::{
    controller::ListMutation,
    error::{ListError, ValidationErrors},
    store::RemoteTableStore,
};

/// Raw form input. Meanings are typed as one comma separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordDraft {
    pub word_en: String,
    pub meanings: String,
    pub comment: String,
    pub table: CategoryTable,
    pub major_name: Option<String>,
}

/// Splits `"이루다, 포함하다"` into trimmed, non-empty meanings.
pub fn parse_meanings(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidWord {
    pub table: CategoryTable,
    pub word_en: String,
    pub word_kr: Vec<String>,
    pub comment: Option<String>,
    pub major_name: Option<String>,
}

impl ValidWord {
    pub fn into_new_word(self, owner: UserId) -> NewWord {
        NewWord {
            word_en: self.word_en,
            word_kr: self.word_kr,
            comment: self.comment,
            category: Some(self.table.table_name().to_string()),
            major_name: self.major_name,
            user_id: owner,
            created_at: Utc::now(),
        }
    }
}

impl WordDraft {
    pub fn validate(&self) -> Result<ValidWord, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let word_en = self.word_en.trim();
        if word_en.is_empty() {
            errors.word_en = Some("영어 단어를 입력해주세요".into());
        }

        let word_kr = parse_meanings(&self.meanings);
        if self.meanings.trim().is_empty() {
            errors.word_kr = Some("한글 뜻을 입력해주세요".into());
        } else if word_kr.is_empty() {
            errors.word_kr = Some("최소 1개의 뜻을 입력해주세요".into());
        }

        let major_name = self
            .major_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        if self.table.supports_subjects() && major_name.is_none() {
            errors.major_name = Some("전공과목을 선택해주세요".into());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let comment = Some(self.comment.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(ValidWord {
            table: self.table,
            word_en: word_en.to_string(),
            word_kr,
            comment,
            major_name: if self.table.supports_subjects() {
                major_name
            } else {
                None
            },
        })
    }
}

/// Checks a meaning list coming from the edit form.
pub fn validate_meanings(meanings: &[String]) -> Result<Vec<String>, ValidationErrors> {
    let cleaned: Vec<String> = meanings
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if cleaned.is_empty() {
        return Err(ValidationErrors {
            word_kr: Some("최소 1개의 뜻을 입력해주세요".into()),
            ..ValidationErrors::default()
        });
    }
    Ok(cleaned)
}

/// Performs writes for one owner and reports each as a [`ListMutation`].
pub struct WordEditor {
    store: Arc<dyn RemoteTableStore>,
    owner: Option<UserId>,
}

impl WordEditor {
    pub fn new(store: Arc<dyn RemoteTableStore>, owner: Option<UserId>) -> Self {
        Self { store, owner }
    }

    fn owner(&self) -> Result<UserId, ListError> {
        self.owner.ok_or(ListError::NotAuthenticated)
    }

    pub async fn upload(
        &self,
        draft: &WordDraft,
    ) -> Result<(WordRecord, ListMutation), ListError> {
        let owner = self.owner()?;
        let valid = draft.validate().map_err(ListError::ValidationFailed)?;
        let table = valid.table;
        let record = self
            .store
            .insert_word(table, &valid.into_new_word(owner))
            .await?;
        info!(%table, id = %record.id, "uploaded word");
        let mutation = ListMutation::Inserted {
            table,
            record: record.clone(),
        };
        Ok((record, mutation))
    }

    pub async fn update(
        &self,
        table: CategoryTable,
        id: WordId,
        mut patch: WordPatch,
    ) -> Result<ListMutation, ListError> {
        let owner = self.owner()?;
        if let Some(word_en) = patch.word_en.take() {
            let word_en = word_en.trim();
            if word_en.is_empty() {
                return Err(ListError::ValidationFailed(ValidationErrors {
                    word_en: Some("영어 단어를 입력해주세요".into()),
                    ..ValidationErrors::default()
                }));
            }
            patch.word_en = Some(word_en.to_string());
        }
        if let Some(word_kr) = patch.word_kr.take() {
            let word_kr = validate_meanings(&word_kr).map_err(ListError::ValidationFailed)?;
            patch.word_kr = Some(word_kr);
        }
        if patch.is_empty() {
            return Err(ListError::ValidationFailed(ValidationErrors {
                other: Some("변경할 내용이 없습니다.".into()),
                ..ValidationErrors::default()
            }));
        }

        self.store.update_word(table, id, owner, &patch).await?;
        info!(%table, %id, "updated word");
        Ok(ListMutation::Updated { table, id, patch })
    }

    pub async fn set_checked(
        &self,
        table: CategoryTable,
        id: WordId,
        is_checked: bool,
    ) -> Result<ListMutation, ListError> {
        let owner = self.owner()?;
        let patch = WordPatch::checked(is_checked);
        self.store.update_word(table, id, owner, &patch).await?;
        info!(%table, %id, is_checked, "toggled checked flag");
        Ok(ListMutation::Updated { table, id, patch })
    }

    pub async fn delete(
        &self,
        table: CategoryTable,
        id: WordId,
    ) -> Result<ListMutation, ListError> {
        let owner = self.owner()?;
        self.store.delete_word(table, id, owner).await?;
        info!(%table, %id, "deleted word");
        Ok(ListMutation::Removed { table, id })
    }
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
