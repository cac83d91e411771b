use std::sync::Arc;

use shared::{
    domain::{MajorCategory, MajorId, UserId},
    protocol::NewMajorCategory,
};
use tracing::info;

use crate::{
    error::{ListError, ValidationErrors},
    store::MajorCategoryStore,
};

fn major_name(raw: &str) -> Result<String, ListError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ListError::ValidationFailed(ValidationErrors {
            major_name: Some("전공과목명을 입력해주세요".into()),
            ..ValidationErrors::default()
        }));
    }
    Ok(name.to_string())
}

/// The owner's subject list used to group `major_word` rows.
pub struct MajorCategoryManager {
    store: Arc<dyn MajorCategoryStore>,
    owner: Option<UserId>,
}

impl MajorCategoryManager {
    pub fn new(store: Arc<dyn MajorCategoryStore>, owner: Option<UserId>) -> Self {
        Self { store, owner }
    }

    fn owner(&self) -> Result<UserId, ListError> {
        self.owner.ok_or(ListError::NotAuthenticated)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<MajorCategory>, ListError> {
        let owner = self.owner()?;
        Ok(self.store.list_majors(owner).await?)
    }

    pub async fn add(&self, name: &str) -> Result<MajorCategory, ListError> {
        let owner = self.owner()?;
        let major = NewMajorCategory {
            major_name: major_name(name)?,
            user_id: owner,
        };
        let created = self.store.insert_major(&major).await?;
        info!(id = %created.id, name = %created.major_name, "added major category");
        Ok(created)
    }

    pub async fn rename(&self, id: MajorId, name: &str) -> Result<(), ListError> {
        let owner = self.owner()?;
        let name = major_name(name)?;
        self.store.rename_major(id, owner, &name).await?;
        info!(%id, %name, "renamed major category");
        Ok(())
    }

    pub async fn delete(&self, id: MajorId) -> Result<(), ListError> {
        let owner = self.owner()?;
        self.store.delete_major(id, owner).await?;
        info!(%id, "deleted major category");
        Ok(())
    }
}
