//! Client library for the vocabulary flashcard app.
//!
//! Persistence and authentication belong to the hosted platform; this crate
//! holds the list state, the editors and the HTTP plumbing to reach it.

use url::Url;

pub mod auth;
pub mod controller;
pub mod editor;
pub mod error;
pub mod majors;
pub mod pagination;
pub mod rest;
pub mod search;
pub mod store;

pub use auth::{AuthClient, Session, SessionProvider, SessionStore, SessionUser, SignUpOutcome};
pub use controller::{
    FetchOutcome, ListEvent, ListMode, ListMutation, ListSnapshot, LoadState, WordListController,
};
pub use editor::{WordDraft, WordEditor};
pub use error::{AuthError, ListError, StoreError, ValidationErrors};
pub use majors::MajorCategoryManager;
pub use rest::PostgrestStore;
pub use store::{MajorCategoryStore, RemoteTableStore, RowRange, TableQuery};

/// Project URL and public anon key of the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaasConfig {
    base_url: Url,
    pub anon_key: String,
}

impl BaasConfig {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            anon_key: anon_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}
