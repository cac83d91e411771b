//! HTTP implementation of the table store seams over the platform's REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::CONTENT_RANGE, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{
        CategoryTable, MajorCategory, MajorId, UserId, WordId, WordRecord, MAJOR_CATEGORY_TABLE,
    },
    error::RestErrorBody,
    protocol::{MajorRename, NewMajorCategory, NewWord, WordPatch},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    auth::SessionProvider,
    error::StoreError,
    store::{MajorCategoryStore, RemoteTableStore, RowRange, TableQuery},
    BaasConfig,
};

pub struct PostgrestStore {
    http: Client,
    config: BaasConfig,
    session: Arc<dyn SessionProvider>,
}

impl PostgrestStore {
    pub fn new(config: BaasConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self::with_client(Client::new(), config, session)
    }

    pub fn with_client(
        http: Client,
        config: BaasConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        Ok(self.config.endpoint(&format!("rest/v1/{table}"))?)
    }

    /// Adds the anon key and the best available bearer token.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session
            .access_token()
            .await
            .unwrap_or_else(|| self.config.anon_key.clone());
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    async fn delete_row(&self, table: &str, id: String, owner: UserId) -> Result<(), StoreError> {
        let url = self.table_url(table)?;
        let request = self
            .http
            .delete(url)
            .query(&[("id", format!("eq.{id}")), ("user_id", format!("eq.{owner}"))])
            .header("Prefer", "return=minimal");
        checked(self.authorize(request).await.send().await?).await?;
        debug!(table, %id, "deleted row");
        Ok(())
    }
}

/// Total from a `Content-Range` value such as `0-19/45` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<RestErrorBody>(&text).unwrap_or_else(|_| {
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        };
        RestErrorBody::new(message)
    });
    warn!(status = status.as_u16(), message = %body.message, "table store rejected request");
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|err| StoreError::Decode(err.to_string()))
}

#[async_trait]
impl RemoteTableStore for PostgrestStore {
    async fn count(&self, query: &TableQuery) -> Result<u64, StoreError> {
        let url = self.table_url(query.table.table_name())?;
        let request = self
            .http
            .head(url)
            .query(&[("select", "*")])
            .query(&query.filter_pairs())
            .header("Prefer", "count=exact");
        let response = checked(self.authorize(request).await.send().await?).await?;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or(StoreError::MissingCountHeader)?;
        debug!(table = %query.table, total, "counted rows");
        Ok(total)
    }

    async fn fetch_page(
        &self,
        query: &TableQuery,
        range: RowRange,
    ) -> Result<Vec<WordRecord>, StoreError> {
        let url = self.table_url(query.table.table_name())?;
        let request = self
            .http
            .get(url)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .query(&query.filter_pairs())
            .query(&[("offset", range.offset), ("limit", range.limit)]);
        let response = checked(self.authorize(request).await.send().await?).await?;
        let rows: Vec<WordRecord> = decode(response).await?;
        debug!(
            table = %query.table,
            offset = range.offset,
            rows = rows.len(),
            "fetched page"
        );
        Ok(rows)
    }

    async fn insert_word(
        &self,
        table: CategoryTable,
        word: &NewWord,
    ) -> Result<WordRecord, StoreError> {
        let url = self.table_url(table.table_name())?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&[word]);
        let response = checked(self.authorize(request).await.send().await?).await?;
        let mut rows: Vec<WordRecord> = decode(response).await?;
        if rows.is_empty() {
            return Err(StoreError::Decode("insert returned no rows".into()));
        }
        let record = rows.swap_remove(0);
        debug!(%table, id = %record.id, "inserted word");
        Ok(record)
    }

    async fn update_word(
        &self,
        table: CategoryTable,
        id: WordId,
        owner: UserId,
        patch: &WordPatch,
    ) -> Result<(), StoreError> {
        let url = self.table_url(table.table_name())?;
        let request = self
            .http
            .patch(url)
            .query(&[("id", format!("eq.{id}")), ("user_id", format!("eq.{owner}"))])
            .header("Prefer", "return=minimal")
            .json(patch);
        checked(self.authorize(request).await.send().await?).await?;
        debug!(%table, %id, "updated word");
        Ok(())
    }

    async fn delete_word(
        &self,
        table: CategoryTable,
        id: WordId,
        owner: UserId,
    ) -> Result<(), StoreError> {
        self.delete_row(table.table_name(), id.to_string(), owner)
            .await
    }
}

#[async_trait]
impl MajorCategoryStore for PostgrestStore {
    async fn list_majors(&self, owner: UserId) -> Result<Vec<MajorCategory>, StoreError> {
        let url = self.table_url(MAJOR_CATEGORY_TABLE)?;
        let request = self.http.get(url).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{owner}")),
            ("order", "created_at.desc".to_string()),
        ]);
        let response = checked(self.authorize(request).await.send().await?).await?;
        decode(response).await
    }

    async fn insert_major(&self, major: &NewMajorCategory) -> Result<MajorCategory, StoreError> {
        let url = self.table_url(MAJOR_CATEGORY_TABLE)?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&[major]);
        let response = checked(self.authorize(request).await.send().await?).await?;
        let mut rows: Vec<MajorCategory> = decode(response).await?;
        if rows.is_empty() {
            return Err(StoreError::Decode("insert returned no rows".into()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn rename_major(
        &self,
        id: MajorId,
        owner: UserId,
        major_name: &str,
    ) -> Result<(), StoreError> {
        let url = self.table_url(MAJOR_CATEGORY_TABLE)?;
        let request = self
            .http
            .patch(url)
            .query(&[("id", format!("eq.{id}")), ("user_id", format!("eq.{owner}"))])
            .header("Prefer", "return=minimal")
            .json(&MajorRename {
                major_name: major_name.to_string(),
            });
        checked(self.authorize(request).await.send().await?).await?;
        Ok(())
    }

    async fn delete_major(&self, id: MajorId, owner: UserId) -> Result<(), StoreError> {
        self.delete_row(MAJOR_CATEGORY_TABLE, id.to_string(), owner)
            .await
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
