//! Word list state: owner, table, subject filter and page in; a fetched page
//! and its total count out.
//!
//! Every parameter change issues a count and a ranged fetch concurrently. Each
//! cycle is tagged with a sequence number taken when it is issued, and only the
//! newest cycle may write its response back. Older responses are dropped, so a
//! slow fetch for a previous table can never overwrite the current one.
//!
//! A failed cycle keeps the previous items and count and records a message for
//! the view. Nothing retries on its own.

use std::sync::Arc;

use shared::{
    domain::{CategoryTable, UserId, WordId, WordRecord},
    protocol::WordPatch,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ListError, FETCH_FAILED_MESSAGE},
    pagination::{self, PageWindow, MAX_VISIBLE_PAGES, PAGE_SIZE},
    search,
    store::{RemoteTableStore, TableQuery},
};

/// Which rows of the owner's table the list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Words still being learned: unchecked `dontknow_word` rows, every `major_word` row.
    #[default]
    Study,
    /// Words the owner has marked as known.
    Checked,
    /// Everything the owner uploaded.
    Uploaded,
}

impl ListMode {
    pub fn checked_filter(self, table: CategoryTable) -> Option<bool> {
        match (self, table) {
            (ListMode::Study, CategoryTable::DontknowWord) => Some(false),
            (ListMode::Study, CategoryTable::MajorWord) => None,
            (ListMode::Checked, _) => Some(true),
            (ListMode::Uploaded, _) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Loading {
        seq: u64,
        table: CategoryTable,
        page: u32,
    },
    Loaded {
        seq: u64,
        total_count: u64,
        items: usize,
    },
    Failed {
        seq: u64,
        message: String,
    },
    /// A local mutation changed the held page.
    Patched {
        total_count: u64,
    },
    /// No owner; the list was emptied without a fetch.
    Cleared,
}

/// Result of one refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { total_count: u64 },
    Failed { message: String },
    /// A newer request was issued before this one finished.
    Superseded,
    NotAuthenticated,
}

/// A successful write made by an editor, replayed onto the held page.
#[derive(Debug, Clone, PartialEq)]
pub enum ListMutation {
    Inserted {
        table: CategoryTable,
        record: WordRecord,
    },
    Updated {
        table: CategoryTable,
        id: WordId,
        patch: WordPatch,
    },
    Removed {
        table: CategoryTable,
        id: WordId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub owner: Option<UserId>,
    pub table: CategoryTable,
    pub subject: Option<String>,
    pub mode: ListMode,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub items: Vec<WordRecord>,
    pub load_state: LoadState,
    pub error: Option<String>,
}

impl ListSnapshot {
    pub fn total_pages(&self) -> u32 {
        pagination::total_pages(self.total_count, self.page_size)
    }

    pub fn visible_page(&self, query: &str) -> Vec<WordRecord> {
        search::filter_page(&self.items, query)
    }

    pub fn page_window(&self) -> PageWindow {
        PageWindow::new(self.page, self.total_pages(), MAX_VISIBLE_PAGES)
    }
}

#[derive(Debug)]
struct ListState {
    owner: Option<UserId>,
    table: CategoryTable,
    subject: Option<String>,
    mode: ListMode,
    page: u32,
    items: Vec<WordRecord>,
    total_count: u64,
    load_state: LoadState,
    error: Option<String>,
    latest_seq: u64,
}

impl ListState {
    fn new(owner: Option<UserId>, mode: ListMode) -> Self {
        Self {
            owner,
            table: CategoryTable::default(),
            subject: None,
            mode,
            page: 1,
            items: Vec::new(),
            total_count: 0,
            load_state: LoadState::Idle,
            error: None,
            latest_seq: 0,
        }
    }

    fn query(&self) -> Option<TableQuery> {
        let owner = self.owner?;
        Some(
            TableQuery::new(self.table, owner)
                .with_subject(self.subject.clone())
                .with_checked(self.mode.checked_filter(self.table)),
        )
    }

    fn total_pages(&self) -> u32 {
        pagination::total_pages(self.total_count, PAGE_SIZE)
    }

    fn clear(&mut self) {
        self.items.clear();
        self.total_count = 0;
        self.load_state = LoadState::Idle;
        self.error = None;
    }

    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            owner: self.owner,
            table: self.table,
            subject: self.subject.clone(),
            mode: self.mode,
            page: self.page,
            page_size: PAGE_SIZE,
            total_count: self.total_count,
            items: self.items.clone(),
            load_state: self.load_state,
            error: self.error.clone(),
        }
    }
}

enum Cycle {
    Done(FetchOutcome),
    /// The count showed the page is past the end; the page was moved and
    /// another cycle is needed.
    Reclamped,
}

/// Follow-up cycles allowed when the list shrinks underneath us; the cycle
/// after the last one commits whatever it fetched.
const MAX_RECLAMP_CYCLES: usize = 3;

pub struct WordListController {
    store: Arc<dyn RemoteTableStore>,
    state: Mutex<ListState>,
    events: broadcast::Sender<ListEvent>,
}

impl WordListController {
    pub fn new(store: Arc<dyn RemoteTableStore>, owner: Option<UserId>, mode: ListMode) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            state: Mutex::new(ListState::new(owner, mode)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ListSnapshot {
        self.state.lock().await.snapshot()
    }

    /// The fetched page narrowed to rows matching `query`.
    pub async fn visible_page(&self, query: &str) -> Vec<WordRecord> {
        let state = self.state.lock().await;
        search::filter_page(&state.items, query)
    }

    pub async fn page_window(&self) -> PageWindow {
        self.state.lock().await.snapshot().page_window()
    }

    pub async fn set_owner(&self, owner: Option<UserId>) -> FetchOutcome {
        {
            let mut state = self.state.lock().await;
            if state.owner != owner {
                state.owner = owner;
                state.page = 1;
                state.clear();
            }
        }
        self.fetch().await
    }

    /// Switches the active table. Reselecting the current table does nothing.
    pub async fn set_table(&self, table: CategoryTable) -> Option<FetchOutcome> {
        {
            let mut state = self.state.lock().await;
            if state.table == table {
                return None;
            }
            state.table = table;
            if !table.supports_subjects() {
                state.subject = None;
            }
            state.page = 1;
        }
        info!(%table, "switched word table");
        Some(self.fetch().await)
    }

    /// `None` shows every subject.
    pub async fn set_subject_filter(
        &self,
        subject: Option<String>,
    ) -> Result<FetchOutcome, ListError> {
        {
            let mut state = self.state.lock().await;
            if !state.table.supports_subjects() {
                return Err(ListError::SubjectUnsupported(state.table));
            }
            state.subject = subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            state.page = 1;
        }
        Ok(self.fetch().await)
    }

    /// Moves to page `requested`, clamped to the pages known from the last count.
    pub async fn set_page(&self, requested: u32) -> FetchOutcome {
        {
            let mut state = self.state.lock().await;
            let page = pagination::clamp_page(requested, state.total_pages());
            if page != requested {
                debug!(requested, page, "clamped requested page");
            }
            state.page = page;
        }
        self.fetch().await
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    /// Replays an editor's successful write onto the held page without a refetch.
    pub async fn apply_mutation(&self, mutation: &ListMutation) {
        let mut state = self.state.lock().await;
        let Some(query) = state.query() else {
            return;
        };

        let changed = match mutation {
            ListMutation::Inserted { table, record } => {
                if query.matches(*table, record) {
                    state.total_count += 1;
                    if state.page == 1 {
                        state.items.insert(0, record.clone());
                        state.items.truncate(PAGE_SIZE as usize);
                    }
                    true
                } else {
                    false
                }
            }
            ListMutation::Updated { table, id, patch } => {
                match position(&state.items, *table, state.table, *id) {
                    Some(pos) => {
                        patch.apply_to(&mut state.items[pos]);
                        if !query.matches(*table, &state.items[pos]) {
                            state.items.remove(pos);
                            state.total_count = state.total_count.saturating_sub(1);
                        }
                        true
                    }
                    None => false,
                }
            }
            ListMutation::Removed { table, id } => {
                match position(&state.items, *table, state.table, *id) {
                    Some(pos) => {
                        state.items.remove(pos);
                        state.total_count = state.total_count.saturating_sub(1);
                        true
                    }
                    None => false,
                }
            }
        };

        if changed {
            let _ = self.events.send(ListEvent::Patched {
                total_count: state.total_count,
            });
        }
    }

    async fn fetch(&self) -> FetchOutcome {
        let mut reclamps = 0;
        loop {
            match self.fetch_cycle(reclamps < MAX_RECLAMP_CYCLES).await {
                Cycle::Done(outcome) => return outcome,
                Cycle::Reclamped => reclamps += 1,
            }
        }
    }

    /// Runs one count + page cycle. With `may_reclamp` unset a page past the
    /// end is clamped and the cycle still commits.
    async fn fetch_cycle(&self, may_reclamp: bool) -> Cycle {
        let (seq, query, page) = {
            let mut state = self.state.lock().await;
            state.latest_seq += 1;
            let seq = state.latest_seq;
            let Some(query) = state.query() else {
                state.clear();
                let _ = self.events.send(ListEvent::Cleared);
                return Cycle::Done(FetchOutcome::NotAuthenticated);
            };
            state.load_state = LoadState::Loading;
            state.error = None;
            (seq, query, state.page)
        };

        let _ = self.events.send(ListEvent::Loading {
            seq,
            table: query.table,
            page,
        });
        let range = pagination::row_range(page, PAGE_SIZE);
        let (count, rows) = futures::join!(
            self.store.count(&query),
            self.store.fetch_page(&query, range)
        );

        let mut state = self.state.lock().await;
        if seq != state.latest_seq {
            debug!(seq, latest = state.latest_seq, "dropping superseded list response");
            return Cycle::Done(FetchOutcome::Superseded);
        }

        match (count, rows) {
            (Ok(total_count), Ok(rows)) => {
                let last_page = pagination::total_pages(total_count, PAGE_SIZE).max(1);
                if state.page > last_page {
                    state.page = last_page;
                    state.total_count = total_count;
                    if may_reclamp {
                        info!(page = state.page, total_count, "page past the end; reclamping");
                        return Cycle::Reclamped;
                    }
                    warn!(
                        page = state.page,
                        total_count,
                        "list kept shrinking; committing last fetched rows"
                    );
                }

                state.total_count = total_count;
                state.items = rows;
                state.load_state = LoadState::Ready;
                state.error = None;
                debug!(
                    seq,
                    table = %query.table,
                    page = state.page,
                    total_count,
                    "word list loaded"
                );
                let _ = self.events.send(ListEvent::Loaded {
                    seq,
                    total_count,
                    items: state.items.len(),
                });
                Cycle::Done(FetchOutcome::Loaded { total_count })
            }
            (count, rows) => {
                if let Err(err) = &count {
                    warn!(seq, table = %query.table, error = %err, "word count failed");
                }
                if let Err(err) = &rows {
                    warn!(seq, table = %query.table, error = %err, "word page fetch failed");
                }
                let message = FETCH_FAILED_MESSAGE.to_string();
                state.load_state = LoadState::Failed;
                state.error = Some(message.clone());
                let _ = self.events.send(ListEvent::Failed {
                    seq,
                    message: message.clone(),
                });
                Cycle::Done(FetchOutcome::Failed { message })
            }
        }
    }
}

fn position(
    items: &[WordRecord],
    table: CategoryTable,
    active: CategoryTable,
    id: WordId,
) -> Option<usize> {
    if table != active {
        return None;
    }
    items.iter().position(|item| item.id == id)
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
