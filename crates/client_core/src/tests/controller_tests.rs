use super::*;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex as StdMutex,
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shared::protocol::NewWord;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{error::StoreError, store::RowRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailWith {
    Count,
    Page,
}

/// Blocks page fetches for one table until released.
struct Gate {
    table: CategoryTable,
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct MemoryStore {
    rows: StdMutex<Vec<(CategoryTable, WordRecord)>>,
    fail_with: StdMutex<Option<FailWith>>,
    page_requests: StdMutex<Vec<(TableQuery, RowRange)>>,
    gate: Option<Gate>,
}

impl MemoryStore {
    fn gated(table: CategoryTable) -> Self {
        Self {
            gate: Some(Gate {
                table,
                entered: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::default()
        }
    }

    fn seed(
        &self,
        table: CategoryTable,
        owner: UserId,
        count: usize,
        tweak: impl Fn(usize, &mut WordRecord),
    ) {
        let base = Utc::now();
        let mut rows = self.rows.lock().expect("rows");
        for i in 0..count {
            let mut record = WordRecord {
                id: WordId(Uuid::new_v4()),
                word_en: format!("{}-{i}", table.table_name()),
                word_kr: vec![format!("뜻{i}")],
                comment: None,
                category: None,
                major_name: None,
                created_at: base - Duration::minutes(i as i64),
                user_id: owner,
                is_checked: false,
            };
            tweak(i, &mut record);
            rows.push((table, record));
        }
    }

    fn fail(&self, mode: Option<FailWith>) {
        *self.fail_with.lock().expect("fail") = mode;
    }

    fn matching(&self, query: &TableQuery) -> Vec<WordRecord> {
        let rows = self.rows.lock().expect("rows");
        let mut matching: Vec<WordRecord> = rows
            .iter()
            .filter(|(table, record)| query.matches(*table, record))
            .map(|(_, record)| record.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    fn last_request(&self) -> Option<(TableQuery, RowRange)> {
        self.page_requests.lock().expect("requests").last().cloned()
    }

    fn request_count(&self) -> usize {
        self.page_requests.lock().expect("requests").len()
    }
}

fn rejected() -> StoreError {
    StoreError::Rejected {
        status: 500,
        body: shared::error::RestErrorBody::new("boom"),
    }
}

#[async_trait]
impl RemoteTableStore for MemoryStore {
    async fn count(&self, query: &TableQuery) -> Result<u64, StoreError> {
        if *self.fail_with.lock().expect("fail") == Some(FailWith::Count) {
            return Err(rejected());
        }
        Ok(self.matching(query).len() as u64)
    }

    async fn fetch_page(
        &self,
        query: &TableQuery,
        range: RowRange,
    ) -> Result<Vec<WordRecord>, StoreError> {
        self.page_requests
            .lock()
            .expect("requests")
            .push((query.clone(), range));
        if let Some(gate) = &self.gate {
            if gate.table == query.table {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        if *self.fail_with.lock().expect("fail") == Some(FailWith::Page) {
            return Err(rejected());
        }
        Ok(self
            .matching(query)
            .into_iter()
            .skip(range.offset as usize)
            .take(range.limit as usize)
            .collect())
    }

    async fn insert_word(
        &self,
        _table: CategoryTable,
        _word: &NewWord,
    ) -> Result<WordRecord, StoreError> {
        unreachable!("list controller never inserts")
    }

    async fn update_word(
        &self,
        _table: CategoryTable,
        _id: WordId,
        _owner: UserId,
        _patch: &WordPatch,
    ) -> Result<(), StoreError> {
        unreachable!("list controller never updates")
    }

    async fn delete_word(
        &self,
        _table: CategoryTable,
        _id: WordId,
        _owner: UserId,
    ) -> Result<(), StoreError> {
        unreachable!("list controller never deletes")
    }
}

fn owner() -> UserId {
    UserId(Uuid::new_v4())
}

fn controller(store: &Arc<MemoryStore>, owner: Option<UserId>) -> WordListController {
    WordListController::new(store.clone(), owner, ListMode::Study)
}

#[tokio::test]
async fn requesting_past_the_end_clamps_to_last_page() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 45, |_, _| {});
    let list = controller(&store, Some(me));

    assert_eq!(list.refresh().await, FetchOutcome::Loaded { total_count: 45 });
    assert_eq!(list.snapshot().await.total_pages(), 3);

    list.set_page(5).await;
    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.page, 3);
    assert_eq!(snapshot.items.len(), 5);
    let (_, range) = store.last_request().expect("request");
    assert_eq!(range, RowRange { offset: 40, limit: 20 });
}

#[tokio::test]
async fn page_zero_means_first_page() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 30, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    list.set_page(2).await;

    list.set_page(0).await;
    assert_eq!(list.snapshot().await.page, 1);
}

#[tokio::test]
async fn switching_table_resets_page_and_uses_new_filters() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 100, |_, _| {});
    store.seed(CategoryTable::MajorWord, me, 7, |i, w| {
        w.is_checked = i % 2 == 0;
    });
    let list = controller(&store, Some(me));
    list.refresh().await;
    list.set_page(4).await;
    assert_eq!(list.snapshot().await.page, 4);

    let outcome = list.set_table(CategoryTable::MajorWord).await;
    assert_eq!(outcome, Some(FetchOutcome::Loaded { total_count: 7 }));

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.table, CategoryTable::MajorWord);
    let (query, range) = store.last_request().expect("request");
    assert_eq!(query.table, CategoryTable::MajorWord);
    assert_eq!(query.checked, None);
    assert_eq!(query.owner, me);
    assert_eq!(range.offset, 0);
}

#[tokio::test]
async fn reselecting_the_active_table_does_not_refetch() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 3, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    let before = store.request_count();

    assert_eq!(list.set_table(CategoryTable::DontknowWord).await, None);
    assert_eq!(store.request_count(), before);
}

#[tokio::test]
async fn study_list_hides_checked_unknown_words() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 10, |i, w| {
        w.is_checked = i < 4;
    });
    let study = controller(&store, Some(me));
    assert_eq!(study.refresh().await, FetchOutcome::Loaded { total_count: 6 });

    let checked = WordListController::new(store.clone(), Some(me), ListMode::Checked);
    assert_eq!(checked.refresh().await, FetchOutcome::Loaded { total_count: 4 });
    assert!(checked.snapshot().await.items.iter().all(|w| w.is_checked));

    let uploaded = WordListController::new(store.clone(), Some(me), ListMode::Uploaded);
    assert_eq!(uploaded.refresh().await, FetchOutcome::Loaded { total_count: 10 });
}

#[tokio::test]
async fn other_owners_rows_are_never_listed() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 2, |_, _| {});
    store.seed(CategoryTable::DontknowWord, owner(), 5, |_, _| {});
    let list = controller(&store, Some(me));
    assert_eq!(list.refresh().await, FetchOutcome::Loaded { total_count: 2 });
    assert!(list
        .snapshot()
        .await
        .items
        .iter()
        .all(|w| w.user_id == me));
}

#[tokio::test]
async fn subject_filter_only_applies_to_major_words() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::MajorWord, me, 50, |i, w| {
        let subject = if i % 5 == 0 { "자료구조" } else { "선형대수" };
        w.major_name = Some(subject.to_string());
    });
    let list = controller(&store, Some(me));

    let err = list
        .set_subject_filter(Some("자료구조".into()))
        .await
        .expect_err("unknown-word table has no subjects");
    assert!(matches!(
        err,
        ListError::SubjectUnsupported(CategoryTable::DontknowWord)
    ));

    list.set_table(CategoryTable::MajorWord).await;
    list.set_page(2).await;
    let outcome = list
        .set_subject_filter(Some("자료구조".into()))
        .await
        .expect("filter");
    assert_eq!(outcome, FetchOutcome::Loaded { total_count: 10 });

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.subject.as_deref(), Some("자료구조"));
    let (query, _) = store.last_request().expect("request");
    assert_eq!(query.subject.as_deref(), Some("자료구조"));

    list.set_subject_filter(None).await.expect("all subjects");
    assert_eq!(list.snapshot().await.total_count, 50);
}

#[tokio::test]
async fn leaving_major_words_drops_subject_filter() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    let list = controller(&store, Some(me));
    list.set_table(CategoryTable::MajorWord).await;
    list.set_subject_filter(Some("물리학".into()))
        .await
        .expect("filter");

    list.set_table(CategoryTable::DontknowWord).await;
    let (query, _) = store.last_request().expect("request");
    assert_eq!(query.subject, None);
    assert_eq!(query.checked, Some(false));
}

#[tokio::test]
async fn failed_fetch_keeps_previous_items() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 3, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;

    for mode in [FailWith::Page, FailWith::Count] {
        store.fail(Some(mode));
        let outcome = list.refresh().await;
        assert_eq!(
            outcome,
            FetchOutcome::Failed {
                message: FETCH_FAILED_MESSAGE.to_string()
            }
        );

        let snapshot = list.snapshot().await;
        assert_eq!(snapshot.items.len(), 3);
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.load_state, LoadState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
    }

    store.fail(None);
    list.refresh().await;
    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.load_state, LoadState::Ready);
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn without_owner_list_is_empty_and_nothing_is_fetched() {
    let store = Arc::new(MemoryStore::default());
    store.seed(CategoryTable::DontknowWord, owner(), 3, |_, _| {});
    let list = controller(&store, None);

    assert_eq!(list.refresh().await, FetchOutcome::NotAuthenticated);
    let snapshot = list.snapshot().await;
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.load_state, LoadState::Idle);
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn signing_out_clears_the_list() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 3, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;

    assert_eq!(list.set_owner(None).await, FetchOutcome::NotAuthenticated);
    let snapshot = list.snapshot().await;
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.total_count, 0);
}

#[tokio::test]
async fn slow_response_for_old_parameters_is_discarded() {
    let store = Arc::new(MemoryStore::gated(CategoryTable::DontknowWord));
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 5, |_, _| {});
    store.seed(CategoryTable::MajorWord, me, 2, |_, _| {});
    let list = Arc::new(controller(&store, Some(me)));

    let slow = {
        let list = list.clone();
        tokio::spawn(async move { list.refresh().await })
    };
    store
        .gate
        .as_ref()
        .expect("gate")
        .entered
        .notified()
        .await;

    let fast = list.set_table(CategoryTable::MajorWord).await;
    assert_eq!(fast, Some(FetchOutcome::Loaded { total_count: 2 }));

    store.gate.as_ref().expect("gate").release.notify_one();
    assert_eq!(slow.await.expect("join"), FetchOutcome::Superseded);

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.table, CategoryTable::MajorWord);
    assert_eq!(snapshot.total_count, 2);
    assert!(snapshot
        .items
        .iter()
        .all(|w| w.word_en.starts_with("major_word")));
}

#[tokio::test]
async fn shrinking_list_moves_back_to_last_page() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 45, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    list.set_page(3).await;

    store.rows.lock().expect("rows").truncate(15);
    assert_eq!(list.refresh().await, FetchOutcome::Loaded { total_count: 15 });
    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.items.len(), 15);
}

#[tokio::test]
async fn visible_page_filters_only_the_fetched_rows() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 2, |i, w| {
        if i == 0 {
            w.word_en = "Apple".into();
            w.word_kr = vec!["사과".into()];
        } else {
            w.word_en = "Banana".into();
            w.word_kr = vec!["바나나".into()];
        }
    });
    let list = controller(&store, Some(me));
    list.refresh().await;

    let visible = list.visible_page("ap").await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].word_en, "Apple");

    let all = list.visible_page("").await;
    assert_eq!(all, list.snapshot().await.items);
}

#[tokio::test]
async fn search_does_not_reach_other_pages() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 25, |i, w| {
        if i == 24 {
            w.word_en = "needle".into();
        }
    });
    let list = controller(&store, Some(me));
    list.refresh().await;

    assert!(list.visible_page("needle").await.is_empty());
    list.set_page(2).await;
    assert_eq!(list.visible_page("needle").await.len(), 1);
}

#[tokio::test]
async fn checking_a_word_removes_it_from_the_study_list() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 3, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    let target = list.snapshot().await.items[1].id;

    list.apply_mutation(&ListMutation::Updated {
        table: CategoryTable::DontknowWord,
        id: target,
        patch: WordPatch::checked(true),
    })
    .await;

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.total_count, 2);
    assert!(snapshot.items.iter().all(|w| w.id != target));
}

#[tokio::test]
async fn edits_patch_rows_in_place() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 3, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    let target = list.snapshot().await.items[0].id;

    list.apply_mutation(&ListMutation::Updated {
        table: CategoryTable::DontknowWord,
        id: target,
        patch: WordPatch {
            word_en: Some("comprise".into()),
            ..WordPatch::default()
        },
    })
    .await;

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.items[0].word_en, "comprise");
}

#[tokio::test]
async fn removal_and_insert_keep_count_in_step() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 20, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    let mut events = list.subscribe();

    let removed = list.snapshot().await.items[5].id;
    list.apply_mutation(&ListMutation::Removed {
        table: CategoryTable::DontknowWord,
        id: removed,
    })
    .await;
    assert_eq!(
        events.recv().await.expect("event"),
        ListEvent::Patched { total_count: 19 }
    );

    let mut fresh = list.snapshot().await.items[0].clone();
    fresh.id = WordId(Uuid::new_v4());
    fresh.word_en = "fresh".into();
    fresh.created_at = Utc::now() + Duration::minutes(1);
    list.apply_mutation(&ListMutation::Inserted {
        table: CategoryTable::DontknowWord,
        record: fresh.clone(),
    })
    .await;

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.total_count, 20);
    assert_eq!(snapshot.items[0].id, fresh.id);
    assert!(snapshot.items.len() <= PAGE_SIZE as usize);

    // An insert into the other table leaves this list alone.
    list.apply_mutation(&ListMutation::Inserted {
        table: CategoryTable::MajorWord,
        record: fresh,
    })
    .await;
    assert_eq!(list.snapshot().await.total_count, 20);
}

#[tokio::test]
async fn refresh_emits_loading_then_loaded() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 4, |_, _| {});
    let list = controller(&store, Some(me));
    let mut events = list.subscribe();

    list.refresh().await;
    assert_eq!(
        events.recv().await.expect("loading"),
        ListEvent::Loading {
            seq: 1,
            table: CategoryTable::DontknowWord,
            page: 1
        }
    );
    assert_eq!(
        events.recv().await.expect("loaded"),
        ListEvent::Loaded {
            seq: 1,
            total_count: 4,
            items: 4
        }
    );
}

#[tokio::test]
async fn page_window_follows_current_page() {
    let store = Arc::new(MemoryStore::default());
    let me = owner();
    store.seed(CategoryTable::DontknowWord, me, 45, |_, _| {});
    let list = controller(&store, Some(me));
    list.refresh().await;
    list.set_page(2).await;

    let window = list.page_window().await;
    assert_eq!(window.pages().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(window.has_prev() && window.has_next());
}

/// Loses 20 rows between every count.
struct ShrinkingStore {
    remaining: AtomicU64,
}

#[async_trait]
impl RemoteTableStore for ShrinkingStore {
    async fn count(&self, _query: &TableQuery) -> Result<u64, StoreError> {
        Ok(self.remaining.fetch_sub(20, Ordering::SeqCst))
    }

    async fn fetch_page(
        &self,
        _query: &TableQuery,
        _range: RowRange,
    ) -> Result<Vec<WordRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn insert_word(
        &self,
        _table: CategoryTable,
        _word: &NewWord,
    ) -> Result<WordRecord, StoreError> {
        unreachable!("list controller never inserts")
    }

    async fn update_word(
        &self,
        _table: CategoryTable,
        _id: WordId,
        _owner: UserId,
        _patch: &WordPatch,
    ) -> Result<(), StoreError> {
        unreachable!("list controller never updates")
    }

    async fn delete_word(
        &self,
        _table: CategoryTable,
        _id: WordId,
        _owner: UserId,
    ) -> Result<(), StoreError> {
        unreachable!("list controller never deletes")
    }
}

#[tokio::test]
async fn list_that_keeps_shrinking_still_settles() {
    let store = Arc::new(ShrinkingStore {
        remaining: AtomicU64::new(300),
    });
    let list = WordListController::new(store, Some(owner()), ListMode::Study);
    assert_eq!(list.refresh().await, FetchOutcome::Loaded { total_count: 300 });

    let mut events = list.subscribe();
    // 280, 260 and 240 each move the page back; 220 is committed as is.
    let outcome = list.set_page(15).await;
    assert_eq!(outcome, FetchOutcome::Loaded { total_count: 220 });

    let snapshot = list.snapshot().await;
    assert_eq!(snapshot.load_state, LoadState::Ready);
    assert_eq!(snapshot.total_count, 220);
    assert_eq!(snapshot.page, 11);
    assert_eq!(snapshot.error, None);

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert!(matches!(
        last,
        Some(ListEvent::Loaded {
            total_count: 220,
            ..
        })
    ));
}
