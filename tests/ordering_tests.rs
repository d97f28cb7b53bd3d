//! Reordering and grouped views over a real store.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TestStore;
use di::Ref;
use faq_assistant_api::core::ordering::{GroupKey, OrderingManager};
use faq_assistant_api::core::traits::{KnowledgeBaseService, NewCategory, NewFaq};
use faq_assistant_api::error::{AppError, AppResult};
use faq_assistant_api::infrastructure::entities::{Category, Faq};
use faq_assistant_api::infrastructure::traits::FaqRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Passes everything through unless the matching outage switch is on.
#[derive(Default)]
struct Outage {
    writes_down: AtomicBool,
    reads_down: AtomicBool,
}

struct FlakyFaqs {
    inner: Ref<dyn FaqRepository>,
    outage: Ref<Outage>,
}

fn unavailable() -> AppError {
    AppError::Persistence(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl FaqRepository for FlakyFaqs {
    async fn list_faqs(
        &self,
        user_id: Uuid,
        assistant_id: Option<Uuid>,
        only_visible: bool,
    ) -> AppResult<Vec<Faq>> {
        if self.outage.reads_down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.list_faqs(user_id, assistant_id, only_visible).await
    }

    async fn find_faq(&self, faq_id: Uuid) -> AppResult<Option<Faq>> {
        self.inner.find_faq(faq_id).await
    }

    async fn next_sort_position(&self, user_id: Uuid, category_id: Option<Uuid>) -> AppResult<i64> {
        self.inner.next_sort_position(user_id, category_id).await
    }

    async fn insert_faq(&self, faq: Faq) -> AppResult<Faq> {
        self.inner.insert_faq(faq).await
    }

    async fn update_faq(&self, faq: Faq) -> AppResult<Option<Faq>> {
        self.inner.update_faq(faq).await
    }

    async fn update_positions(
        &self,
        user_id: Uuid,
        positions: Vec<(Uuid, i64)>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Vec<Faq>>> {
        if self.outage.writes_down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.update_positions(user_id, positions, updated_at).await
    }

    async fn delete_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<u64> {
        self.inner.delete_faq(user_id, faq_id).await
    }
}

fn flaky_knowledge_base(store: &TestStore) -> (Ref<dyn KnowledgeBaseService>, Ref<Outage>) {
    let outage = Ref::new(Outage::default());
    let faqs: Ref<dyn FaqRepository> = Ref::new(FlakyFaqs {
        inner: store.faqs.clone(),
        outage: outage.clone(),
    });
    (store.knowledge_base_with(faqs), outage)
}

async fn category(kb: &Ref<dyn KnowledgeBaseService>, user_id: Uuid, name: &str) -> Category {
    kb.create_category(
        user_id,
        NewCategory {
            name: name.to_owned(),
            ..NewCategory::default()
        },
    )
    .await
    .unwrap()
}

async fn faq(
    kb: &Ref<dyn KnowledgeBaseService>,
    user_id: Uuid,
    question: &str,
    category_id: Option<Uuid>,
) -> Faq {
    kb.create_faq(
        user_id,
        NewFaq {
            question: question.to_owned(),
            answer: format!("About {question}"),
            category_id,
            ..NewFaq::default()
        },
    )
    .await
    .unwrap()
}

fn questions(faqs: &[Faq]) -> Vec<&str> {
    faqs.iter().map(|f| f.question.as_str()).collect()
}

fn positions(faqs: &[Faq]) -> Vec<i64> {
    faqs.iter().map(|f| f.sort_position).collect()
}

async fn stored_group(kb: &Ref<dyn KnowledgeBaseService>, user_id: Uuid, key: GroupKey) -> Vec<Faq> {
    let mut fresh = OrderingManager::new(kb.clone(), user_id);
    fresh.load().await.unwrap();
    fresh.group(key)
}

#[tokio::test]
async fn test_moving_new_faq_to_top_of_category() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    let billing = category(&kb, user, "Billing").await;
    faq(&kb, user, "How do I pay?", Some(billing.id)).await;
    faq(&kb, user, "Do you offer refunds?", Some(billing.id)).await;

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    let group = manager
        .reorder(GroupKey::Category(billing.id), 1, 0)
        .await
        .unwrap();

    assert_eq!(questions(&group), vec!["Do you offer refunds?", "How do I pay?"]);
    assert_eq!(positions(&group), vec![0, 1]);

    let stored = stored_group(&kb, user, GroupKey::Category(billing.id)).await;
    assert_eq!(questions(&stored), questions(&group));
    assert_eq!(positions(&stored), vec![0, 1]);
}

#[tokio::test]
async fn test_reorders_keep_positions_dense() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    let general = category(&kb, user, "General").await;
    let mut created = Vec::new();
    for question in ["a", "b", "c", "d", "e"] {
        created.push(faq(&kb, user, question, Some(general.id)).await);
    }
    // Leaves a gap at position 1.
    kb.delete_faq(user, created[1].id).await.unwrap();

    let key = GroupKey::Category(general.id);
    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    for (from, to) in [(0, 3), (3, 1), (2, 2), (1, 0)] {
        let group = manager.reorder(key, from, to).await.unwrap();
        assert_eq!(positions(&group), vec![0, 1, 2, 3]);
    }

    let stored = stored_group(&kb, user, key).await;
    assert_eq!(positions(&stored), vec![0, 1, 2, 3]);
    assert_eq!(questions(&stored), questions(&manager.group(key)));
}

#[tokio::test]
async fn test_uncategorized_group_can_be_reordered() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    faq(&kb, user, "first", None).await;
    faq(&kb, user, "second", None).await;

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    let group = manager.reorder(GroupKey::Uncategorized, 0, 1).await.unwrap();

    assert_eq!(questions(&group), vec!["second", "first"]);
}

#[tokio::test]
async fn test_out_of_range_move_is_rejected_without_writes() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    let general = category(&kb, user, "General").await;
    faq(&kb, user, "only", Some(general.id)).await;

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    let result = manager.reorder(GroupKey::Category(general.id), 0, 1).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(positions(&manager.group(GroupKey::Category(general.id))), vec![0]);
}

#[tokio::test]
async fn test_failed_write_keeps_store_order() {
    let store = TestStore::new().await;
    let (kb, outage) = flaky_knowledge_base(&store);
    let user = Uuid::new_v4();
    let general = category(&kb, user, "General").await;
    faq(&kb, user, "a", Some(general.id)).await;
    faq(&kb, user, "b", Some(general.id)).await;
    faq(&kb, user, "c", Some(general.id)).await;
    let key = GroupKey::Category(general.id);

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    outage.writes_down.store(true, Ordering::SeqCst);
    let result = manager.reorder(key, 2, 0).await;

    assert!(matches!(result, Err(AppError::Persistence(_))));

    let group = manager.group(key);
    assert_eq!(questions(&group), vec!["a", "b", "c"]);
    assert_eq!(positions(&group), vec![0, 1, 2]);

    let stored = stored_group(&store.knowledge_base(), user, key).await;
    assert_eq!(questions(&stored), vec!["a", "b", "c"]);
    assert_eq!(positions(&stored), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_failed_reload_restores_previous_order() {
    let store = TestStore::new().await;
    let (kb, outage) = flaky_knowledge_base(&store);
    let user = Uuid::new_v4();
    let general = category(&kb, user, "General").await;
    faq(&kb, user, "a", Some(general.id)).await;
    faq(&kb, user, "b", Some(general.id)).await;
    faq(&kb, user, "c", Some(general.id)).await;
    let key = GroupKey::Category(general.id);

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    outage.writes_down.store(true, Ordering::SeqCst);
    outage.reads_down.store(true, Ordering::SeqCst);
    let result = manager.reorder(key, 2, 0).await;

    assert!(result.is_err());
    let group = manager.group(key);
    assert_eq!(questions(&group), vec!["a", "b", "c"]);
    assert_eq!(positions(&group), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_reorder_of_unknown_category_is_not_found() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    let someone_else = Uuid::new_v4();
    let theirs = category(&kb, someone_else, "Theirs").await;
    faq(&kb, someone_else, "not yours", Some(theirs.id)).await;
    faq(&kb, someone_else, "also not yours", Some(theirs.id)).await;

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();

    for key in [GroupKey::Category(Uuid::new_v4()), GroupKey::Category(theirs.id)] {
        let result = manager.reorder(key, 0, 0).await;
        assert!(matches!(result, Err(AppError::NotFound("category"))));
    }

    let stored = stored_group(&kb, someone_else, GroupKey::Category(theirs.id)).await;
    assert_eq!(questions(&stored), vec!["not yours", "also not yours"]);
}

#[tokio::test]
async fn test_reorder_reloads_when_faq_vanished() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();
    let general = category(&kb, user, "General").await;
    let first = faq(&kb, user, "first", Some(general.id)).await;
    faq(&kb, user, "second", Some(general.id)).await;
    let key = GroupKey::Category(general.id);

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    // Deleted elsewhere after the manager loaded.
    kb.delete_faq(user, first.id).await.unwrap();

    let result = manager.reorder(key, 1, 0).await;

    assert!(result.unwrap_err().is_not_found());
    let group = manager.group(key);
    assert_eq!(questions(&group), vec!["second"]);
    // The batch rolled back, so the surviving FAQ kept its position.
    assert_eq!(positions(&group), vec![1]);
}

#[tokio::test]
async fn test_grouped_view_provisions_defaults_and_hides_empty_groups_when_searching() {
    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user = Uuid::new_v4();

    let mut manager = OrderingManager::new(kb.clone(), user);
    manager.load().await.unwrap();
    assert_eq!(manager.categories().len(), 4);

    let billing = manager
        .categories()
        .iter()
        .find(|c| c.name == "Billing")
        .cloned()
        .unwrap();
    faq(&kb, user, "Do you offer refunds?", Some(billing.id)).await;
    faq(&kb, user, "Where is my parcel?", None).await;
    manager.load().await.unwrap();

    let all = manager.grouped(None);
    assert_eq!(all.len(), 5);
    assert_eq!(all.last().unwrap().key, GroupKey::Uncategorized);
    assert!(all.iter().take(4).any(|g| g.faqs.is_empty()));

    let searched = manager.grouped(Some("REFUND"));
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].key, GroupKey::Category(billing.id));

    assert!(manager.grouped(Some("warranty")).is_empty());
    assert_eq!(manager.grouped(Some("   ")).len(), 5);
}
