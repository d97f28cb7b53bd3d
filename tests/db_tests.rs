//! Database and schema tests
//!
//! Checks the migrations and the constraints the repositories rely on.

mod common;

use chrono::Utc;
use common::{TestStore, setup_test_db};
use faq_assistant_api::infrastructure::entities::{ChatMessage, ChatSession, MessageRole};
use uuid::Uuid;

#[tokio::test]
async fn test_migrations_create_all_tables() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
    let tables: Vec<_> = tables.into_iter().map(|(name,)| name).collect();

    for expected in [
        "analytics",
        "assistants",
        "chat_messages",
        "chat_sessions",
        "faq_categories",
        "faqs",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }
}

#[tokio::test]
async fn test_category_names_are_unique_per_owner_ignoring_case() {
    let pool = setup_test_db().await;
    let owner = Uuid::new_v4();
    let insert = |id: Uuid, user_id: Uuid, name: &'static str| {
        sqlx::query(
            "INSERT INTO faq_categories (id, user_id, name, color, created_at) VALUES (?, ?, ?, '#fff', ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
    };

    insert(Uuid::new_v4(), owner, "Billing").execute(&pool).await.unwrap();
    let duplicate = insert(Uuid::new_v4(), owner, "BILLING").execute(&pool).await;
    let other_owner = insert(Uuid::new_v4(), Uuid::new_v4(), "billing").execute(&pool).await;

    let err = duplicate.unwrap_err();
    assert!(err.as_database_error().unwrap().is_unique_violation());
    assert!(other_owner.is_ok());
}

#[tokio::test]
async fn test_message_role_is_stored_as_integer() {
    let store = TestStore::new().await;
    let user_id = Uuid::new_v4();
    let assistant = store.assistant(user_id, "Roles", 0).await;
    let now = Utc::now();
    let session = store
        .sessions
        .create_session(ChatSession {
            id: Uuid::new_v4(),
            user_id,
            assistant_id: assistant.id,
            is_test_session: false,
            started_at: now,
            last_activity: now,
        })
        .await
        .unwrap();

    for (role, content) in [(MessageRole::User, "hi"), (MessageRole::Assistant, "hello")] {
        store
            .sessions
            .append_message(
                ChatMessage {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    role,
                    content: content.to_owned(),
                    created_at: Utc::now(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
    }

    let raw: Vec<(i64,)> = sqlx::query_as("SELECT role FROM chat_messages ORDER BY rowid")
        .fetch_all(&store.pool)
        .await
        .unwrap();
    assert_eq!(raw, vec![(1,), (2,)]);

    let messages = store.sessions.list_session_messages(session.id).await.unwrap();
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn test_deleting_a_session_removes_its_messages() {
    let store = TestStore::new().await;
    let user_id = Uuid::new_v4();
    let assistant = store.assistant(user_id, "Cascade", 0).await;
    let now = Utc::now();
    let session = store
        .sessions
        .create_session(ChatSession {
            id: Uuid::new_v4(),
            user_id,
            assistant_id: assistant.id,
            is_test_session: true,
            started_at: now,
            last_activity: now,
        })
        .await
        .unwrap();
    store
        .sessions
        .append_message(
            ChatMessage {
                id: Uuid::new_v4(),
                session_id: session.id,
                role: MessageRole::User,
                content: "bye".to_owned(),
                created_at: now,
            },
            now,
        )
        .await
        .unwrap();

    sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
        .bind(session.id)
        .execute(&store.pool)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_deleting_a_category_uncategorizes_its_faqs() {
    use faq_assistant_api::core::traits::{NewCategory, NewFaq};

    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user_id = Uuid::new_v4();
    let category = kb
        .create_category(
            user_id,
            NewCategory {
                name: "Temporary".to_owned(),
                ..NewCategory::default()
            },
        )
        .await
        .unwrap();
    let faq = kb
        .create_faq(
            user_id,
            NewFaq {
                question: "Still here?".to_owned(),
                answer: "Yes.".to_owned(),
                category_id: Some(category.id),
                ..NewFaq::default()
            },
        )
        .await
        .unwrap();

    sqlx::query("DELETE FROM faq_categories WHERE id = ?")
        .bind(category.id)
        .execute(&store.pool)
        .await
        .unwrap();

    let faq = kb.get_faq(user_id, faq.id).await.unwrap();
    assert_eq!(faq.category_id, None);
}

#[tokio::test]
async fn test_position_batch_with_missing_row_writes_nothing() {
    use faq_assistant_api::core::traits::NewFaq;

    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let user_id = Uuid::new_v4();
    let mut created = Vec::new();
    for question in ["a", "b"] {
        let faq = kb
            .create_faq(
                user_id,
                NewFaq {
                    question: question.to_owned(),
                    answer: "Yes.".to_owned(),
                    ..NewFaq::default()
                },
            )
            .await
            .unwrap();
        created.push(faq);
    }

    let batch = vec![(created[1].id, 0), (Uuid::new_v4(), 1), (created[0].id, 1)];
    let result = store.faqs.update_positions(user_id, batch, Utc::now()).await.unwrap();
    assert!(result.is_none());

    let positions: Vec<(String, i64)> =
        sqlx::query_as("SELECT question, sort_position FROM faqs ORDER BY question")
            .fetch_all(&store.pool)
            .await
            .unwrap();
    assert_eq!(positions, vec![("a".to_owned(), 0), ("b".to_owned(), 1)]);

    let swapped = vec![(created[1].id, 0), (created[0].id, 1)];
    let updated = store
        .faqs
        .update_positions(user_id, swapped, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].sort_position, 0);
    assert_eq!(updated[0].question, "b");
}

#[tokio::test]
async fn test_position_batch_ignores_other_owners_rows() {
    use faq_assistant_api::core::traits::NewFaq;

    let store = TestStore::new().await;
    let kb = store.knowledge_base();
    let owner = Uuid::new_v4();
    let faq = kb
        .create_faq(
            owner,
            NewFaq {
                question: "Mine?".to_owned(),
                answer: "Yes.".to_owned(),
                ..NewFaq::default()
            },
        )
        .await
        .unwrap();

    let err = kb
        .update_positions(Uuid::new_v4(), vec![(faq.id, 7)])
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(kb.get_faq(owner, faq.id).await.unwrap().sort_position, 0);
}
