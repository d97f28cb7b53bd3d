//! Knowledge base endpoints

use crate::api::ExtractUser;
use crate::api::faqs::schemas::{
    CreateFaq, FaqList, GroupedFaqs, ImportFaqs, ListFaqsQuery, ReorderFaqs, SearchQuery, UpdateFaq,
};
use crate::core::ordering::{GroupKey, OrderingManager};
use crate::core::traits::{FaqFilter, KnowledgeBaseService};
use crate::error::AppError;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_faqs).post(create_faq))
        .route("/import", post(import_faqs))
        .route("/grouped", get(grouped_faqs))
        .route("/reorder", post(reorder_faqs))
        .route("/:id", get(get_faq).patch(update_faq).delete(delete_faq))
}

async fn list_faqs(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Query(query): Query<ListFaqsQuery>,
) -> Result<Json<FaqList>, AppError> {
    let faqs = knowledge_base
        .list_faqs(
            current_user,
            FaqFilter {
                assistant_id: query.assistant_id,
                only_visible: query.only_visible,
            },
        )
        .await?;

    Ok(Json(FaqList::from(faqs)))
}

async fn create_faq(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Json(create_faq): Json<CreateFaq>,
) -> Result<(StatusCode, Json<schemas::Faq>), AppError> {
    let faq = knowledge_base
        .create_faq(current_user, create_faq.into())
        .await?;

    Ok((StatusCode::CREATED, Json(faq.into())))
}

async fn get_faq(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Path(faq_id): Path<Uuid>,
) -> Result<Json<schemas::Faq>, AppError> {
    let faq = knowledge_base.get_faq(current_user, faq_id).await?;
    Ok(Json(faq.into()))
}

async fn update_faq(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Path(faq_id): Path<Uuid>,
    Json(update): Json<UpdateFaq>,
) -> Result<Json<schemas::Faq>, AppError> {
    let faq = knowledge_base
        .update_faq(current_user, faq_id, update.into())
        .await?;
    Ok(Json(faq.into()))
}

async fn delete_faq(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Path(faq_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    knowledge_base.delete_faq(current_user, faq_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn import_faqs(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Json(import): Json<ImportFaqs>,
) -> Result<(StatusCode, Json<FaqList>), AppError> {
    let rows = import.faqs.into_iter().map(Into::into).collect();
    let faqs = knowledge_base.import_faqs(current_user, rows).await?;
    Ok((StatusCode::CREATED, Json(FaqList::from(faqs))))
}

async fn grouped_faqs(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<GroupedFaqs>, AppError> {
    let mut manager = OrderingManager::new(knowledge_base, current_user);
    manager.load().await?;

    let groups = manager.grouped(query.search.as_deref());
    Ok(Json(GroupedFaqs {
        groups: groups.into_iter().map(schemas::FaqGroup::from).collect(),
    }))
}

async fn reorder_faqs(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Json(reorder): Json<ReorderFaqs>,
) -> Result<Json<FaqList>, AppError> {
    let mut manager = OrderingManager::new(knowledge_base, current_user);
    manager.load().await?;

    let group = manager
        .reorder(
            GroupKey::from_category(reorder.category_id),
            reorder.from_index,
            reorder.to_index,
        )
        .await?;
    Ok(Json(FaqList::from(group)))
}

pub mod schemas {
    use crate::core::ordering;
    use crate::core::traits::{FaqUpdate, NewFaq};
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize};
    use uuid::Uuid;

    /// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
    fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct ListFaqsQuery {
        pub assistant_id: Option<Uuid>,
        #[serde(default)]
        pub only_visible: bool,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct SearchQuery {
        pub search: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct CreateFaq {
        pub assistant_id: Option<Uuid>,
        pub question: String,
        pub answer: String,
        pub category_id: Option<Uuid>,
        #[serde(default)]
        pub tags: Vec<String>,
        pub is_visible: Option<bool>,
        pub sort_position: Option<i64>,
    }

    impl From<CreateFaq> for NewFaq {
        fn from(faq: CreateFaq) -> Self {
            NewFaq {
                assistant_id: faq.assistant_id,
                question: faq.question,
                answer: faq.answer,
                category_id: faq.category_id,
                tags: faq.tags,
                is_visible: faq.is_visible,
                sort_position: faq.sort_position,
            }
        }
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct UpdateFaq {
        pub question: Option<String>,
        pub answer: Option<String>,
        #[serde(default, deserialize_with = "explicit_null")]
        pub category_id: Option<Option<Uuid>>,
        pub tags: Option<Vec<String>>,
        pub is_visible: Option<bool>,
        pub sort_position: Option<i64>,
    }

    impl From<UpdateFaq> for FaqUpdate {
        fn from(update: UpdateFaq) -> Self {
            FaqUpdate {
                question: update.question,
                answer: update.answer,
                category_id: update.category_id,
                tags: update.tags,
                is_visible: update.is_visible,
                sort_position: update.sort_position,
            }
        }
    }

    #[derive(Deserialize, Debug)]
    pub struct ImportFaqs {
        pub faqs: Vec<CreateFaq>,
    }

    #[derive(Deserialize, Debug)]
    pub struct ReorderFaqs {
        /// Omitted or `null` for the uncategorized group.
        pub category_id: Option<Uuid>,
        pub from_index: usize,
        pub to_index: usize,
    }

    #[derive(Serialize, Debug)]
    pub struct Faq {
        pub id: Uuid,
        pub assistant_id: Option<Uuid>,
        pub question: String,
        pub answer: String,
        pub category_id: Option<Uuid>,
        pub tags: Vec<String>,
        pub is_visible: bool,
        pub sort_position: i64,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Faq> for Faq {
        fn from(faq: entities::Faq) -> Self {
            Faq {
                id: faq.id,
                assistant_id: faq.assistant_id,
                question: faq.question,
                answer: faq.answer,
                category_id: faq.category_id,
                tags: faq.tags.0,
                is_visible: faq.is_visible,
                sort_position: faq.sort_position,
                created_at: faq.created_at,
                updated_at: faq.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct FaqList {
        pub faqs: Vec<Faq>,
    }

    impl From<Vec<entities::Faq>> for FaqList {
        fn from(faqs: Vec<entities::Faq>) -> Self {
            FaqList {
                faqs: faqs.into_iter().map(Faq::from).collect(),
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct FaqGroup {
        /// Category id, or `"none"` for uncategorized FAQs.
        pub key: String,
        pub category: Option<crate::api::categories::schemas::Category>,
        pub count: usize,
        pub faqs: Vec<Faq>,
    }

    impl From<ordering::FaqGroup> for FaqGroup {
        fn from(group: ordering::FaqGroup) -> Self {
            FaqGroup {
                key: group.key.to_string(),
                category: group.category.map(Into::into),
                count: group.faqs.len(),
                faqs: group.faqs.into_iter().map(Faq::from).collect(),
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct GroupedFaqs {
        pub groups: Vec<FaqGroup>,
    }
}
