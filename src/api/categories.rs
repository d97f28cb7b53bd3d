//! Category endpoints

use crate::api::ExtractUser;
use crate::api::categories::schemas::{CategoryList, CreateCategory};
use crate::core::traits::{KnowledgeBaseService, NewCategory};
use crate::error::AppError;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/defaults", post(ensure_default_categories))
}

async fn list_categories(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
) -> Result<Json<CategoryList>, AppError> {
    let categories = knowledge_base.list_categories(current_user).await?;
    Ok(Json(CategoryList::from(categories)))
}

async fn create_category(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
    Json(create_category): Json<CreateCategory>,
) -> Result<(StatusCode, Json<schemas::Category>), AppError> {
    let category = knowledge_base
        .create_category(
            current_user,
            NewCategory {
                name: create_category.name,
                description: create_category.description,
                color: create_category.color,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

async fn ensure_default_categories(
    Inject(knowledge_base): Inject<dyn KnowledgeBaseService>,
    ExtractUser(current_user): ExtractUser,
) -> Result<Json<CategoryList>, AppError> {
    let categories = knowledge_base
        .ensure_default_categories(current_user)
        .await?;
    Ok(Json(CategoryList::from(categories)))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug)]
    pub struct CreateCategory {
        pub name: String,
        pub description: Option<String>,
        pub color: Option<String>,
    }

    #[derive(Serialize, Debug)]
    pub struct Category {
        pub id: Uuid,
        pub name: String,
        pub description: String,
        pub color: String,
        pub sort_position: i64,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Category> for Category {
        fn from(category: entities::Category) -> Self {
            Category {
                id: category.id,
                name: category.name,
                description: category.description,
                color: category.color,
                sort_position: category.sort_position,
                created_at: category.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct CategoryList {
        pub categories: Vec<Category>,
    }

    impl From<Vec<entities::Category>> for CategoryList {
        fn from(categories: Vec<entities::Category>) -> Self {
            CategoryList {
                categories: categories.into_iter().map(Category::from).collect(),
            }
        }
    }
}
