//! Category grouping and drag-and-drop reordering of FAQs.

use crate::core::traits::{FaqFilter, KnowledgeBaseService};
use crate::error::{AppError, AppResult};
use crate::infrastructure::entities::{Category, Faq};
use di::Ref;
use log::{error, warn};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Wire name of the implicit group holding FAQs without a category.
pub const UNCATEGORIZED_KEY: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Category(Uuid),
    Uncategorized,
}

impl GroupKey {
    pub fn from_category(category_id: Option<Uuid>) -> Self {
        category_id.map_or(GroupKey::Uncategorized, GroupKey::Category)
    }

    pub fn category_id(&self) -> Option<Uuid> {
        match self {
            GroupKey::Category(id) => Some(*id),
            GroupKey::Uncategorized => None,
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Category(id) => write!(f, "{id}"),
            GroupKey::Uncategorized => f.write_str(UNCATEGORIZED_KEY),
        }
    }
}

impl FromStr for GroupKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNCATEGORIZED_KEY {
            Ok(GroupKey::Uncategorized)
        } else {
            Uuid::from_str(s).map(GroupKey::Category)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaqGroup {
    pub key: GroupKey,
    /// `None` for the uncategorized group.
    pub category: Option<Category>,
    pub faqs: Vec<Faq>,
}

/// Display order inside a group; ties keep insertion order.
pub fn sort_group(faqs: &mut [Faq]) {
    faqs.sort_by(|a, b| {
        a.sort_position
            .cmp(&b.sort_position)
            .then(a.created_at.cmp(&b.created_at))
    });
}

fn matches_search(faq: &Faq, needle: &str) -> bool {
    faq.question.to_lowercase().contains(needle)
        || faq.answer.to_lowercase().contains(needle)
        || faq.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

/// Case-insensitive substring match over question, answer and tags.
pub fn filter_faqs(faqs: &[Faq], term: &str) -> Vec<Faq> {
    let needle = term.trim().to_lowercase();
    faqs.iter()
        .filter(|faq| needle.is_empty() || matches_search(faq, &needle))
        .cloned()
        .collect()
}

/// One group per category in category order, then the uncategorized group if
/// it has any FAQ. FAQs pointing at an unknown category count as
/// uncategorized.
pub fn group_by_category(faqs: &[Faq], categories: &[Category]) -> Vec<FaqGroup> {
    let mut groups: Vec<FaqGroup> = categories
        .iter()
        .map(|category| FaqGroup {
            key: GroupKey::Category(category.id),
            category: Some(category.clone()),
            faqs: Vec::new(),
        })
        .collect();
    let mut uncategorized = Vec::new();

    for faq in faqs {
        let group = faq
            .category_id
            .and_then(|id| groups.iter_mut().find(|g| g.key == GroupKey::Category(id)));
        match group {
            Some(group) => group.faqs.push(faq.clone()),
            None => uncategorized.push(faq.clone()),
        }
    }

    if !uncategorized.is_empty() {
        groups.push(FaqGroup {
            key: GroupKey::Uncategorized,
            category: None,
            faqs: uncategorized,
        });
    }

    for group in &mut groups {
        sort_group(&mut group.faqs);
    }
    groups
}

/// Removes the element at `from` and reinserts it at `to`, where `to` indexes
/// the list after the removal.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> AppResult<()> {
    if from >= items.len() || to >= items.len() {
        return Err(AppError::validation(format!(
            "cannot move item {from} to {to} in a group of {}",
            items.len()
        )));
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

/// Gives every FAQ its index as position, returns the ids whose position changed.
pub fn densify(faqs: &mut [Faq]) -> Vec<(Uuid, i64)> {
    let mut changed = Vec::new();
    for (index, faq) in faqs.iter_mut().enumerate() {
        let position = index as i64;
        if faq.sort_position != position {
            faq.sort_position = position;
            changed.push((faq.id, position));
        }
    }
    changed
}

/// An owner's loaded knowledge base, kept consistent with user reordering.
///
/// The store stays authoritative: a failed write discards the optimistic
/// order and reloads.
pub struct OrderingManager {
    store: Ref<dyn KnowledgeBaseService>,
    user_id: Uuid,
    faqs: Vec<Faq>,
    categories: Vec<Category>,
}

impl OrderingManager {
    pub fn new(store: Ref<dyn KnowledgeBaseService>, user_id: Uuid) -> Self {
        OrderingManager {
            store,
            user_id,
            faqs: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Fetches categories (provisioning the defaults) and FAQs.
    pub async fn load(&mut self) -> AppResult<()> {
        let categories = self.store.ensure_default_categories(self.user_id).await?;
        let faqs = self
            .store
            .list_faqs(self.user_id, FaqFilter::default())
            .await?;
        self.categories = categories;
        self.faqs = faqs;
        Ok(())
    }

    pub fn faqs(&self) -> &[Faq] {
        &self.faqs
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Grouped view. With a search term, only matching FAQs are kept and
    /// groups left empty are hidden.
    pub fn grouped(&self, search: Option<&str>) -> Vec<FaqGroup> {
        match search.map(str::trim).filter(|term| !term.is_empty()) {
            None => group_by_category(&self.faqs, &self.categories),
            Some(term) => {
                let matching = filter_faqs(&self.faqs, term);
                group_by_category(&matching, &self.categories)
                    .into_iter()
                    .filter(|group| !group.faqs.is_empty())
                    .collect()
            }
        }
    }

    /// FAQs of one group in display order.
    pub fn group(&self, key: GroupKey) -> Vec<Faq> {
        group_by_category(&self.faqs, &self.categories)
            .into_iter()
            .find(|group| group.key == key)
            .map(|group| group.faqs)
            .unwrap_or_default()
    }

    /// Moves a FAQ inside its group and renumbers the group `0..n`.
    ///
    /// The changed positions are written in one batch. When the batch fails
    /// nothing is stored, the manager reloads, and if the reload fails too
    /// the order from before the move is restored.
    pub async fn reorder(&mut self, key: GroupKey, from: usize, to: usize) -> AppResult<Vec<Faq>> {
        if let GroupKey::Category(id) = key {
            if !self.categories.iter().any(|category| category.id == id) {
                return Err(AppError::NotFound("category"));
            }
        }

        let mut group = self.group(key);
        move_item(&mut group, from, to)?;
        let changed = densify(&mut group);
        if changed.is_empty() {
            return Ok(group);
        }

        let snapshot = self.faqs.clone();
        for faq in &group {
            self.replace(faq.clone());
        }

        match self.store.update_positions(self.user_id, changed).await {
            Ok(updated) => {
                for faq in updated {
                    self.replace(faq);
                }
                Ok(self.group(key))
            }
            Err(e) => {
                warn!("reordering group {key} failed, reloading: {e}");
                if let Err(reload) = self.load().await {
                    error!("reloading knowledge base failed: {reload}");
                    self.faqs = snapshot;
                }
                Err(e)
            }
        }
    }

    fn replace(&mut self, faq: Faq) {
        if let Some(slot) = self.faqs.iter_mut().find(|f| f.id == faq.id) {
            *slot = faq;
        }
    }
}
