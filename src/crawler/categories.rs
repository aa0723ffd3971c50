//! Leaf category discovery
//!
//! Walks a category tree depth-first with an explicit work stack, fetching
//! every child through `/categories/{id}`.

use crate::api::{ApiClient, Category, CategoryId};
use crate::MeliError;
use std::collections::HashSet;

/// A base category and the leaves found beneath it
#[derive(Debug, Clone)]
pub struct CategoryTree {
    pub root: Category,
    pub leaves: Vec<Category>,
}

/// Finds every leaf category under `base`
///
/// Leaves are returned in depth-first order, children visited in the order
/// the API lists them. A child that cannot be fetched is logged and its
/// subtree skipped; authentication errors abort the walk.
///
/// # Arguments
///
/// * `client` - Authenticated API client
/// * `base` - Root of the walk
///
/// # Returns
///
/// * `Ok(CategoryTree)` - The root and its leaves (the root itself when it has no children)
/// * `Err(MeliError)` - The root could not be fetched, or authentication failed
pub async fn find_leaf_categories(
    client: &ApiClient,
    base: &CategoryId,
) -> Result<CategoryTree, MeliError> {
    let root = client.get_category(base).await?;

    let mut leaves = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(root.id.clone());
    let mut stack = vec![root.clone()];

    while let Some(category) = stack.pop() {
        if category.is_leaf() {
            leaves.push(category);
            continue;
        }

        let mut children = Vec::with_capacity(category.children_categories.len());
        for child in &category.children_categories {
            if !seen.insert(child.id.clone()) {
                tracing::debug!("Category {} already visited", child.id);
                continue;
            }

            let id = match CategoryId::parse(&child.id) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Skipping child of {}: {}", category.id, e);
                    continue;
                }
            };

            match client.get_category(&id).await {
                Ok(fetched) => children.push(fetched),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Skipping subtree {}: {}", id, e),
            }
        }

        // reversed so the first listed child is visited first
        stack.extend(children.into_iter().rev());
    }

    tracing::debug!("Base category {}: {} leaf categories", base, leaves.len());
    Ok(CategoryTree { root, leaves })
}
