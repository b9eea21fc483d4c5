//! Result types produced by a search.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::recipes::{Recipe, RecipeBook};

/// One ranked match from the index, resolved to its catalog path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the result list
    pub rank: usize,

    /// Catalog id (row in the index)
    pub id: usize,

    /// Distance to the query under the index metric (smaller is closer)
    pub distance: f32,

    /// Catalog path, relative to the image root
    pub path: String,
}

/// A hit joined with everything the caller can show for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub hit: SearchHit,

    /// Absolute image file, when an image root is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Recipe looked up from the image filename
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
}

impl SearchResult {
    /// Attach the image file and recipe for a hit.
    ///
    /// A missing image file or recipe is logged and left out; neither is an
    /// error for the search itself.
    pub fn assemble(
        hit: SearchHit,
        image_root: Option<&Path>,
        recipes: Option<&RecipeBook>,
    ) -> Self {
        let file = image_root.map(|root| root.join(&hit.path));
        if let Some(ref f) = file {
            if !f.exists() {
                tracing::warn!("Image not found for result {}: {:?}", hit.rank, f);
            }
        }

        let recipe = recipes.and_then(|book| {
            let found = book.lookup_path(&hit.path).cloned();
            if found.is_none() {
                tracing::warn!(
                    "Recipe not found for {:?} (key {:?})",
                    hit.path,
                    crate::recipes::recipe_key(&hit.path)
                );
            }
            found
        });

        Self { hit, file, recipe }
    }
}
