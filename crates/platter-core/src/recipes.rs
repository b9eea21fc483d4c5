//! Recipe lookup keyed by image filename.
//!
//! Catalog images are named `<dish words>_<number>.<ext>`, e.g.
//! `chicken_tikka_masala_0042.jpg`. The dish words joined by spaces form the
//! key into a recipe table loaded once at startup.
//!
//! The table is JSON lines, one recipe per line:
//!
//! ```text
//! {"lemmatized_name": "chicken tikka masala", "original_name": "Chicken Tikka Masala", "recipe": "Marinate the chicken | Grill | Simmer in sauce"}
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// One row of the recipe table as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRow {
    pub lemmatized_name: String,
    pub original_name: String,
    /// Instructions, steps separated by `|`
    pub recipe: String,
}

/// A recipe ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub original_name: String,
    pub steps: Vec<String>,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            original_name: row.original_name,
            steps: row
                .recipe
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Recipe table, loaded once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    by_key: HashMap<String, Recipe>,
}

impl RecipeBook {
    /// Build from rows. The first row for a key wins.
    pub fn from_rows(rows: impl IntoIterator<Item = RecipeRow>) -> Self {
        let mut by_key = HashMap::new();
        for row in rows {
            by_key
                .entry(row.lemmatized_name.clone())
                .or_insert_with(|| Recipe::from(row));
        }
        Self { by_key }
    }

    /// Load a JSON-lines recipe table. Blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut rows = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: RecipeRow =
                serde_json::from_str(line).map_err(|e| ArtifactError::Corrupt {
                    path: path.to_path_buf(),
                    message: format!("line {}: {}", line_no + 1, e),
                })?;
            rows.push(row);
        }

        let book = Self::from_rows(rows);
        tracing::info!("Loaded {} recipes from {:?}", book.len(), path);
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Recipe> {
        self.by_key.get(key)
    }

    /// Recipe for a catalog image path.
    pub fn lookup_path(&self, image_path: &str) -> Option<&Recipe> {
        self.get(&recipe_key(image_path))
    }
}

/// Dish key for an image path: stem words up to the first all-digit part.
pub fn recipe_key(image_path: &str) -> String {
    let stem = Path::new(image_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    stem.split('_')
        .take_while(|part| !is_number(part))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_number(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())
}
