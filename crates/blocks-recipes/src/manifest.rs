//! Recipe Manifest: a package's bundle of recipe definitions.
//!
//! A manifest is a JSON file contributed by one package:
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "package": "blocks-core",
//!   "namespace": "core",
//!   "recipes": [
//!     { "id": "magic_formula", "name": "Magic Formula", "kind": "screen",
//!       "logic": { ... }, "presentation": { ... } }
//!   ]
//! }
//! ```
//!
//! `logic` and `presentation` are opaque here. Only `id`, `name` and `kind`
//! take part in validation and the registry merge.
//!
//! ## Frozen Surfaces
//! - RECIPE_MANIFEST_SCHEMA_VERSION: "1.0.0"
//! - RecipeManifest canonical bytes field order
//! - RecipeDefinition canonical bytes field order
//! - Recipes hashed in manifest order (order is significant)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

// =============================================================================
// Schema Version
// =============================================================================

/// Schema version for recipe manifest format.
pub const RECIPE_MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

// =============================================================================
// Recipe Definition
// =============================================================================

/// One pre-built analysis definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub id: String,
    pub name: String,
    /// Picker grouping, e.g. "screen", "chart", "table".
    pub kind: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub logic: serde_json::Value,

    #[serde(default)]
    pub presentation: serde_json::Value,
}

impl RecipeDefinition {
    /// Compute canonical bytes for hashing (frozen field order).
    ///
    /// Field order:
    /// 1. id (u32 LE len + UTF-8)
    /// 2. name (u32 LE len + UTF-8)
    /// 3. kind (u32 LE len + UTF-8)
    /// 4. description (u32 LE len + UTF-8)
    /// 5. logic (compact JSON text, u32 LE len + UTF-8)
    /// 6. presentation (compact JSON text, u32 LE len + UTF-8)
    ///
    /// JSON object keys serialise sorted, so payload text is stable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_string(&mut bytes, &self.id);
        write_string(&mut bytes, &self.name);
        write_string(&mut bytes, &self.kind);
        write_string(&mut bytes, &self.description);
        write_string(&mut bytes, &self.logic.to_string());
        write_string(&mut bytes, &self.presentation.to_string());
        bytes
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Root manifest structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeManifest {
    pub schema_version: String,
    pub package: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Recipes in contribution order.
    #[serde(default)]
    pub recipes: Vec<RecipeDefinition>,
}

impl RecipeManifest {
    /// Build an in-memory manifest at the current schema version.
    pub fn new(package: impl Into<String>, recipes: Vec<RecipeDefinition>) -> Self {
        Self {
            schema_version: RECIPE_MANIFEST_SCHEMA_VERSION.to_string(),
            package: package.into(),
            namespace: None,
            recipes,
        }
    }

    /// Load manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_json(&content, path)
    }

    /// Parse manifest from JSON string.
    pub fn from_json(json: &str, path: &Path) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(json).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        if manifest.schema_version != RECIPE_MANIFEST_SCHEMA_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                path: path.to_path_buf(),
                expected: RECIPE_MANIFEST_SCHEMA_VERSION.to_string(),
                found: manifest.schema_version.clone(),
            });
        }

        Ok(manifest)
    }

    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ManifestError> {
        let manifest = Self::load(path)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate manifest integrity.
    ///
    /// Checks:
    /// 1. every recipe id is non-blank
    /// 2. every recipe name is non-blank
    ///
    /// Duplicate ids inside one manifest are allowed; the later one wins at
    /// merge time like any same-tier collision.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (index, recipe) in self.recipes.iter().enumerate() {
            if recipe.id.trim().is_empty() {
                return Err(ManifestError::EmptyRecipeId {
                    package: self.package.clone(),
                    index,
                });
            }
            if recipe.name.trim().is_empty() {
                return Err(ManifestError::EmptyRecipeName {
                    package: self.package.clone(),
                    recipe_id: recipe.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Compute canonical bytes for hashing (frozen field order).
    ///
    /// Field order:
    /// 1. schema_version (u32 LE len + UTF-8)
    /// 2. package (u32 LE len + UTF-8)
    /// 3. namespace presence tag: 0x00 if None, 0x01 + string if Some
    /// 4. recipes (u32 LE count + RecipeDefinition bytes, manifest order)
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        write_string(&mut bytes, &self.schema_version);
        write_string(&mut bytes, &self.package);

        match &self.namespace {
            None => bytes.push(0x00),
            Some(ns) => {
                bytes.push(0x01);
                write_string(&mut bytes, ns);
            }
        }

        bytes.extend_from_slice(&(self.recipes.len() as u32).to_le_bytes());
        for recipe in &self.recipes {
            bytes.extend_from_slice(&recipe.canonical_bytes());
        }

        bytes
    }

    /// Compute SHA-256 hash of canonical bytes.
    pub fn compute_version_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Compute version hash as hex string (for display/logging).
    pub fn compute_version_hash_hex(&self) -> String {
        hex::encode(self.compute_version_hash())
    }

    pub fn get_recipe(&self, id: &str) -> Option<&RecipeDefinition> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

/// Write a string with length prefix (u32 LE len + UTF-8 bytes).
pub(crate) fn write_string(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

// =============================================================================
// Manifest Errors
// =============================================================================

/// Errors from recipe manifest loading and validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error loading manifest from {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Parse error in manifest {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Unsupported manifest version in {path}: expected {expected}, found {found}")]
    UnsupportedVersion {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Empty recipe id at index {index} in package '{package}'")]
    EmptyRecipeId { package: String, index: usize },

    #[error("Empty name for recipe '{recipe_id}' in package '{package}'")]
    EmptyRecipeName { package: String, recipe_id: String },
}

// =============================================================================
// Tests
// =============================================================================
