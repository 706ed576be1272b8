//! # Blocks Recipes
//!
//! Recipe manifests and the trust-tiered registry that merges them.
//!
//! ## Modules
//! - `manifest`: manifest schema, validation and version hash
//! - `registry`: `TrustTier`, sources, and the merge into `RecipeRegistry`

pub mod manifest;
pub mod registry;

pub use manifest::{
    ManifestError, RECIPE_MANIFEST_SCHEMA_VERSION, RecipeDefinition, RecipeManifest,
};
pub use registry::{
    RecipeFilter, RecipeRegistry, RecipeSource, RegistryEntry, TrustTier, UnknownTrustTier,
};
