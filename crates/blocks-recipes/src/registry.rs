//! Recipe Registry: merges trust-tiered manifests into one catalog.
//!
//! ## Merge Law (frozen)
//! 1. Sources below `min_trust` are dropped before anything else.
//! 2. Sources are visited in caller order, recipes in manifest order.
//! 3. A new id is appended to the catalog.
//! 4. An existing id is replaced iff `new.rank() >= existing.rank()`.
//!    Equal tiers are last-source-wins; a lower tier never overrides a
//!    higher one, whatever the load order.
//! 5. A replaced entry keeps its original catalog position.
//!
//! The registry is rebuilt from scratch on every `load`; it is never
//! mutated incrementally.

use crate::manifest::{ManifestError, RecipeDefinition, RecipeManifest, write_string};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

// =============================================================================
// Trust Tier
// =============================================================================

/// Trust level of a contributing source. `Core > Commons > ThirdParty`.
///
/// Frozen: variant order defines `Ord`; do not reorder.
///
/// The default is the least restrictive tier, i.e. no trust filtering.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    #[default]
    #[serde(alias = "thirdParty")]
    ThirdParty,
    Commons,
    Core,
}

impl TrustTier {
    pub const ALL: [TrustTier; 3] = [TrustTier::Core, TrustTier::Commons, TrustTier::ThirdParty];

    /// Numeric rank used by the merge comparison.
    pub fn rank(self) -> u8 {
        match self {
            TrustTier::ThirdParty => 1,
            TrustTier::Commons => 2,
            TrustTier::Core => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::ThirdParty => "third_party",
            TrustTier::Commons => "commons",
            TrustTier::Core => "core",
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustTier {
    type Err = UnknownTrustTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(TrustTier::Core),
            "commons" => Ok(TrustTier::Commons),
            "third_party" | "thirdParty" | "third-party" => Ok(TrustTier::ThirdParty),
            other => Err(UnknownTrustTier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown trust tier '{0}' (expected core, commons or third_party)")]
pub struct UnknownTrustTier(pub String);

// =============================================================================
// Sources and Entries
// =============================================================================

/// A manifest annotated with who contributed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSource {
    pub id: String,
    pub trust_tier: TrustTier,
    pub manifest: RecipeManifest,
}

impl RecipeSource {
    pub fn new(id: impl Into<String>, trust_tier: TrustTier, manifest: RecipeManifest) -> Self {
        Self {
            id: id.into(),
            trust_tier,
            manifest,
        }
    }

    /// Load and validate a manifest file as a source.
    pub fn load(path: &Path, id: &str, trust_tier: TrustTier) -> Result<Self, ManifestError> {
        let manifest = RecipeManifest::load_validated(path)?;
        debug!(
            source = id,
            tier = %trust_tier,
            recipes = manifest.recipe_count(),
            hash = %manifest.compute_version_hash_hex(),
            "Loaded recipe manifest"
        );
        Ok(Self::new(id, trust_tier, manifest))
    }
}

/// A recipe definition with the source that won its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub recipe: RecipeDefinition,
    pub source_id: String,
    pub trust_tier: TrustTier,
}

impl RegistryEntry {
    pub fn id(&self) -> &str {
        &self.recipe.id
    }

    pub fn kind(&self) -> &str {
        &self.recipe.kind
    }
}

/// Read-side filter for `list_recipes`. Default keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFilter {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub min_trust: TrustTier,
}

impl RecipeFilter {
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn min_trust(mut self, tier: TrustTier) -> Self {
        self.min_trust = tier;
        self
    }

    fn matches(&self, entry: &RegistryEntry) -> bool {
        entry.trust_tier >= self.min_trust
            && self.kind.as_deref().is_none_or(|k| entry.recipe.kind == k)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Merged, deduplicated recipe catalog.
///
/// ## Usage
/// ```ignore
/// let registry = RecipeRegistry::load(&sources, TrustTier::Commons);
/// let screens = registry.list_recipes(&RecipeFilter::default().kind("screen"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRegistry {
    entries: Vec<RegistryEntry>,
}

impl RecipeRegistry {
    /// Merge sources into a fresh catalog.
    pub fn load(sources: &[RecipeSource], min_trust: TrustTier) -> Self {
        let mut entries: Vec<RegistryEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for source in sources {
            if source.trust_tier < min_trust {
                debug!(
                    source = %source.id,
                    tier = %source.trust_tier,
                    min_trust = %min_trust,
                    "Skipping recipe source below minimum trust"
                );
                continue;
            }

            for recipe in &source.manifest.recipes {
                let candidate = RegistryEntry {
                    recipe: recipe.clone(),
                    source_id: source.id.clone(),
                    trust_tier: source.trust_tier,
                };

                match positions.get(&recipe.id) {
                    None => {
                        positions.insert(recipe.id.clone(), entries.len());
                        entries.push(candidate);
                    }
                    Some(&pos) => {
                        let existing = &entries[pos];
                        if candidate.trust_tier.rank() >= existing.trust_tier.rank() {
                            info!(
                                recipe = %recipe.id,
                                from = %existing.source_id,
                                to = %candidate.source_id,
                                tier = %candidate.trust_tier,
                                "Recipe overridden"
                            );
                            entries[pos] = candidate;
                        } else {
                            debug!(
                                recipe = %recipe.id,
                                kept = %existing.source_id,
                                ignored = %candidate.source_id,
                                "Lower-trust recipe definition ignored"
                            );
                        }
                    }
                }
            }
        }

        info!(
            sources = sources.len(),
            entries = entries.len(),
            min_trust = %min_trust,
            "Recipe registry loaded"
        );
        Self { entries }
    }

    /// Entries in catalog order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries passing `filter`, in catalog order.
    pub fn list_recipes(&self, filter: &RecipeFilter) -> Vec<&RegistryEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Linear lookup; catalogs hold tens of entries.
    pub fn get_recipe_by_id(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.recipe.id == id)
    }

    /// Entries grouped by kind for the recipe picker (catalog order within a kind).
    pub fn group_by_kind(&self) -> BTreeMap<&str, Vec<&RegistryEntry>> {
        let mut groups: BTreeMap<&str, Vec<&RegistryEntry>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.kind()).or_default().push(entry);
        }
        groups
    }

    /// SHA-256 over (id, source_id, tier) of every entry, sorted by id.
    ///
    /// Independent of catalog order, so a reload that only reorders sources
    /// without changing winners yields the same digest.
    pub fn digest(&self) -> String {
        let mut sorted: Vec<&RegistryEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.recipe.id.cmp(&b.recipe.id));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
        for entry in sorted {
            write_string(&mut bytes, &entry.recipe.id);
            write_string(&mut bytes, &entry.source_id);
            write_string(&mut bytes, entry.trust_tier.as_str());
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: &str, kind: &str, name: &str) -> RecipeDefinition {
        RecipeDefinition {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            description: String::new(),
            logic: serde_json::Value::Null,
            presentation: serde_json::Value::Null,
        }
    }

    fn source(id: &str, tier: TrustTier, recipes: Vec<RecipeDefinition>) -> RecipeSource {
        RecipeSource::new(id, tier, RecipeManifest::new(id, recipes))
    }

    #[test]
    fn test_tier_order() {
        assert!(TrustTier::Core > TrustTier::Commons);
        assert!(TrustTier::Commons > TrustTier::ThirdParty);
        assert!(TrustTier::Core.rank() > TrustTier::ThirdParty.rank());
        assert_eq!(TrustTier::default(), TrustTier::ThirdParty);
    }

    #[test]
    fn test_tier_parse_and_serde() {
        assert_eq!("thirdParty".parse::<TrustTier>().unwrap(), TrustTier::ThirdParty);
        assert_eq!("core".parse::<TrustTier>().unwrap(), TrustTier::Core);
        assert!("gold".parse::<TrustTier>().is_err());

        let tier: TrustTier = serde_json::from_str("\"thirdParty\"").unwrap();
        assert_eq!(tier, TrustTier::ThirdParty);
        assert_eq!(serde_json::to_string(&TrustTier::ThirdParty).unwrap(), "\"third_party\"");
    }

    #[test]
    fn test_equal_tier_later_source_wins() {
        let sources = vec![
            source("pkg-a", TrustTier::Commons, vec![recipe("x", "screen", "A")]),
            source("pkg-b", TrustTier::Commons, vec![recipe("x", "screen", "B")]),
        ];
        let registry = RecipeRegistry::load(&sources, TrustTier::ThirdParty);
        let entry = registry.get_recipe_by_id("x").unwrap();
        assert_eq!(entry.source_id, "pkg-b");
        assert_eq!(entry.recipe.name, "B");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_core_beats_third_party_in_either_order() {
        let core = source("core", TrustTier::Core, vec![recipe("x", "screen", "Core")]);
        let third = source("plugin", TrustTier::ThirdParty, vec![recipe("x", "screen", "Plugin")]);

        for sources in [vec![core.clone(), third.clone()], vec![third, core]] {
            let registry = RecipeRegistry::load(&sources, TrustTier::ThirdParty);
            let entry = registry.get_recipe_by_id("x").unwrap();
            assert_eq!(entry.source_id, "core");
            assert_eq!(entry.trust_tier, TrustTier::Core);
        }
    }

    #[test]
    fn test_min_trust_excludes_sole_lower_provider() {
        let sources = vec![
            source("core", TrustTier::Core, vec![recipe("a", "screen", "A")]),
            source("commons", TrustTier::Commons, vec![recipe("b", "chart", "B")]),
            source("plugin", TrustTier::ThirdParty, vec![recipe("c", "chart", "C")]),
        ];
        let registry = RecipeRegistry::load(&sources, TrustTier::Core);
        assert_eq!(registry.len(), 1);
        assert!(registry.get_recipe_by_id("b").is_none());
        assert!(registry.get_recipe_by_id("c").is_none());
    }

    #[test]
    fn test_replacement_keeps_position() {
        let sources = vec![
            source("plugin", TrustTier::ThirdParty, vec![
                recipe("first", "screen", "1"),
                recipe("second", "screen", "2"),
            ]),
            source("core", TrustTier::Core, vec![recipe("first", "screen", "1*")]),
        ];
        let registry = RecipeRegistry::load(&sources, TrustTier::ThirdParty);
        let ids: Vec<_> = registry.entries().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(registry.entries()[0].source_id, "core");
    }

    #[test]
    fn test_list_filter_and_grouping() {
        let sources = vec![
            source("core", TrustTier::Core, vec![
                recipe("a", "screen", "A"),
                recipe("b", "chart", "B"),
            ]),
            source("plugin", TrustTier::ThirdParty, vec![recipe("c", "screen", "C")]),
        ];
        let registry = RecipeRegistry::load(&sources, TrustTier::ThirdParty);

        assert_eq!(registry.list_recipes(&RecipeFilter::default()).len(), 3);

        let screens = registry.list_recipes(&RecipeFilter::default().kind("screen"));
        assert_eq!(screens.iter().map(|e| e.id()).collect::<Vec<_>>(), vec!["a", "c"]);

        let trusted = registry.list_recipes(&RecipeFilter::default().min_trust(TrustTier::Commons));
        assert_eq!(trusted.len(), 2);

        let groups = registry.group_by_kind();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["chart", "screen"]);
        assert_eq!(groups["screen"].len(), 2);
    }

    #[test]
    fn test_digest_tracks_winners_not_order() {
        let a = source("pkg-a", TrustTier::Commons, vec![recipe("x", "screen", "A")]);
        let b = source("pkg-b", TrustTier::Commons, vec![recipe("y", "screen", "B")]);
        let c = source("pkg-c", TrustTier::Commons, vec![recipe("x", "screen", "C")]);

        let ab = RecipeRegistry::load(&[a.clone(), b.clone()], TrustTier::ThirdParty);
        let ba = RecipeRegistry::load(&[b.clone(), a.clone()], TrustTier::ThirdParty);
        assert_eq!(ab.digest(), ba.digest());

        let abc = RecipeRegistry::load(&[a, b, c], TrustTier::ThirdParty);
        assert_ne!(ab.digest(), abc.digest());
    }

    #[test]
    fn test_empty_load() {
        let registry = RecipeRegistry::load(&[], TrustTier::Core);
        assert!(registry.is_empty());
        assert!(registry.group_by_kind().is_empty());
    }
}
