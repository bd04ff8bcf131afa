use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declared features and tech tags, kept apart from the tasks document.
///
/// Tasks are cross-checked against these declarations: an undeclared context
/// or tag is reported as a warning, never rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DefinitionsDocument {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureSpec>,
    /// Tag name to description.
    #[serde(default)]
    pub tech_tags: BTreeMap<String, String>,
}

/// Stored body of a feature; the name is the map key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub common_tags: Vec<String>,
    #[serde(default)]
    pub related_contexts: Vec<String>,
}

/// A declared business capability, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(flatten)]
    pub spec: FeatureSpec,
}

/// A declared technical label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechTag {
    pub name: String,
    pub description: String,
}

/// Input for declaring a feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFeatureInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub common_tags: Vec<String>,
    #[serde(default)]
    pub related_contexts: Vec<String>,
}

/// Partial update of a feature. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeatureInput {
    pub description: Option<String>,
    pub common_tags: Option<Vec<String>>,
    pub related_contexts: Option<Vec<String>>,
}

impl DefinitionsDocument {
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn has_tech_tag(&self, name: &str) -> bool {
        self.tech_tags.contains_key(name)
    }
}
