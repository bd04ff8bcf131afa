use std::sync::{Arc, Mutex, MutexGuard};

use super::log_warnings;
use super::persistence::Persistence;
use crate::error::{NotFound, Result, StoreError};
use crate::models::*;
use crate::validation;

struct DefinitionsState {
    doc: DefinitionsDocument,
    persistence: Box<dyn Persistence<DefinitionsDocument>>,
}

/// Owner of the definitions document (features and tech tags).
///
/// Removing a definition never touches tasks that still reference it; those
/// references show up as warnings the next time the project is validated.
#[derive(Clone)]
pub struct DefinitionsStore {
    state: Arc<Mutex<DefinitionsState>>,
}

impl DefinitionsStore {
    pub fn open(persistence: impl Persistence<DefinitionsDocument> + 'static) -> Result<Self> {
        let doc = persistence.load()?;
        Ok(Self {
            state: Arc::new(Mutex::new(DefinitionsState {
                doc,
                persistence: Box::new(persistence),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DefinitionsState> {
        self.state.lock().expect("definitions store lock poisoned")
    }

    fn commit<T>(&self, mutate: impl FnOnce(&mut DefinitionsDocument) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        let mut next = state.doc.clone();
        let out = mutate(&mut next)?;
        if let Err(e) = state.persistence.save(&next) {
            tracing::error!("Failed to save definitions document: {}", e);
            return Err(e);
        }
        state.doc = next;
        Ok(out)
    }

    pub fn snapshot(&self) -> DefinitionsDocument {
        self.lock().doc.clone()
    }

    /// Write the current document as-is, creating the file if absent.
    pub fn persist(&self) -> Result<()> {
        self.commit(|_| Ok(()))
    }

    // ============================================================
    // Features
    // ============================================================

    pub fn list_features(&self) -> Vec<Feature> {
        self.lock()
            .doc
            .features
            .iter()
            .map(|(name, spec)| Feature {
                name: name.clone(),
                spec: spec.clone(),
            })
            .collect()
    }

    pub fn add_feature(&self, input: CreateFeatureInput) -> Result<Checked<Feature>> {
        validation::validate_feature_name(&input.name).into_result("feature", &input.name)?;
        let name = input.name;
        let spec = FeatureSpec {
            description: input.description,
            common_tags: input.common_tags,
            related_contexts: input.related_contexts,
        };

        let warnings = self.commit(|doc| {
            if doc.has_feature(&name) {
                return Err(StoreError::Duplicate {
                    kind: "Feature",
                    name: name.clone(),
                });
            }
            let warnings = check_feature_spec(doc, &spec)?;
            doc.features.insert(name.clone(), spec.clone());
            Ok(warnings)
        })?;

        tracing::info!("Feature '{}' added", name);
        log_warnings(&warnings);
        Ok(Checked::new(Feature { name, spec }, warnings))
    }

    pub fn update_feature(&self, name: &str, input: UpdateFeatureInput) -> Result<Checked<Feature>> {
        let (spec, warnings) = self.commit(|doc| {
            let existing = doc
                .features
                .get(name)
                .ok_or_else(|| NotFound::Feature {
                    name: name.to_string(),
                })?;
            let spec = FeatureSpec {
                description: input.description.unwrap_or_else(|| existing.description.clone()),
                common_tags: input
                    .common_tags
                    .unwrap_or_else(|| existing.common_tags.clone()),
                related_contexts: input
                    .related_contexts
                    .unwrap_or_else(|| existing.related_contexts.clone()),
            };
            let warnings = check_feature_spec(doc, &spec)?;
            doc.features.insert(name.to_string(), spec.clone());
            Ok((spec, warnings))
        })?;

        tracing::info!("Feature '{}' updated", name);
        log_warnings(&warnings);
        Ok(Checked::new(
            Feature {
                name: name.to_string(),
                spec,
            },
            warnings,
        ))
    }

    pub fn remove_feature(&self, name: &str) -> Result<()> {
        self.commit(|doc| {
            doc.features
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| NotFound::Feature {
                    name: name.to_string(),
                }
                .into())
        })?;
        tracing::info!("Feature '{}' removed", name);
        Ok(())
    }

    // ============================================================
    // Tech tags
    // ============================================================

    pub fn list_tech_tags(&self) -> Vec<TechTag> {
        self.lock()
            .doc
            .tech_tags
            .iter()
            .map(|(name, description)| TechTag {
                name: name.clone(),
                description: description.clone(),
            })
            .collect()
    }

    pub fn add_tech_tag(&self, name: &str, description: &str) -> Result<TechTag> {
        validation::validate_tag_name(name).into_result("tech_tag", name)?;
        self.commit(|doc| {
            if doc.has_tech_tag(name) {
                return Err(StoreError::Duplicate {
                    kind: "Tech tag",
                    name: name.to_string(),
                });
            }
            doc.tech_tags
                .insert(name.to_string(), description.to_string());
            Ok(())
        })?;
        tracing::info!("Tech tag '{}' added", name);
        Ok(TechTag {
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    pub fn update_tech_tag(&self, name: &str, description: &str) -> Result<TechTag> {
        self.commit(|doc| {
            let slot = doc
                .tech_tags
                .get_mut(name)
                .ok_or_else(|| NotFound::TechTag {
                    name: name.to_string(),
                })?;
            *slot = description.to_string();
            Ok(())
        })?;
        tracing::info!("Tech tag '{}' updated", name);
        Ok(TechTag {
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    pub fn remove_tech_tag(&self, name: &str) -> Result<()> {
        self.commit(|doc| {
            doc.tech_tags
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| NotFound::TechTag {
                    name: name.to_string(),
                }
                .into())
        })?;
        tracing::info!("Tech tag '{}' removed", name);
        Ok(())
    }
}

/// Tag and context names in a feature must be well-formed; undeclared tags
/// only warn.
fn check_feature_spec(doc: &DefinitionsDocument, spec: &FeatureSpec) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    for tag in &spec.common_tags {
        validation::validate_tag_name(tag).into_result("common_tag", tag)?;
        if !doc.has_tech_tag(tag) {
            warnings.push(format!("Tag '{tag}' is not a declared tech tag"));
        }
    }
    for context in &spec.related_contexts {
        validation::validate_context_name(context).into_result("related_context", context)?;
    }
    Ok(warnings)
}
