//! KGC Domain - Domain resource bundles
//!
//! A domain groups the prompts, few-shot examples, and optional type schema
//! used to extract knowledge graphs for one subject area. Bundles are read
//! from a directory layout:
//!
//! ```text
//! domain_name/
//!     extraction/
//!         prompt_open.txt
//!         prompt_constrained.txt
//!         examples.json
//!     augmentation/
//!         connectivity/
//!             prompt.txt
//!     schema.json          (optional)
//! ```
//!
//! A built-in `default` domain ships inside this crate. Domains are loaded
//! and validated on first access through [`DomainRegistry`] and are immutable
//! afterwards; loaded bundles may be shared across threads freely.

pub mod registry;

pub use registry::DomainRegistry;

use std::path::{Path, PathBuf};

use kgc_core::{DomainSchema, ExtractionMode, FewShotExample, ResourceError};

/// Substitution sites every bridging prompt must carry.
pub const BRIDGING_SITES: [&str; 3] = ["{num_components}", "{component_info}", "{text}"];

// ============================================================================
// Domain
// ============================================================================

/// Identifiers of the prompts a domain resolved, for audit metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptIdentifiers {
    pub extraction: String,
    pub bridging: String,
}

/// An immutable, validated domain resource bundle.
#[derive(Debug, Clone)]
pub struct Domain {
    name: String,
    extraction_open: Option<String>,
    extraction_constrained: Option<String>,
    bridging: String,
    examples: Vec<FewShotExample>,
    schema: Option<DomainSchema>,
    extraction_id_open: String,
    extraction_id_constrained: String,
    bridging_id: String,
}

impl Domain {
    /// The built-in default domain.
    pub fn builtin_default() -> Self {
        let examples: Vec<FewShotExample> =
            serde_json::from_str(include_str!("resources/default/examples.json"))
                .unwrap_or_default();

        Self {
            name: "default".to_string(),
            extraction_open: Some(
                include_str!("resources/default/extraction_open.txt").to_string(),
            ),
            extraction_constrained: Some(
                include_str!("resources/default/extraction_constrained.txt").to_string(),
            ),
            bridging: include_str!("resources/default/bridging.txt").to_string(),
            examples,
            schema: None,
            extraction_id_open: "builtin:default/extraction_open".to_string(),
            extraction_id_constrained: "builtin:default/extraction_constrained".to_string(),
            bridging_id: "builtin:default/bridging".to_string(),
        }
    }

    /// Load a domain bundle from a directory, validating as it goes.
    ///
    /// Missing prompt variants are tolerated here and surface as
    /// [`ResourceError::NotFound`] when requested via [`Domain::prompt`]; a
    /// bundle with no extraction prompt at all, or without a bridging
    /// prompt, fails immediately.
    pub fn from_dir(name: impl Into<String>, dir: &Path) -> Result<Self, ResourceError> {
        let name = name.into();
        let open_path = dir.join("extraction").join("prompt_open.txt");
        let constrained_path = dir.join("extraction").join("prompt_constrained.txt");
        let examples_path = dir.join("extraction").join("examples.json");
        let bridging_path = dir.join("augmentation").join("connectivity").join("prompt.txt");
        let schema_path = dir.join("schema.json");

        let extraction_open = load_optional_prompt(&open_path)?;
        let extraction_constrained = load_optional_prompt(&constrained_path)?;
        if extraction_open.is_none() && extraction_constrained.is_none() {
            return Err(ResourceError::NotFound { path: open_path });
        }

        let bridging = load_prompt(&bridging_path)?;
        validate_bridging_sites(&bridging, &bridging_path)?;

        let examples = if examples_path.exists() {
            load_json(&examples_path)?
        } else {
            Vec::new()
        };

        let schema = if schema_path.exists() {
            Some(load_json(&schema_path)?)
        } else {
            None
        };

        tracing::debug!(
            domain = %name,
            examples = examples.len(),
            has_schema = schema.is_some(),
            "loaded domain bundle"
        );

        Ok(Self {
            name,
            extraction_open,
            extraction_constrained,
            extraction_id_open: open_path.display().to_string(),
            extraction_id_constrained: constrained_path.display().to_string(),
            bridging_id: bridging_path.display().to_string(),
            bridging,
            examples,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The extraction prompt for a mode.
    pub fn prompt(&self, mode: ExtractionMode) -> Result<&str, ResourceError> {
        let (prompt, id) = match mode {
            ExtractionMode::Open => (&self.extraction_open, &self.extraction_id_open),
            ExtractionMode::Constrained => {
                (&self.extraction_constrained, &self.extraction_id_constrained)
            }
        };
        prompt.as_deref().ok_or_else(|| ResourceError::NotFound {
            path: PathBuf::from(id),
        })
    }

    /// The bridging prompt, guaranteed to carry all substitution sites.
    pub fn bridging_prompt(&self) -> &str {
        &self.bridging
    }

    /// Few-shot extraction examples, possibly empty.
    pub fn examples(&self) -> &[FewShotExample] {
        &self.examples
    }

    /// The optional type schema.
    pub fn schema(&self) -> Option<&DomainSchema> {
        self.schema.as_ref()
    }

    /// Prompt identifiers for the audit record.
    pub fn prompt_identifiers(&self, mode: ExtractionMode) -> PromptIdentifiers {
        PromptIdentifiers {
            extraction: match mode {
                ExtractionMode::Open => self.extraction_id_open.clone(),
                ExtractionMode::Constrained => self.extraction_id_constrained.clone(),
            },
            bridging: self.bridging_id.clone(),
        }
    }

    /// Replace the extraction prompt (both variants) with an external file.
    ///
    /// An externally configured prompt wins over the bundle's own.
    pub fn override_extraction_prompt(&mut self, path: &Path) -> Result<(), ResourceError> {
        let prompt = load_prompt(path)?;
        self.extraction_open = Some(prompt.clone());
        self.extraction_constrained = Some(prompt);
        self.extraction_id_open = path.display().to_string();
        self.extraction_id_constrained = path.display().to_string();
        Ok(())
    }

    /// Replace the bridging prompt with an external file.
    ///
    /// The replacement is validated for the required substitution sites; an
    /// externally configured prompt wins over the bundle's own.
    pub fn override_bridging_prompt(&mut self, path: &Path) -> Result<(), ResourceError> {
        let prompt = load_prompt(path)?;
        validate_bridging_sites(&prompt, path)?;
        self.bridging = prompt;
        self.bridging_id = path.display().to_string();
        Ok(())
    }
}

// ============================================================================
// Loading helpers
// ============================================================================

fn load_prompt(path: &Path) -> Result<String, ResourceError> {
    if !path.exists() {
        return Err(ResourceError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|_| ResourceError::NotFound {
        path: path.to_path_buf(),
    })?;
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(ResourceError::EmptyPrompt {
            path: path.to_path_buf(),
        });
    }
    Ok(content)
}

fn load_optional_prompt(path: &Path) -> Result<Option<String>, ResourceError> {
    if !path.exists() {
        return Ok(None);
    }
    load_prompt(path).map(Some)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ResourceError> {
    let content = std::fs::read_to_string(path).map_err(|_| ResourceError::NotFound {
        path: path.to_path_buf(),
    })?;
    serde_json::from_str(&content).map_err(|e| ResourceError::InvalidJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn validate_bridging_sites(prompt: &str, path: &Path) -> Result<(), ResourceError> {
    for site in BRIDGING_SITES {
        if !prompt.contains(site) {
            return Err(ResourceError::MissingSubstitution {
                path: path.to_path_buf(),
                site,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
