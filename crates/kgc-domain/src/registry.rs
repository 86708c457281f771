//! Domain registry
//!
//! Resolves domain names to loaded bundles. Bundles are loaded on first
//! access, cached for the life of the registry, and handed out behind `Arc`
//! so records and threads can share them without synchronization.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use kgc_core::ResourceError;

use crate::Domain;

/// Lazily loading cache of domain bundles.
pub struct DomainRegistry {
    /// Root directory holding on-disk domain bundles, if any
    root: Option<PathBuf>,
    cache: RwLock<HashMap<String, Arc<Domain>>>,
}

impl DomainRegistry {
    /// A registry serving only the built-in default domain.
    pub fn builtin_only() -> Self {
        Self::new(None)
    }

    /// A registry backed by a directory of domain bundles.
    ///
    /// An on-disk `default` bundle, when present, shadows the built-in one.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a domain by name, loading and validating it on first access.
    pub fn get(&self, name: &str) -> Result<Arc<Domain>, ResourceError> {
        if let Some(domain) = self.cache.read().ok().and_then(|c| c.get(name).cloned()) {
            return Ok(domain);
        }

        let domain = Arc::new(self.load(name)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.to_string(), Arc::clone(&domain));
        }
        Ok(domain)
    }

    fn load(&self, name: &str) -> Result<Domain, ResourceError> {
        if let Some(root) = &self.root {
            let dir = root.join(name);
            if dir.is_dir() {
                return Domain::from_dir(name, &dir);
            }
        }
        if name == "default" {
            return Ok(Domain::builtin_default());
        }
        Err(ResourceError::UnknownDomain {
            name: name.to_string(),
            available: self.list().join(", "),
        })
    }

    /// Names of all resolvable domains, sorted, built-in default included.
    pub fn list(&self) -> Vec<String> {
        let mut names = vec!["default".to_string()];
        if let Some(root) = &self.root {
            if let Ok(entries) = std::fs::read_dir(root) {
                for entry in entries.flatten() {
                    if entry.path().is_dir() {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_domain(dir: &std::path::Path) {
        fs::create_dir_all(dir.join("extraction")).unwrap();
        fs::create_dir_all(dir.join("augmentation/connectivity")).unwrap();
        fs::write(dir.join("extraction/prompt_open.txt"), "{{record_json}}").unwrap();
        fs::write(
            dir.join("augmentation/connectivity/prompt.txt"),
            "{num_components} {component_info} {text}",
        )
        .unwrap();
    }

    #[test]
    fn test_builtin_default_always_resolves() {
        let registry = DomainRegistry::builtin_only();
        let domain = registry.get("default").unwrap();
        assert_eq!(domain.name(), "default");
    }

    #[test]
    fn test_unknown_domain_lists_available() {
        let registry = DomainRegistry::builtin_only();
        let err = registry.get("astrology").unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_directory_domain_resolves_and_caches() {
        let tmp = tempfile::tempdir().unwrap();
        write_domain(&tmp.path().join("legal"));

        let registry = DomainRegistry::new(Some(tmp.path().to_path_buf()));
        let first = registry.get("legal").unwrap();
        let second = registry.get("legal").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_on_disk_default_shadows_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        write_domain(&tmp.path().join("default"));

        let registry = DomainRegistry::new(Some(tmp.path().to_path_buf()));
        let domain = registry.get("default").unwrap();
        // the builtin ships examples, the on-disk bundle here does not
        assert!(domain.examples().is_empty());
    }

    #[test]
    fn test_list_includes_builtin_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        write_domain(&tmp.path().join("legal"));

        let registry = DomainRegistry::new(Some(tmp.path().to_path_buf()));
        assert_eq!(registry.list(), vec!["default".to_string(), "legal".to_string()]);
    }
}
