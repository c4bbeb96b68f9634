use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{descriptors, fingerprint, Fingerprint, GeneratorError, TreemapError};

/// Which namespace a lookup went to, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Fingerprint,
    Descriptor,
}

impl Display for RegistryKind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            RegistryKind::Fingerprint => write!(f, "fingerprint"),
            RegistryKind::Descriptor => write!(f, "descriptor"),
        }
    }
}

/// A fingerprint generator: `(smiles, dimension) -> fingerprint`.
pub type FingerprintFn = fn(&str, usize) -> Result<Fingerprint, GeneratorError>;

/// A descriptor generator: `smiles -> value`.
pub type DescriptorFn = fn(&str) -> Result<f64, GeneratorError>;

/// Name to function mapping that remembers registration order.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    kind: RegistryKind,
    entries: Vec<(String, F)>,
}

impl<F> Registry<F> {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Store `function` under `name`. Re-registering a name replaces the
    /// function but keeps the name's original position.
    pub fn register(&mut self, name: impl Into<String>, function: F) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = function,
            None => self.entries.push((name, function)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<&F, TreemapError> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, function)| function)
            .ok_or_else(|| TreemapError::Lookup {
                kind: self.kind,
                name: name.to_string(),
                available: self.list_available().into_iter().map(String::from).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    /// Registered names, in registration order.
    pub fn list_available(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The fingerprint and descriptor registries handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Toolbox {
    pub fingerprints: Registry<FingerprintFn>,
    pub descriptors: Registry<DescriptorFn>,
}

impl Toolbox {
    /// A toolbox with nothing registered.
    pub fn empty() -> Self {
        Self {
            fingerprints: Registry::new(RegistryKind::Fingerprint),
            descriptors: Registry::new(RegistryKind::Descriptor),
        }
    }

    /// A toolbox with every built-in fingerprint and descriptor.
    pub fn builtin() -> Self {
        let mut toolbox = Self::empty();
        fingerprint::register_builtin_fingerprints(&mut toolbox.fingerprints);
        descriptors::register_builtin_descriptors(&mut toolbox.descriptors);
        toolbox
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(_: &str) -> Result<f64, GeneratorError> {
        Ok(1.0)
    }

    fn two(_: &str) -> Result<f64, GeneratorError> {
        Ok(2.0)
    }

    #[test]
    fn test_builtin_names_resolve() {
        let toolbox = Toolbox::builtin();
        let fingerprints = toolbox.fingerprints.list_available();
        assert_eq!(fingerprints, vec!["MHFP6", "ECFP4"]);
        for name in fingerprints {
            assert!(toolbox.fingerprints.get(name).is_ok());
        }

        let descriptors = toolbox.descriptors.list_available();
        assert_eq!(descriptors, vec!["MolWeight", "RingCount", "Fsp3", "GyrationRad"]);
        for name in descriptors {
            assert!(toolbox.descriptors.get(name).is_ok());
        }
    }

    #[test]
    fn test_unknown_name_is_a_lookup_error() {
        let toolbox = Toolbox::builtin();
        match toolbox.fingerprints.get("MACCS") {
            Err(TreemapError::Lookup { kind, name, available }) => {
                assert_eq!(kind, RegistryKind::Fingerprint);
                assert_eq!(name, "MACCS");
                assert_eq!(available, vec!["MHFP6".to_string(), "ECFP4".to_string()]);
            }
            other => panic!("expected a lookup error, got {other:?}"),
        }
        assert!(matches!(
            toolbox.descriptors.get("logP"),
            Err(TreemapError::Lookup {
                kind: RegistryKind::Descriptor,
                ..
            })
        ));
    }

    #[test]
    fn test_register_overwrites_in_place() {
        let mut registry: Registry<DescriptorFn> = Registry::new(RegistryKind::Descriptor);
        registry.register("a", one).register("b", two).register("a", two);
        assert_eq!(registry.list_available(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        let f = registry.get("a").unwrap();
        assert_eq!(f("C").unwrap(), 2.0);
    }

    #[test]
    fn test_empty_toolbox() {
        let toolbox = Toolbox::empty();
        assert!(toolbox.fingerprints.is_empty());
        assert!(toolbox.descriptors.list_available().is_empty());
        assert!(!toolbox.descriptors.contains("MolWeight"));
    }
}
