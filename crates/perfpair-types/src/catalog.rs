//! Discovery metadata: which methods a test class declares and how they are grouped.
//!
//! Hosts register classes explicitly at startup; the catalog is immutable once built.

use crate::{BatchKey, ComparisonGroupId};
use perfpair_error::{ValidationError, validate_name};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Unvalidated registration input for one class.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistration {
    name: String,
    methods: Vec<(String, Option<String>)>,
}

impl ClassRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a method that belongs to no comparison group.
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.push((name.into(), None));
        self
    }

    pub fn method_in_group(mut self, name: impl Into<String>, group: impl Into<String>) -> Self {
        self.methods.push((name.into(), Some(group.into())));
        self
    }

    fn validate(self) -> Result<TestClassMetadata, ValidationError> {
        validate_name(&self.name)?;
        let mut seen = HashSet::new();
        let mut methods = Vec::with_capacity(self.methods.len());
        for (method, group) in self.methods {
            validate_name(&method)?;
            if !seen.insert(method.clone()) {
                return Err(ValidationError::DuplicateMethod {
                    class: self.name,
                    method,
                });
            }
            let group = group.map(ComparisonGroupId::new).transpose()?;
            methods.push(MethodMetadata { name: method, group });
        }
        Ok(TestClassMetadata {
            name: self.name,
            methods,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    pub name: String,
    pub group: Option<ComparisonGroupId>,
}

/// Validated metadata for one test class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestClassMetadata {
    name: String,
    methods: Vec<MethodMetadata>,
}

impl TestClassMetadata {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodMetadata] {
        &self.methods
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn group_of(&self, method: &str) -> Option<&ComparisonGroupId> {
        self.methods
            .iter()
            .find(|m| m.name == method)
            .and_then(|m| m.group.as_ref())
    }

    /// Number of methods declared with `group`, whether or not they ran.
    pub fn declared_in_group(&self, group: &ComparisonGroupId) -> usize {
        self.methods
            .iter()
            .filter(|m| m.group.as_ref() == Some(group))
            .count()
    }

    pub fn groups(&self) -> BTreeSet<&ComparisonGroupId> {
        self.methods.iter().filter_map(|m| m.group.as_ref()).collect()
    }
}

/// Every registered class, keyed by class name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCatalog {
    classes: BTreeMap<String, TestClassMetadata>,
}

impl ClassCatalog {
    pub fn builder() -> ClassCatalogBuilder {
        ClassCatalogBuilder::default()
    }

    pub fn get(&self, class: &str) -> Option<&TestClassMetadata> {
        self.classes.get(class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Declared member count for a batching key, or `None` for an unknown class.
    ///
    /// A key narrowed to a group counts only that group's methods.
    pub fn declared_members(&self, key: &BatchKey) -> Option<usize> {
        let class = self.get(&key.class)?;
        Some(match &key.group {
            Some(group) => class.declared_in_group(group),
            None => class.method_count(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ClassCatalogBuilder {
    registrations: Vec<ClassRegistration>,
}

impl ClassCatalogBuilder {
    pub fn class(mut self, registration: ClassRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn build(self) -> Result<ClassCatalog, ValidationError> {
        let mut classes = BTreeMap::new();
        for registration in self.registrations {
            let metadata = registration.validate()?;
            if classes.contains_key(metadata.name()) {
                return Err(ValidationError::DuplicateClass(metadata.name));
            }
            classes.insert(metadata.name.clone(), metadata);
        }
        Ok(ClassCatalog { classes })
    }
}
