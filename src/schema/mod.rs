//! Declared structure of resources and datatypes.
//!
//! The registry maps `(type, property)` to the declared kind of the property
//! and whether it repeats. It is built once at startup and shared read-only;
//! path walking, structure creation and type coercion all consult it instead
//! of inspecting runtime values.

mod r4;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{Element, Node, Primitive, PrimitiveKind, ScalarKind};

/// Complex type name of properties holding a resource of any type
/// (`contained`); the concrete type comes from the value's `resourceType`
pub const ANY_RESOURCE: &str = "Resource";

/// Declared kind of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclaredKind {
    Scalar(ScalarKind),
    Primitive(PrimitiveKind),
    Complex(String),
    /// Choice (`value[x]`) property; alternatives in preference order
    Choice(Vec<DeclaredKind>),
}

impl DeclaredKind {
    pub fn complex(name: impl Into<String>) -> Self {
        DeclaredKind::Complex(name.into())
    }

    /// Suffix naming this kind in a choice property, e.g. `Quantity` or `DateTime`
    pub fn choice_suffix(&self) -> Option<&str> {
        match self {
            DeclaredKind::Primitive(kind) => Some(kind.choice_suffix()),
            DeclaredKind::Complex(name) => Some(name),
            _ => None,
        }
    }

    /// Restrict a choice to the alternative named by `suffix`
    pub fn narrow(&self, suffix: &str) -> Option<DeclaredKind> {
        match self {
            DeclaredKind::Choice(alternatives) => alternatives
                .iter()
                .find(|alt| {
                    alt.choice_suffix()
                        .is_some_and(|s| s.eq_ignore_ascii_case(suffix))
                })
                .cloned(),
            _ => None,
        }
    }

    /// Default instance used when a missing node has to be created
    pub fn default_node(&self) -> Option<Node> {
        match self {
            DeclaredKind::Complex(name) => Some(Node::Element(Element::new(name.clone()))),
            DeclaredKind::Primitive(kind) => Some(Node::Primitive(Primitive::empty(*kind))),
            DeclaredKind::Scalar(_) | DeclaredKind::Choice(_) => None,
        }
    }

    pub fn complex_name(&self) -> Option<&str> {
        match self {
            DeclaredKind::Complex(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DeclaredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredKind::Scalar(kind) => write!(f, "{kind}"),
            DeclaredKind::Primitive(kind) => f.write_str(kind.type_name()),
            DeclaredKind::Complex(name) => f.write_str(name),
            DeclaredKind::Choice(alternatives) => {
                f.write_str("choice(")?;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{alt}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDefinition {
    pub name: String,
    pub kind: DeclaredKind,
    pub repeating: bool,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, kind: DeclaredKind) -> Self {
        Self {
            name: name.into(),
            kind,
            repeating: false,
        }
    }

    pub fn repeating(mut self) -> Self {
        self.repeating = true;
        self
    }

    /// Same property with a narrower declared kind
    pub fn with_kind(&self, kind: DeclaredKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Resource,
    Complex,
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub category: TypeCategory,
    pub properties: Vec<PropertyDefinition>,
    /// Open types accept undeclared properties as string-valued entries
    pub open: bool,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, category: TypeCategory) -> Self {
        Self {
            name: name.into(),
            category,
            properties: Vec::new(),
            open: false,
        }
    }

    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_properties(
        mut self,
        properties: impl IntoIterator<Item = PropertyDefinition>,
    ) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn is_resource(&self) -> bool {
        self.category == TypeCategory::Resource
    }

    /// Exact, case-sensitive lookup
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Resolve a serialized choice key such as `valueQuantity`
    pub fn choice_property(&self, key: &str) -> Option<PropertyDefinition> {
        self.properties.iter().find_map(|p| {
            let suffix = key.strip_prefix(p.name.as_str())?;
            if suffix.is_empty() {
                return None;
            }
            match &p.kind {
                DeclaredKind::Choice(alternatives) => alternatives
                    .iter()
                    .find(|alt| alt.choice_suffix() == Some(suffix))
                    .map(|alt| p.with_kind(alt.clone())),
                _ => None,
            }
        })
    }

    /// Declared property for a value stored under an undeclared name
    pub fn open_property(&self, name: &str) -> Option<PropertyDefinition> {
        self.open.then(|| {
            PropertyDefinition::new(name, DeclaredKind::Primitive(PrimitiveKind::String))
        })
    }
}

/// Registry of type definitions keyed by type name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, Arc<TypeDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in FHIR R4 subset: common clinical resources and datatypes
    pub fn r4() -> Self {
        let mut registry = Self::new();
        for definition in r4::definitions() {
            registry.register(definition);
        }
        registry
    }

    pub fn register(&mut self, definition: TypeDefinition) {
        self.types
            .insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<TypeDefinition>> {
        self.types.get(type_name)
    }

    pub fn is_resource_type(&self, type_name: &str) -> bool {
        self.get(type_name).is_some_and(|def| def.is_resource())
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .values()
            .filter(|def| def.is_resource())
            .map(|def| def.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r4_registry_contents() {
        let registry = SchemaRegistry::r4();

        assert!(registry.is_resource_type("Patient"));
        assert!(registry.is_resource_type("Observation"));
        assert!(!registry.is_resource_type("Coding"));
        assert!(registry.get("CodeableConcept").is_some());

        let patient = registry.get("Patient").unwrap();
        let extension = patient.property("extension").unwrap();
        assert!(extension.repeating);
        assert_eq!(extension.kind, DeclaredKind::complex("Extension"));
    }

    #[test]
    fn test_choice_property_resolution() {
        let registry = SchemaRegistry::r4();
        let observation = registry.get("Observation").unwrap();

        let value = observation.choice_property("valueQuantity").unwrap();
        assert_eq!(value.name, "value");
        assert_eq!(value.kind, DeclaredKind::complex("Quantity"));

        let effective = observation.choice_property("effectiveDateTime").unwrap();
        assert_eq!(effective.kind, DeclaredKind::Primitive(PrimitiveKind::DateTime));

        assert!(observation.choice_property("valueNonsense").is_none());
        assert!(observation.choice_property("status").is_none());
    }

    #[test]
    fn test_narrow_choice() {
        let kind = DeclaredKind::Choice(vec![
            DeclaredKind::Primitive(PrimitiveKind::Boolean),
            DeclaredKind::Primitive(PrimitiveKind::DateTime),
        ]);
        assert_eq!(
            kind.narrow("datetime"),
            Some(DeclaredKind::Primitive(PrimitiveKind::DateTime))
        );
        assert_eq!(kind.narrow("Quantity"), None);
    }

    #[test]
    fn test_open_type() {
        let registry = SchemaRegistry::r4();
        let extension = registry.get("Extension").unwrap();
        let property = extension.open_property("genderIdentity").unwrap();
        assert_eq!(property.kind, DeclaredKind::Primitive(PrimitiveKind::String));

        let coding = registry.get("Coding").unwrap();
        assert!(coding.open_property("genderIdentity").is_none());
    }
}
