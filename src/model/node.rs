use std::collections::BTreeMap;
use std::fmt;

use super::scalar::{Scalar, ScalarKind};

/// Resource-specific primitive wrapper kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Code,
    Uri,
    Id,
    Integer,
    Boolean,
    Decimal,
    DateTime,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::String,
        PrimitiveKind::Code,
        PrimitiveKind::Uri,
        PrimitiveKind::Id,
        PrimitiveKind::Integer,
        PrimitiveKind::Boolean,
        PrimitiveKind::Decimal,
        PrimitiveKind::DateTime,
    ];

    /// Scalar kind held inside the wrapper
    pub fn scalar_kind(self) -> ScalarKind {
        match self {
            PrimitiveKind::String
            | PrimitiveKind::Code
            | PrimitiveKind::Uri
            | PrimitiveKind::Id => ScalarKind::String,
            PrimitiveKind::Integer => ScalarKind::Integer,
            PrimitiveKind::Boolean => ScalarKind::Boolean,
            PrimitiveKind::Decimal => ScalarKind::Decimal,
            PrimitiveKind::DateTime => ScalarKind::DateTime,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Code => "code",
            PrimitiveKind::Uri => "uri",
            PrimitiveKind::Id => "id",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::DateTime => "dateTime",
        }
    }

    /// Suffix used by choice properties, e.g. `valueDateTime`
    pub fn choice_suffix(self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Code => "Code",
            PrimitiveKind::Uri => "Uri",
            PrimitiveKind::Id => "Id",
            PrimitiveKind::Integer => "Integer",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::DateTime => "DateTime",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub value: Option<Scalar>,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind, value: impl Into<Scalar>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
        }
    }

    pub fn empty(kind: PrimitiveKind) -> Self {
        Self { kind, value: None }
    }
}

/// A structured node: a resource or a complex datatype instance
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    type_name: String,
    resource: bool,
    properties: BTreeMap<String, Node>,
}

impl Element {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            resource: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn resource(type_name: impl Into<String>) -> Self {
        Self {
            resource: true,
            ..Self::new(type_name)
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_resource(&self) -> bool {
        self.resource
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.properties.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.properties.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Node>) -> Option<Node> {
        self.properties.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Builder-style setter used by fixtures and the JSON reader
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Node>) -> Self {
        self.set(name, value);
        self
    }

    /// Scalar held by a primitive or scalar child
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name).and_then(Node::as_scalar)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.scalar(name).and_then(Scalar::as_str)
    }
}

/// Closed node kinds of a typed tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Resource,
    Element,
    PrimitiveWrapper,
    Coding,
    CodeableConcept,
    Reference,
    Period,
    Quantity,
    List,
    Scalar,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Primitive(Primitive),
    Element(Element),
    List(Vec<Node>),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Scalar(_) => NodeKind::Scalar,
            Node::Primitive(_) => NodeKind::PrimitiveWrapper,
            Node::List(_) => NodeKind::List,
            Node::Element(element) if element.is_resource() => NodeKind::Resource,
            Node::Element(element) => match element.type_name() {
                "Coding" => NodeKind::Coding,
                "CodeableConcept" => NodeKind::CodeableConcept,
                "Reference" => NodeKind::Reference,
                "Period" => NodeKind::Period,
                "Quantity" => NodeKind::Quantity,
                _ => NodeKind::Element,
            },
        }
    }

    /// Type name of an element, or the primitive/scalar kind name
    pub fn type_name(&self) -> &str {
        match self {
            Node::Scalar(scalar) => scalar.kind().name(),
            Node::Primitive(primitive) => primitive.kind.type_name(),
            Node::Element(element) => element.type_name(),
            Node::List(_) => "List",
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// Scalar value of a scalar node or a non-empty primitive wrapper
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            Node::Primitive(primitive) => primitive.value.as_ref(),
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.as_element().and_then(|element| element.get(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.as_element_mut().and_then(|element| element.get_mut(name))
    }

    pub fn child_at(&self, index: usize) -> Option<&Node> {
        self.as_list().and_then(|items| items.get(index))
    }

    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut Node> {
        match self {
            Node::List(items) => items.get_mut(index),
            _ => None,
        }
    }

    /// Resource type of a root node, used in log and error messages
    pub fn resource_type(&self) -> &str {
        match self {
            Node::Element(element) => element.type_name(),
            other => other.type_name(),
        }
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Node::Element(value)
    }
}

impl From<Primitive> for Node {
    fn from(value: Primitive) -> Self {
        Node::Primitive(value)
    }
}

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Node::Scalar(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coding(system: &str, code: &str) -> Element {
        Element::new("Coding")
            .with("system", Primitive::new(PrimitiveKind::Uri, system))
            .with("code", Primitive::new(PrimitiveKind::Code, code))
    }

    #[test]
    fn test_node_kinds() {
        let patient = Node::from(Element::resource("Patient"));
        assert_eq!(patient.kind(), NodeKind::Resource);
        assert_eq!(Node::from(coding("s", "c")).kind(), NodeKind::Coding);
        assert_eq!(Node::from(Element::new("HumanName")).kind(), NodeKind::Element);
        assert_eq!(Node::List(vec![]).kind(), NodeKind::List);
        assert_eq!(
            Node::from(Primitive::empty(PrimitiveKind::Code)).kind(),
            NodeKind::PrimitiveWrapper
        );
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Node::from(
            Element::resource("Observation").with("code", Element::new("CodeableConcept").with(
                "coding",
                Node::List(vec![coding("http://old", "A1").into()]),
            )),
        );
        let mut copy = original.clone();

        let coding = copy
            .child_mut("code")
            .and_then(|code| code.child_mut("coding"))
            .and_then(|list| list.child_at_mut(0))
            .and_then(Node::as_element_mut)
            .unwrap();
        coding.set("code", Primitive::new(PrimitiveKind::Code, "B1"));

        let original_code = original
            .child("code")
            .and_then(|code| code.child("coding"))
            .and_then(|list| list.child_at(0))
            .and_then(Node::as_element)
            .and_then(|coding| coding.string("code"));
        assert_eq!(original_code, Some("A1"));
    }
}
