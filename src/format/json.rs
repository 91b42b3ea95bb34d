use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::error::{NormalizationError, Result};
use crate::model::{Element, Node, Primitive, Scalar, ScalarKind, parse_date_time};
use crate::schema::{
    ANY_RESOURCE, DeclaredKind, PropertyDefinition, SchemaRegistry, TypeDefinition,
};

const RESOURCE_TYPE: &str = "resourceType";

/// Schema-driven JSON reader and writer for typed trees.
///
/// Choice properties are read from their typed keys (`valueQuantity`) and
/// stored under the base name; the writer restores the typed key from the
/// stored node. Keys starting with `_` (primitive extensions) are skipped.
#[derive(Debug, Clone)]
pub struct JsonFormat {
    schema: Arc<SchemaRegistry>,
}

impl JsonFormat {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    pub fn r4() -> Self {
        Self::new(Arc::new(SchemaRegistry::r4()))
    }

    pub fn parse_str(&self, text: &str) -> Result<Node> {
        let value: Value = serde_json::from_str(text)?;
        self.parse(&value)
    }

    /// Read a resource; the root must carry a registered `resourceType`
    pub fn parse(&self, value: &Value) -> Result<Node> {
        self.read_resource(value, None).map(Node::Element)
    }

    /// Read a resource at the root (`at` is `None`) or nested in `contained`
    fn read_resource(&self, value: &Value, at: Option<&str>) -> Result<Element> {
        let location = at.unwrap_or("$");
        let Value::Object(object) = value else {
            return Err(NormalizationError::parse(location, "resource must be a JSON object"));
        };
        let Some(Value::String(resource_type)) = object.get(RESOURCE_TYPE) else {
            return Err(NormalizationError::parse(location, "missing resourceType"));
        };
        let definition = self
            .schema
            .get(resource_type)
            .filter(|definition| definition.is_resource())
            .ok_or_else(|| {
                NormalizationError::parse(
                    location,
                    format!("unknown resource type '{resource_type}'"),
                )
            })?;

        self.read_element(definition, object, at.unwrap_or(resource_type.as_str()))
    }

    fn read_element(
        &self,
        definition: &TypeDefinition,
        object: &Map<String, Value>,
        path: &str,
    ) -> Result<Element> {
        let mut element = if definition.is_resource() {
            Element::resource(definition.name.clone())
        } else {
            Element::new(definition.name.clone())
        };

        for (key, value) in object {
            if key == RESOURCE_TYPE || key.starts_with('_') {
                continue;
            }
            let property_path = format!("{path}.{key}");
            let property = resolve_key(definition, key).ok_or_else(|| {
                NormalizationError::parse(
                    &property_path,
                    format!("unknown property for {}", definition.name),
                )
            })?;

            let node = if property.repeating {
                let items = match value {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                let nodes = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.read_value(&property.kind, item, &format!("{property_path}[{i}]"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Node::List(nodes)
            } else {
                self.read_value(&property.kind, value, &property_path)?
            };
            element.set(property.name, node);
        }
        Ok(element)
    }

    fn read_value(&self, kind: &DeclaredKind, value: &Value, path: &str) -> Result<Node> {
        match kind {
            DeclaredKind::Primitive(primitive) => {
                let scalar = read_scalar(primitive.scalar_kind(), value, path)?;
                Ok(Node::Primitive(Primitive::new(*primitive, scalar)))
            }
            DeclaredKind::Scalar(scalar) => read_scalar(*scalar, value, path).map(Node::Scalar),
            DeclaredKind::Complex(name) if name == ANY_RESOURCE => {
                self.read_resource(value, Some(path)).map(Node::Element)
            }
            DeclaredKind::Complex(name) => {
                let Value::Object(object) = value else {
                    return Err(NormalizationError::parse(
                        path,
                        format!("expected {name} object"),
                    ));
                };
                let definition = self.schema.get(name).ok_or_else(|| {
                    NormalizationError::parse(path, format!("no definition for type {name}"))
                })?;
                self.read_element(definition, object, path).map(Node::Element)
            }
            DeclaredKind::Choice(_) => Err(NormalizationError::parse(
                path,
                "choice properties must use a typed key such as valueString",
            )),
        }
    }

    /// Write a tree back to JSON
    pub fn to_value(&self, node: &Node) -> Value {
        match node {
            Node::Scalar(scalar) => scalar_value(scalar),
            Node::Primitive(primitive) => {
                primitive.value.as_ref().map_or(Value::Null, scalar_value)
            }
            Node::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.to_value(item))
                    .filter(|value| !value.is_null())
                    .collect(),
            ),
            Node::Element(element) => self.element_value(element),
        }
    }

    fn element_value(&self, element: &Element) -> Value {
        let definition = self.schema.get(element.type_name());
        let mut object = Map::new();
        if element.is_resource() {
            object.insert(
                RESOURCE_TYPE.to_string(),
                Value::String(element.type_name().to_string()),
            );
        }

        for (name, child) in element.properties() {
            let value = self.to_value(child);
            let empty = match &value {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                Value::Object(fields) => fields.is_empty(),
                _ => false,
            };
            if empty {
                continue;
            }
            let key = match definition.and_then(|definition| definition.property(name)) {
                Some(PropertyDefinition {
                    kind: DeclaredKind::Choice(_),
                    ..
                }) => choice_key(name, child),
                _ => name.to_string(),
            };
            object.insert(key, value);
        }
        Value::Object(object)
    }

    pub fn to_string(&self, node: &Node, pretty: bool) -> Result<String> {
        let value = self.to_value(node);
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }
}

fn resolve_key(definition: &TypeDefinition, key: &str) -> Option<PropertyDefinition> {
    definition
        .property(key)
        .cloned()
        .or_else(|| definition.choice_property(key))
        .or_else(|| definition.open_property(key))
}

fn choice_key(name: &str, child: &Node) -> String {
    let suffix = match child {
        Node::Primitive(primitive) => primitive.kind.choice_suffix(),
        Node::Element(element) => element.type_name(),
        _ => "",
    };
    format!("{name}{suffix}")
}

fn read_scalar(kind: ScalarKind, value: &Value, path: &str) -> Result<Scalar> {
    let scalar = match (kind, value) {
        (ScalarKind::String, Value::String(s)) => Some(Scalar::String(s.clone())),
        (ScalarKind::Integer, Value::Number(n)) => n.as_i64().map(Scalar::Integer),
        (ScalarKind::Boolean, Value::Bool(b)) => Some(Scalar::Boolean(*b)),
        (ScalarKind::Decimal, Value::Number(n)) => decimal(n).map(Scalar::Decimal),
        (ScalarKind::DateTime, Value::String(s)) => parse_date_time(s).map(Scalar::DateTime),
        _ => None,
    };
    scalar.ok_or_else(|| {
        NormalizationError::parse(path, format!("expected {kind} value, found {value}"))
    })
}

fn decimal(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn scalar_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::String(s) => Value::String(s.clone()),
        Scalar::Integer(i) => Value::Number((*i).into()),
        Scalar::Boolean(b) => Value::Bool(*b),
        Scalar::Decimal(d) => Number::from_str(&d.to_string())
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(d.to_string())),
        Scalar::DateTime(_) => Value::String(scalar.to_invariant_string()),
    }
}
