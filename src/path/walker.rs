use std::collections::HashMap;
use std::sync::Arc;

use papaya::HashMap as PapayaMap;
use tracing::trace;

use super::Extracted;
use super::segment::{PathSegment, split_path};
use crate::model::Node;
use crate::schema::{DeclaredKind, PropertyDefinition, SchemaRegistry};

/// Type suffixes stripped when a segment names no declared property
pub const TYPE_SUFFIXES: [&str; 7] = [
    "DateTime", "Quantity", "String", "Boolean", "Decimal", "Integer", "Code",
];

/// Case-folded property table of one type
type PropertyTable = HashMap<String, PropertyDefinition>;

/// Upper bound on cached `(segment, owner)` resolutions; open types accept
/// arbitrary segments
const NAME_CACHE_CAPACITY: usize = 4096;

/// Schema-driven fallback navigator.
///
/// Segments resolve case-insensitively against the declared type of the
/// current node. Resolutions and per-type property tables are cached in
/// concurrent maps shared by every caller.
#[derive(Debug)]
pub struct ReflectiveWalker {
    schema: Arc<SchemaRegistry>,
    // (segment, owner type) -> resolved property
    name_cache: PapayaMap<(String, String), Option<PropertyDefinition>>,
    // owner type -> case-folded property table
    metadata_cache: PapayaMap<String, Arc<PropertyTable>>,
}

impl ReflectiveWalker {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            name_cache: PapayaMap::new(),
            metadata_cache: PapayaMap::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Resolve `segment` to a declared property of `owner`
    pub fn resolve_property(&self, owner: &str, segment: &str) -> Option<PropertyDefinition> {
        let key = (segment.to_string(), owner.to_string());
        let cache = self.name_cache.pin();
        if let Some(resolved) = cache.get(&key) {
            return resolved.clone();
        }

        let resolved = self.lookup_property(owner, segment);
        trace!(owner, segment, resolved = ?resolved.as_ref().map(|p| &p.name), "resolved property");
        if cache.len() < NAME_CACHE_CAPACITY {
            cache.insert(key, resolved.clone());
        }
        resolved
    }

    fn lookup_property(&self, owner: &str, segment: &str) -> Option<PropertyDefinition> {
        let definition = self.schema.get(owner)?;
        let table = self.property_table(owner)?;

        let folded = segment.to_ascii_lowercase();
        if let Some(property) = table.get(&folded) {
            return Some(property.clone());
        }

        let stripped = TYPE_SUFFIXES.iter().find_map(|suffix| {
            let base_len = folded.len().checked_sub(suffix.len())?;
            (base_len > 0 && folded.ends_with(&suffix.to_ascii_lowercase()))
                .then(|| (&folded[..base_len], *suffix))
        });
        if let Some((base, suffix)) = stripped {
            if let Some(property) = table.get(base) {
                let narrowed = match &property.kind {
                    DeclaredKind::Choice(_) => property.kind.narrow(suffix),
                    _ => None,
                };
                return Some(match narrowed {
                    Some(kind) => property.with_kind(kind),
                    None => property.clone(),
                });
            }
        }

        choice_alternative(&table, &folded).or_else(|| definition.open_property(segment))
    }

    fn property_table(&self, owner: &str) -> Option<Arc<PropertyTable>> {
        let cache = self.metadata_cache.pin();
        if let Some(table) = cache.get(owner) {
            return Some(table.clone());
        }

        let definition = self.schema.get(owner)?;
        let table: PropertyTable = definition
            .properties
            .iter()
            .map(|p| (p.name.to_ascii_lowercase(), p.clone()))
            .collect();
        let table = Arc::new(table);
        cache.insert(owner.to_string(), table.clone());
        Some(table)
    }

    /// Parse `path` into segments, dropping a leading segment that names the
    /// root resource type
    pub fn segments(&self, root_type: &str, path: &str) -> Vec<PathSegment> {
        let mut segments = split_path(path.trim());
        if segments.first().is_some_and(|first| {
            first.index.is_none() && first.name.eq_ignore_ascii_case(root_type)
        }) {
            segments.remove(0);
        }
        segments
    }

    /// Read the value at `path`, or `None` if any segment or index fails
    pub fn extract(&self, root: &Node, path: &str) -> Option<Extracted> {
        let segments = self.segments(root.type_name(), path);
        if segments.is_empty() {
            return None;
        }

        let mut current = root;
        for segment in &segments {
            let element = current.as_element()?;
            let property = self.resolve_property(element.type_name(), &segment.name)?;
            let child = element.get(&property.name)?;
            let item = match child {
                Node::List(items) => items.get(segment.index.unwrap_or(0))?,
                node if segment.index.unwrap_or(0) == 0 => node,
                _ => return None,
            };
            if !fits(item, &property.kind) {
                return None;
            }
            current = item;
        }

        Extracted::from_node(current)
    }

    /// Declared property at `path`, resolved from the schema alone
    pub fn declared_property(&self, root_type: &str, path: &str) -> Option<PropertyDefinition> {
        let segments = self.segments(root_type, path);
        let (last, parents) = segments.split_last()?;

        let mut owner = root_type.to_string();
        for segment in parents {
            let property = self.resolve_property(&owner, &segment.name)?;
            owner = property.kind.complex_name()?.to_string();
        }
        self.resolve_property(&owner, &last.name)
    }
}

/// Choice property named by any declared alternative, e.g. `valueCodeableConcept`
fn choice_alternative(table: &PropertyTable, folded: &str) -> Option<PropertyDefinition> {
    table.iter().find_map(|(base, property)| {
        let suffix = folded.strip_prefix(base.as_str()).filter(|s| !s.is_empty())?;
        property.kind.narrow(suffix).map(|kind| property.with_kind(kind))
    })
}

/// Whether a stored node is an instance of the declared kind
pub(crate) fn fits(node: &Node, kind: &DeclaredKind) -> bool {
    match (kind, node) {
        (DeclaredKind::Complex(name), Node::Element(element)) => element.type_name() == name,
        (DeclaredKind::Complex(_), _) => false,
        (DeclaredKind::Primitive(expected), Node::Primitive(primitive)) => {
            primitive.kind.scalar_kind() == expected.scalar_kind()
        }
        (DeclaredKind::Primitive(_), Node::Element(_)) => false,
        _ => true,
    }
}
