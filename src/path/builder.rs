use std::sync::Arc;

use tracing::debug;

use super::segment::PathSegment;
use super::walker::ReflectiveWalker;
use crate::model::{Element, Node};
use crate::schema::PropertyDefinition;

/// How missing structure is handled while walking for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Only existing nodes are followed
    Existing,
    /// Missing singular nodes and lists are created; lists grow only when a
    /// segment carries an explicit index
    Lenient,
    /// Like `Lenient`, and an unindexed empty list gets a default slot 0
    Full,
}

impl CreatePolicy {
    fn creates(self) -> bool {
        self != CreatePolicy::Existing
    }
}

/// Parent element and terminal property a write goes to
#[derive(Debug)]
pub struct WriteTarget<'n> {
    pub parent: &'n mut Element,
    pub property: PropertyDefinition,
    pub index: Option<usize>,
}

/// Creates missing intermediate nodes and list slots so a terminal property
/// can be written
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    walker: Arc<ReflectiveWalker>,
}

impl StructureBuilder {
    pub fn new(walker: Arc<ReflectiveWalker>) -> Self {
        Self { walker }
    }

    /// Walk to the parent of the terminal segment of `path`.
    ///
    /// With `create_if_missing`, absent intermediate nodes are built from their
    /// declared type, lists grow with default elements up to the required index
    /// (slot 0 when unindexed). Returns `None` on any unresolved segment.
    pub fn ensure_parent<'n>(
        &self,
        root: &'n mut Node,
        path: &str,
        create_if_missing: bool,
    ) -> Option<WriteTarget<'n>> {
        let policy = if create_if_missing {
            CreatePolicy::Full
        } else {
            CreatePolicy::Existing
        };
        self.navigate(root, path, policy)
    }

    /// Walk to the parent of the terminal segment of `path` under `policy`
    pub fn navigate<'n>(
        &self,
        root: &'n mut Node,
        path: &str,
        policy: CreatePolicy,
    ) -> Option<WriteTarget<'n>> {
        let segments = self.walker.segments(root.type_name(), path);
        let (last, parents) = segments.split_last()?;

        let mut current = root;
        for segment in parents {
            current = self.step(current, segment, policy)?;
        }

        let parent = current.as_element_mut()?;
        let property = self
            .walker
            .resolve_property(parent.type_name(), &last.name)?;
        Some(WriteTarget {
            parent,
            property,
            index: last.index,
        })
    }

    /// Walk every segment of `path`, returning the addressed node
    pub fn resolve_mut<'n>(
        &self,
        root: &'n mut Node,
        path: &str,
        policy: CreatePolicy,
    ) -> Option<&'n mut Node> {
        let segments = self.walker.segments(root.type_name(), path);
        let mut current = root;
        for segment in &segments {
            current = self.step(current, segment, policy)?;
        }
        Some(current)
    }

    fn step<'n>(
        &self,
        node: &'n mut Node,
        segment: &PathSegment,
        policy: CreatePolicy,
    ) -> Option<&'n mut Node> {
        let element = node.as_element_mut()?;
        let property = self
            .walker
            .resolve_property(element.type_name(), &segment.name)?;

        if policy.creates() && !element.contains(&property.name) {
            let fresh = if property.repeating {
                Node::List(Vec::new())
            } else {
                property.kind.default_node()?
            };
            debug!(
                owner = element.type_name(),
                property = %property.name,
                "created missing node"
            );
            element.set(property.name.clone(), fresh);
        }

        match element.get_mut(&property.name)? {
            Node::List(items) => {
                let index = segment.index.unwrap_or(0);
                let grow = match segment.index {
                    Some(_) => policy.creates(),
                    None => policy == CreatePolicy::Full,
                };
                if grow {
                    while items.len() <= index {
                        items.push(property.kind.default_node()?);
                    }
                }
                items.get_mut(index)
            }
            node if segment.index.unwrap_or(0) == 0 => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Primitive, PrimitiveKind};
    use crate::schema::{DeclaredKind, SchemaRegistry};

    fn builder() -> StructureBuilder {
        let walker = ReflectiveWalker::new(Arc::new(SchemaRegistry::r4()));
        StructureBuilder::new(Arc::new(walker))
    }

    fn patient() -> Node {
        Node::from(
            Element::resource("Patient")
                .with("gender", Primitive::new(PrimitiveKind::Code, "female")),
        )
    }

    #[test]
    fn test_full_policy_creates_list_slot() {
        let builder = builder();
        let mut root = patient();

        let target = builder
            .ensure_parent(&mut root, "patient.extension.genderIdentity", true)
            .unwrap();
        assert_eq!(target.parent.type_name(), "Extension");
        assert_eq!(target.property.name, "genderIdentity");
        assert_eq!(target.property.kind, DeclaredKind::Primitive(PrimitiveKind::String));

        let extensions = root.child("extension").and_then(Node::as_list).unwrap();
        assert_eq!(extensions.len(), 1);
    }

    #[test]
    fn test_lenient_policy_grows_only_indexed_lists() {
        let builder = builder();
        let mut root = patient();

        assert!(
            builder
                .navigate(&mut root, "name.family", CreatePolicy::Lenient)
                .is_none()
        );
        // The empty list itself was created
        assert_eq!(root.child("name").and_then(Node::as_list).map(<[Node]>::len), Some(0));

        let target = builder
            .navigate(&mut root, "name[2].family", CreatePolicy::Lenient)
            .unwrap();
        assert_eq!(target.parent.type_name(), "HumanName");
        assert_eq!(root.child("name").and_then(Node::as_list).map(<[Node]>::len), Some(3));
    }

    #[test]
    fn test_existing_policy_never_creates() {
        let builder = builder();
        let mut root = patient();

        assert!(builder.ensure_parent(&mut root, "maritalStatus.text", false).is_none());
        assert!(root.child("maritalStatus").is_none());

        let target = builder.ensure_parent(&mut root, "gender", false).unwrap();
        assert_eq!(target.parent.type_name(), "Patient");
        assert_eq!(target.index, None);
    }

    #[test]
    fn test_unresolved_segment_stops() {
        let builder = builder();
        let mut root = patient();
        assert!(builder.ensure_parent(&mut root, "nothing.here", true).is_none());
        assert!(builder.resolve_mut(&mut root, "gender.nothing", CreatePolicy::Full).is_none());
        assert!(builder.resolve_mut(&mut root, "Patient.gender", CreatePolicy::Existing).is_some());
    }
}
