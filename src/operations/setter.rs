//! Three-stage write chain shared by Copy and ConditionalTransform.
//!
//! 1. evaluate the target path and write at every match location;
//! 2. walk the target path reflectively (lenient creation);
//! 3. build the missing parent structure and write (strict creation).
//!
//! Every stage works on a scratch copy that replaces the resource only when the
//! stage succeeds, so a failed attempt leaves no half-built structure behind.

use tracing::debug;

use super::context::ExecutionContext;
use crate::coercion::TypeCoercer;
use crate::error::{NormalizationError, Result};
use crate::model::Node;
use crate::path::{CreatePolicy, Extracted, WriteTarget};

/// Stage that completed a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStage {
    PathEvaluator,
    Reflection,
    CreateAndSet,
}

/// Write `value` at `target_path`, trying each stage in order.
///
/// When every stage fails, a type incompatibility hit by any stage is
/// returned as-is; otherwise the target could not be resolved.
pub fn set_value(
    ctx: &ExecutionContext,
    root: &mut Node,
    target_path: &str,
    value: &Extracted,
) -> Result<SetStage> {
    let resource_type = root.resource_type().to_string();
    let mut incompatible = None;

    let mut last_error = match attempt(root, |scratch| {
        set_via_evaluator(ctx, scratch, &resource_type, target_path, value)
    }) {
        Ok(()) => return Ok(SetStage::PathEvaluator),
        Err(err) => err,
    };
    debug!(target_path, error = %last_error, "set via path evaluator failed");

    let staged = [
        (SetStage::Reflection, CreatePolicy::Lenient),
        (SetStage::CreateAndSet, CreatePolicy::Full),
    ];
    for (stage, policy) in staged {
        let result = attempt(root, |scratch| {
            let target = ctx
                .builder
                .navigate(scratch, target_path, policy)
                .ok_or_else(|| {
                    unresolved(&resource_type, target_path, "no parent for terminal segment")
                })?;
            write(&ctx.coercer, target, value)
        });
        let err = match result {
            Ok(()) => return Ok(stage),
            Err(err) => err,
        };
        debug!(target_path, ?stage, error = %err, "set stage failed");
        let previous = std::mem::replace(&mut last_error, err);
        if matches!(previous, NormalizationError::TypeIncompatibility { .. }) {
            incompatible = Some(previous);
        }
    }

    if matches!(last_error, NormalizationError::TypeIncompatibility { .. }) {
        return Err(last_error);
    }
    if let Some(err) = incompatible {
        return Err(err);
    }
    let message = match last_error {
        NormalizationError::TargetResolution { message, .. } => message,
        other => other.to_string(),
    };
    Err(unresolved(&resource_type, target_path, &message))
}

fn attempt(root: &mut Node, stage: impl FnOnce(&mut Node) -> Result<()>) -> Result<()> {
    let mut scratch = root.clone();
    stage(&mut scratch)?;
    *root = scratch;
    Ok(())
}

fn set_via_evaluator(
    ctx: &ExecutionContext,
    root: &mut Node,
    resource_type: &str,
    target_path: &str,
    value: &Extracted,
) -> Result<()> {
    let locations: Vec<String> = ctx
        .evaluator
        .evaluate(root, target_path)?
        .into_iter()
        .map(|m| m.location)
        .collect();
    if locations.is_empty() {
        return Err(unresolved(resource_type, target_path, "no target elements found"));
    }

    for location in &locations {
        let target = ctx
            .builder
            .navigate(root, location, CreatePolicy::Lenient)
            .ok_or_else(|| {
                unresolved(resource_type, location, "could not resolve parent or property")
            })?;
        write(&ctx.coercer, target, value)?;
    }
    Ok(())
}

fn unresolved(resource_type: &str, path: &str, message: &str) -> NormalizationError {
    NormalizationError::TargetResolution {
        path: path.to_string(),
        resource_type: resource_type.to_string(),
        message: message.to_string(),
    }
}

/// Assign a coerced value to the terminal property of `target`.
///
/// Repeating properties: a list overwrites positions `0..n` and keeps the tail;
/// a single value replaces the indexed slot (slot 0 when unindexed), growing the
/// list with default elements. Singular properties reject multi-value lists.
pub fn write(coercer: &TypeCoercer, target: WriteTarget<'_>, value: &Extracted) -> Result<()> {
    let WriteTarget {
        parent,
        property,
        index,
    } = target;

    if !property.repeating {
        if index.is_some_and(|i| i > 0) {
            return Err(NormalizationError::incompatible(format!(
                "property '{}' of {} does not repeat",
                property.name,
                parent.type_name()
            )));
        }
        if let Extracted::List(items) = value {
            return Err(NormalizationError::incompatible(format!(
                "{} values cannot be assigned to single-valued property '{}' of {}",
                items.len(),
                property.name,
                parent.type_name()
            )));
        }
        let node = coercer.coerce(value, &property.kind)?;
        parent.set(property.name, node);
        return Ok(());
    }

    let nodes = match value {
        Extracted::List(_) if index.is_some() => {
            return Err(NormalizationError::incompatible(format!(
                "a list cannot be written to an indexed position of '{}'",
                property.name
            )));
        }
        Extracted::List(items) => coercer.coerce_all(items, &property.kind)?,
        single => vec![coercer.coerce(single, &property.kind)?],
    };

    if !matches!(parent.get(&property.name), Some(Node::List(_))) {
        parent.set(property.name.clone(), Node::List(Vec::new()));
    }
    let Some(Node::List(slots)) = parent.get_mut(&property.name) else {
        return Err(NormalizationError::incompatible(format!(
            "property '{}' does not hold a list",
            property.name
        )));
    };

    let start = index.unwrap_or(0);
    while slots.len() < start {
        let filler = property.kind.default_node().ok_or_else(|| {
            NormalizationError::incompatible(format!(
                "cannot create default {} elements for '{}'",
                property.kind, property.name
            ))
        })?;
        slots.push(filler);
    }
    for (offset, node) in nodes.into_iter().enumerate() {
        let position = start + offset;
        if position < slots.len() {
            slots[position] = node;
        } else {
            slots.push(node);
        }
    }
    Ok(())
}
