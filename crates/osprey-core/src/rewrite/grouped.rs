//! Folds aggregates bound against a grouping back into their group node.
//!
//! Binding leaves aggregate calls as free `Aggregation` values carrying the
//! arena index of the grouping they were bound under. Any stage above the
//! group may hold one: a later projection, a predicate filtering on an
//! aggregate, a sort over one. The walk keeps a registry of every group seen
//! below the current stage and folds each aggregate into its owner's
//! aggregation list (first as a placeholder, deduplicated by shape), then
//! replaces the use-site with a field reference to the synthesized output
//! name. Grown lists are written back into their group nodes once the walk
//! finishes. An aggregate whose group is not below it is the one rewrite
//! failure.

use crate::{
    error::UnsupportedQuery,
    ir::{aggregate_output_name, Aggregation, FieldRef, GroupIndex, Node, Value},
    rewrite::descend,
};
use std::collections::HashMap;

/// Aggregation lists of every group below the stage being walked, keyed by
/// arena index and grown as the stages above fold aggregates in.
type FoldedGroups = HashMap<GroupIndex, Vec<Aggregation>>;

pub(super) fn apply(node: Node) -> Result<(Node, bool), UnsupportedQuery> {
    let mut folded = FoldedGroups::new();
    let (node, changed) = walk(node, &mut folded)?;
    if !changed {
        return Ok((node, false));
    }
    Ok((install(node, &folded), true))
}

fn no_association() -> UnsupportedQuery {
    UnsupportedQuery::expression("could not associate an aggregate with its grouping")
}

#[allow(clippy::too_many_lines)]
fn walk(node: Node, folded: &mut FoldedGroups) -> Result<(Node, bool), UnsupportedQuery> {
    match node {
        Node::Collection(source) => Ok((Node::Collection(source), false)),
        Node::Group {
            source,
            index,
            key,
            aggregations,
        } => {
            let (source, changed) = walk(*source, folded)?;
            folded.insert(index, aggregations.clone());
            Ok((
                Node::Group {
                    source: Box::new(source),
                    index,
                    key,
                    aggregations,
                },
                changed,
            ))
        }
        Node::Match { source, predicate } => {
            let (source, mut changed) = walk(*source, folded)?;
            let predicate = resolve(predicate, folded, &mut changed)?;
            Ok((
                Node::Match {
                    source: Box::new(source),
                    predicate,
                },
                changed,
            ))
        }
        Node::Project { source, projector } => {
            let (source, mut changed) = walk(*source, folded)?;
            let projector = resolve(projector, folded, &mut changed)?;
            Ok((
                Node::Project {
                    source: Box::new(source),
                    projector,
                },
                changed,
            ))
        }
        Node::Sort { source, clauses } => {
            let (source, mut changed) = walk(*source, folded)?;
            let mut rebuilt = Vec::with_capacity(clauses.len());
            for mut clause in clauses {
                clause.value = resolve(clause.value, folded, &mut changed)?;
                rebuilt.push(clause);
            }
            Ok((
                Node::Sort {
                    source: Box::new(source),
                    clauses: rebuilt,
                },
                changed,
            ))
        }
        Node::Distinct { source, projector } => {
            let (source, mut changed) = walk(*source, folded)?;
            let projector = resolve(projector, folded, &mut changed)?;
            Ok((
                Node::Distinct {
                    source: Box::new(source),
                    projector,
                },
                changed,
            ))
        }
        Node::SkipLimit {
            source,
            skip,
            limit,
        } => {
            let (source, changed) = walk(*source, folded)?;
            Ok((
                Node::SkipLimit {
                    source: Box::new(source),
                    skip,
                    limit,
                },
                changed,
            ))
        }
        Node::RootAggregation {
            source,
            kind,
            argument,
        } => {
            let (source, mut changed) = walk(*source, folded)?;
            let argument = resolve(argument, folded, &mut changed)?;
            Ok((
                Node::RootAggregation {
                    source: Box::new(source),
                    kind,
                    argument,
                },
                changed,
            ))
        }
        Node::Pipeline {
            source,
            projector,
            aggregator,
        } => {
            let (source, mut changed) = walk(*source, folded)?;
            let projector = resolve(projector, folded, &mut changed)?;
            Ok((
                Node::Pipeline {
                    source: Box::new(source),
                    projector,
                    aggregator,
                },
                changed,
            ))
        }
    }
}

/// Fold every free aggregate in `value` into its group's list and replace
/// the use-site with a reference to the synthesized output field.
fn resolve(
    value: Value,
    folded: &mut FoldedGroups,
    changed: &mut bool,
) -> Result<Value, UnsupportedQuery> {
    let value = fold(value, folded, changed)?;
    name_outputs(value)
}

/// Assign each free aggregate a slot in its group's aggregation list,
/// leaving placeholders at the use-sites. Folding runs bottom-up, so an
/// aggregate nested inside another's argument becomes a placeholder before
/// the outer one is examined and trips the nesting guard there.
fn fold(
    value: Value,
    folded: &mut FoldedGroups,
    changed: &mut bool,
) -> Result<Value, UnsupportedQuery> {
    value.try_map(&mut |value| match value {
        Value::Aggregation {
            group,
            op,
            argument,
        } => {
            let Some(aggregations) = folded.get_mut(&group) else {
                return Err(no_association());
            };
            if argument.references_projected_field() {
                return Err(UnsupportedQuery::expression(
                    "nested group aggregates are not supported",
                ));
            }
            let candidate = Aggregation {
                op,
                argument: *argument,
            };
            let slot = aggregations
                .iter()
                .position(|existing| *existing == candidate)
                .unwrap_or_else(|| {
                    aggregations.push(candidate);
                    aggregations.len() - 1
                });
            *changed = true;
            Ok(Value::GroupedAggregate { group, slot })
        }
        other => Ok(other),
    })
}

/// Replace placeholders with references to their synthesized output fields.
fn name_outputs(value: Value) -> Result<Value, UnsupportedQuery> {
    value.try_map(&mut |value| match value {
        Value::GroupedAggregate { slot, .. } => Ok(Value::Field(FieldRef::synthesized(
            aggregate_output_name(slot),
        ))),
        other => Ok(other),
    })
}

/// Write the grown aggregation lists back into their group nodes.
fn install(node: Node, folded: &FoldedGroups) -> Node {
    match node {
        Node::Group {
            source,
            index,
            key,
            aggregations,
        } => {
            let source = Box::new(install(*source, folded));
            let aggregations = folded.get(&index).cloned().unwrap_or(aggregations);
            Node::Group {
                source,
                index,
                key,
                aggregations,
            }
        }
        other => descend(other, |inner| (install(inner, folded), false)).0,
    }
}
