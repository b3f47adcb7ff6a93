//! JSON rendering of operation reports and stored entities.

use serde_json::{Map, Value as Json, json};

use deepgraph_engine::{DeletionResult, NodeError, NodeResult, OperationReport, ResolutionResult};
use deepgraph_foundation::EntityId;
use deepgraph_storage::World;

/// How much of each resolved entity a report shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportStyle {
    /// Identity, action and the entity's stored fields.
    #[default]
    Verbose,
    /// Identity and action only.
    Compact,
}

/// Renders a report.
///
/// `world` is read for stored fields in verbose mode; entities it does not
/// hold (after a rollback, say) are shown without them. Errors are always
/// shown in full.
#[must_use]
pub fn render(report: &OperationReport, world: &World, style: ReportStyle) -> Json {
    json!({
        "outcome": report.outcome.to_string(),
        "committed": report.committed,
        "results": report
            .results
            .iter()
            .map(|node| render_node(node, world, style))
            .collect::<Vec<_>>(),
        "deletions": report.deletions.iter().map(render_deletion).collect::<Vec<_>>(),
    })
}

fn render_node(node: &NodeResult, world: &World, style: ReportStyle) -> Json {
    let mut out = Map::new();
    out.insert("path".into(), json!(node.path));
    out.insert("type".into(), json!(node.entity_type));
    out.insert("depth".into(), json!(node.depth));
    match &node.result {
        ResolutionResult::Resolved { identity, action } => {
            out.insert("id".into(), json!(identity.key()));
            out.insert("action".into(), json!(action.to_string()));
            if style == ReportStyle::Verbose {
                if let Some(fields) = stored_fields(world, *identity) {
                    out.insert("fields".into(), fields);
                }
            }
        }
        ResolutionResult::Error(error) => {
            out.insert("error".into(), render_error(error));
        }
    }
    Json::Object(out)
}

fn render_deletion(deletion: &DeletionResult) -> Json {
    let mut out = Map::new();
    out.insert("type".into(), json!(deletion.entity_type));
    out.insert("id".into(), json!(deletion.identity.key()));
    out.insert(
        "deleted".into(),
        json!(deletion.deleted.iter().map(|id| id.key()).collect::<Vec<_>>()),
    );
    if let Some(error) = &deletion.error {
        out.insert("error".into(), render_error(error));
        out.insert("fatal".into(), json!(deletion.fatal));
    }
    Json::Object(out)
}

fn render_error(error: &NodeError) -> Json {
    json!({
        "code": error.code.name(),
        "reason": error.reason,
        "field": error.field,
    })
}

fn stored_fields(world: &World, entity: EntityId) -> Option<Json> {
    let fields = world.fields(entity).ok()?;
    Some(Json::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    ))
}

/// Renders every stored entity, or only those of `entity_type`.
#[must_use]
pub fn render_entities(world: &World, entity_type: Option<&str>) -> Json {
    let entities = world
        .entities()
        .filter_map(|id| {
            let ty = world.type_of(id).ok()?;
            if entity_type.is_some_and(|wanted| wanted != ty) {
                return None;
            }
            Some(json!({
                "type": ty,
                "id": id.key(),
                "fields": stored_fields(world, id).unwrap_or(Json::Null),
            }))
        })
        .collect::<Vec<_>>();
    Json::Array(entities)
}
