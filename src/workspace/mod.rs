//! Action workflows
//!
//! One [`ActionRequest`] is built from the boundary inputs, dispatched to
//! exactly one workflow, and the workflow returns the complete variable
//! set it wants published. The caller commits the set only on success, so
//! a failing workflow records nothing.
//!
//! # Module Structure
//!
//! - [`create`] - Derive identifiers and variables for a new workspace
//! - [`update`] - Refresh the variable set for an existing workspace
//! - [`delete`] - Re-derive the identifiers for a component being removed

pub mod create;
pub mod delete;
pub mod update;

use crate::error::PrepError;
use crate::inventory::{InventoryClient, TagSet};
use crate::output::OutputSet;
use serde_json::{Map, Value};

/// Keys that steer the pipeline itself and never reach the provisioned
/// variable set.
const UPDATE_INTERNAL_KEYS: &[&str] = &["module_name", "cloud_project", "type", "show_advanced"];
const CREATE_INTERNAL_KEYS: &[&str] = &["module_name", "connector", "type", "show_advanced"];

/// How fetched tags are folded into the variable blob.
#[derive(Debug, Clone)]
pub struct TagMerge {
    /// Key the tag set is published under.
    pub key: String,
    /// Leave the key out entirely when no tags came back.
    pub skip_when_empty: bool,
}

impl Default for TagMerge {
    fn default() -> Self {
        Self {
            key: "cdk_std_tags".to_string(),
            skip_when_empty: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub workspace_name: String,
    pub item_map: String,
    pub asset_id: String,
    pub cloud_project: String,
    pub deployment_name: String,
    pub iteration: usize,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub component_list: String,
    pub iteration: usize,
    pub workspace_name: String,
    pub asset_id: String,
    pub resource_config: String,
    pub cloud_project: String,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub component_list: String,
    pub iteration: usize,
}

/// One fully-validated action request, decided once at the boundary.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    Create(CreateRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

/// Raw boundary inputs before per-action validation.
#[derive(Debug, Default, Clone)]
pub struct PipelineInputs {
    pub action: Option<String>,
    pub component_name: Option<String>,
    pub iteration: Option<String>,
    pub repeat_item: Option<String>,
    pub asset_id: Option<String>,
    pub resource_config: Option<String>,
    pub item_map: Option<String>,
    pub cloud_project: Option<String>,
    pub deployment_name: Option<String>,
}

impl ActionRequest {
    /// Build a request from boundary inputs, enforcing per-action
    /// requiredness before any work starts.
    pub fn from_inputs(inputs: &PipelineInputs) -> Result<Self, PrepError> {
        let action = inputs
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(PrepError::MissingInput("action"))?;

        match action {
            "delete" => Ok(Self::Delete(DeleteRequest {
                component_list: require(&inputs.component_name, "component_name")?,
                iteration: parse_iteration(&require(&inputs.iteration, "iteration")?)?,
            })),
            "update" => Ok(Self::Update(UpdateRequest {
                component_list: require(&inputs.component_name, "component_name")?,
                iteration: parse_iteration(&require(&inputs.iteration, "iteration")?)?,
                workspace_name: require(&inputs.repeat_item, "repeat_item")?,
                asset_id: require(&inputs.asset_id, "asset_id")?,
                resource_config: require(&inputs.resource_config, "resource_config")?,
                cloud_project: require(&inputs.cloud_project, "cloud_project")?,
            })),
            "create" => Ok(Self::Create(CreateRequest {
                workspace_name: require(&inputs.repeat_item, "repeat_item")?,
                item_map: require(&inputs.item_map, "item_map")?,
                asset_id: require(&inputs.asset_id, "asset_id")?,
                cloud_project: require(&inputs.cloud_project, "cloud_project")?,
                deployment_name: require(&inputs.deployment_name, "deployment_name")?,
                iteration: parse_iteration(&require(&inputs.iteration, "iteration")?)?,
            })),
            other => Err(PrepError::InvalidAction(other.to_string())),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Run the workflow selected by the request.
pub async fn run(
    request: &ActionRequest,
    inventory: &InventoryClient,
    tag_merge: &TagMerge,
) -> Result<OutputSet, PrepError> {
    match request {
        ActionRequest::Create(req) => create::run(req, inventory, tag_merge).await,
        ActionRequest::Update(req) => update::run(req, inventory, tag_merge).await,
        ActionRequest::Delete(req) => delete::run(req),
    }
}

fn require(field: &Option<String>, name: &'static str) -> Result<String, PrepError> {
    field
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or(PrepError::MissingInput(name))
}

/// Iteration indexes arrive as strings; an unresolved pipeline expression
/// (`<+...>`) falls back to 0.
fn parse_iteration(raw: &str) -> Result<usize, PrepError> {
    let raw = raw.trim();
    if raw.starts_with("<+") {
        tracing::debug!("Iteration '{}' is an unresolved pipeline expression, using 0", raw);
        return Ok(0);
    }
    raw.parse::<usize>()
        .map_err(|_| PrepError::InvalidIteration(raw.to_string()))
}

/// Normalize a resource identifier: lowercase, hyphens to underscores.
pub fn normalize(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

/// Select the entry at `iteration` from a comma-separated list,
/// trimming whitespace per entry.
pub fn select_component(component_list: &str, iteration: usize) -> Result<String, PrepError> {
    let components: Vec<&str> = component_list.split(',').map(str::trim).collect();
    if iteration >= components.len() {
        return Err(PrepError::IterationOutOfRange {
            iteration,
            what: "component names",
            max: components.len() as i64 - 1,
        });
    }
    Ok(components[iteration].to_string())
}

/// Drop pipeline-internal keys from a workspace entry, preserving the
/// order of the remaining keys.
pub fn filter_internal_keys(
    entry: &Map<String, Value>,
    internal: &[&str],
) -> Map<String, Value> {
    entry
        .iter()
        .filter(|(key, _)| !internal.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Fold the fetched tag set into the variable map per the merge policy.
pub fn merge_tags(vars: &mut Map<String, Value>, tags: &TagSet, merge: &TagMerge) {
    if tags.is_empty() && merge.skip_when_empty {
        tracing::debug!("No tags fetched, leaving '{}' out", merge.key);
        return;
    }

    let tag_map: Map<String, Value> = tags
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    vars.insert(merge.key.clone(), Value::Object(tag_map));
}

/// Serialize a variable map with compact separators.
pub fn to_compact_json(vars: &Map<String, Value>) -> String {
    Value::Object(vars.clone()).to_string()
}

fn string_field(entry: &Map<String, Value>, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delete_inputs() -> PipelineInputs {
        PipelineInputs {
            action: Some("delete".into()),
            component_name: Some("alpha,beta".into()),
            iteration: Some("1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Foo-Bar"), "foo_bar");
        assert_eq!(normalize("network_net1_DEP0"), "network_net1_dep0");
        // Idempotent
        assert_eq!(normalize(&normalize("Foo-Bar")), normalize("Foo-Bar"));
    }

    #[test]
    fn test_select_component_trims_entries() {
        assert_eq!(select_component("a, b ,c", 1).unwrap(), "b");
        assert_eq!(select_component("single", 0).unwrap(), "single");
    }

    #[test]
    fn test_select_component_out_of_range() {
        let err = select_component("a,b", 2).unwrap_err();
        match err {
            PrepError::IterationOutOfRange { iteration, max, .. } => {
                assert_eq!(iteration, 2);
                assert_eq!(max, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_inputs_delete() {
        let request = ActionRequest::from_inputs(&delete_inputs()).unwrap();
        assert_eq!(request.action(), "delete");
        match request {
            ActionRequest::Delete(req) => {
                assert_eq!(req.component_list, "alpha,beta");
                assert_eq!(req.iteration, 1);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_from_inputs_rejects_bad_action() {
        let mut inputs = delete_inputs();
        inputs.action = Some("destroy".into());
        let err = ActionRequest::from_inputs(&inputs).unwrap_err();
        assert!(matches!(err, PrepError::InvalidAction(action) if action == "destroy"));

        inputs.action = None;
        let err = ActionRequest::from_inputs(&inputs).unwrap_err();
        assert!(matches!(err, PrepError::MissingInput("action")));
    }

    #[test]
    fn test_from_inputs_requires_per_action_fields() {
        let inputs = PipelineInputs {
            action: Some("update".into()),
            component_name: Some("alpha".into()),
            iteration: Some("0".into()),
            repeat_item: Some("ws1".into()),
            asset_id: Some("asset-1".into()),
            resource_config: None,
            cloud_project: Some("proj-a".into()),
            ..Default::default()
        };
        let err = ActionRequest::from_inputs(&inputs).unwrap_err();
        assert!(matches!(err, PrepError::MissingInput("resource_config")));
    }

    #[test]
    fn test_parse_iteration() {
        assert_eq!(parse_iteration("3").unwrap(), 3);
        assert_eq!(parse_iteration(" 0 ").unwrap(), 0);
        // Unresolved pipeline expressions fall back to 0
        assert_eq!(parse_iteration("<+strategy.iteration>").unwrap(), 0);
        assert!(matches!(
            parse_iteration("abc").unwrap_err(),
            PrepError::InvalidIteration(_)
        ));
        assert!(matches!(
            parse_iteration("-1").unwrap_err(),
            PrepError::InvalidIteration(_)
        ));
    }

    #[test]
    fn test_filter_internal_keys_preserves_order() {
        let entry = json!({
            "module_name": "vpc",
            "resource_name": "net1",
            "type": "network",
            "extra": "x"
        });
        let filtered = filter_internal_keys(entry.as_object().unwrap(), CREATE_INTERNAL_KEYS);
        assert_eq!(
            to_compact_json(&filtered),
            r#"{"resource_name":"net1","extra":"x"}"#
        );
    }

    #[test]
    fn test_merge_tags_policy() {
        let mut vars = json!({"a": 1}).as_object().unwrap().clone();
        let empty = TagSet::new();

        merge_tags(&mut vars, &empty, &TagMerge::default());
        assert_eq!(to_compact_json(&vars), r#"{"a":1,"cdk_std_tags":{}}"#);

        let mut vars = json!({"a": 1}).as_object().unwrap().clone();
        let skip = TagMerge {
            skip_when_empty: true,
            ..TagMerge::default()
        };
        merge_tags(&mut vars, &empty, &skip);
        assert_eq!(to_compact_json(&vars), r#"{"a":1}"#);

        let mut vars = json!({"a": 1}).as_object().unwrap().clone();
        let mut tags = TagSet::new();
        tags.insert("env".into(), "prod".into());
        let custom = TagMerge {
            key: "std_tags".into(),
            skip_when_empty: true,
        };
        merge_tags(&mut vars, &tags, &custom);
        assert_eq!(to_compact_json(&vars), r#"{"a":1,"std_tags":{"env":"prod"}}"#);
    }
}
