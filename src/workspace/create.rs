//! Create workflow
//!
//! Locates the workspace entry in the item map, derives canonical
//! identifiers from its type, resource name, and the deployment name,
//! and rebuilds the variable blob with fetched tags folded in.

use super::{
    filter_internal_keys, merge_tags, normalize, string_field, to_compact_json, CreateRequest,
    TagMerge, CREATE_INTERNAL_KEYS,
};
use crate::config::parse_config;
use crate::error::PrepError;
use crate::inventory::InventoryClient;
use crate::output::OutputSet;
use serde_json::{Map, Value};

pub async fn run(
    request: &CreateRequest,
    inventory: &InventoryClient,
    tag_merge: &TagMerge,
) -> Result<OutputSet, PrepError> {
    tracing::info!("Processing 'create' action");
    tracing::info!("Workspace name: {}", request.workspace_name);
    tracing::info!("Iteration: {}", request.iteration);

    let item_map = parse_config(&request.item_map, "item map")?;
    let entry = find_workspace_entry(&item_map, &request.workspace_name)?;

    let connector = request.cloud_project.replace('-', "_");
    tracing::info!("Connector: {}", connector);

    let module_name = string_field(entry, "module_name");
    let resource_name = string_field(entry, "resource_name");
    let resource_type = string_field(entry, "type");
    tracing::info!(
        "Module: {}, Resource: {}, Type: {}",
        module_name,
        resource_name,
        resource_type
    );

    let mut vars = filter_internal_keys(entry, CREATE_INTERNAL_KEYS);

    // All validation is done; only the non-fatal enrichment call remains.
    let tags = inventory.fetch_tags(&request.asset_id).await;
    merge_tags(&mut vars, &tags, tag_merge);

    let vars_json = to_compact_json(&vars);
    tracing::debug!("Final terraform vars: {}", vars_json);

    // Resource name and entity id share one canonical derivation.
    let resource_id = normalize(&format!(
        "{}_{}_{}{}",
        resource_type, resource_name, request.deployment_name, request.iteration
    ));
    tracing::info!("Resource name: {}", resource_id);
    tracing::info!("Entity ID: {}", resource_id);

    let mut outputs = OutputSet::new();
    outputs.set("WORKSPACE_NAME", request.workspace_name.clone());
    outputs.set("ASSET_ID", request.asset_id.clone());
    outputs.set("TERRAFORM_VARS", vars_json);
    outputs.set("CONNECTOR", connector);
    outputs.set("MODULE_NAME", module_name);
    outputs.set("RESOURCE_NAME", resource_id.clone());
    outputs.set("ENTITY_ID", resource_id);
    Ok(outputs)
}

/// Locate the single-key object whose key matches the workspace name.
///
/// The item map is an array of `{"<workspace>": {...}}` objects; only an
/// object-valued match counts.
fn find_workspace_entry<'a>(
    item_map: &'a Value,
    workspace_name: &str,
) -> Result<&'a Map<String, Value>, PrepError> {
    if let Some(items) = item_map.as_array() {
        for item in items {
            if let Some(entry) = item.get(workspace_name).and_then(Value::as_object) {
                return Ok(entry);
            }
        }
    }
    Err(PrepError::WorkspaceNotFound(workspace_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_workspace_entry_matches_key() {
        let item_map = json!([
            {"ws0": {"module_name": "a"}},
            {"ws1": {"module_name": "b"}}
        ]);
        let entry = find_workspace_entry(&item_map, "ws1").unwrap();
        assert_eq!(entry.get("module_name").unwrap(), "b");
    }

    #[test]
    fn test_find_workspace_entry_absent_or_malformed() {
        let item_map = json!([{"ws0": {"module_name": "a"}}]);
        assert!(matches!(
            find_workspace_entry(&item_map, "ws9").unwrap_err(),
            PrepError::WorkspaceNotFound(name) if name == "ws9"
        ));

        // A non-object match does not count.
        let item_map = json!([{"ws0": "not an object"}]);
        assert!(find_workspace_entry(&item_map, "ws0").is_err());

        // An empty-object item map (empty pipeline input) has no entries.
        let item_map = json!({});
        assert!(find_workspace_entry(&item_map, "ws0").is_err());
    }
}
