//! Update workflow
//!
//! Refreshes the variable set for an existing workspace: the component
//! identifiers stay as named in the pipeline, the variable blob is
//! rebuilt from the resource configuration entry for this iteration.

use super::{
    filter_internal_keys, merge_tags, select_component, string_field, to_compact_json, TagMerge,
    UpdateRequest, UPDATE_INTERNAL_KEYS,
};
use crate::config::parse_config;
use crate::error::PrepError;
use crate::inventory::InventoryClient;
use crate::output::OutputSet;
use serde_json::Value;

pub async fn run(
    request: &UpdateRequest,
    inventory: &InventoryClient,
    tag_merge: &TagMerge,
) -> Result<OutputSet, PrepError> {
    tracing::info!("Processing 'update' action");

    let component = select_component(&request.component_list, request.iteration)?;
    tracing::info!("Current iteration: {}", request.iteration);
    tracing::info!("Current component: {}", component);
    tracing::info!("Workspace name: {}", request.workspace_name);

    let resource_config = parse_config(&request.resource_config, "resource configuration")?;
    let entries = resource_config
        .get("entries")
        .and_then(Value::as_array)
        .ok_or(PrepError::MissingEntries)?;
    let entry = entries
        .get(request.iteration)
        .ok_or(PrepError::IterationOutOfRange {
            iteration: request.iteration,
            what: "entries",
            max: entries.len() as i64 - 1,
        })?
        .as_object()
        .ok_or(PrepError::EntryNotObject(request.iteration))?;

    let connector = request.cloud_project.replace('-', "_");
    tracing::info!("Connector: {}", connector);

    let module_name = string_field(entry, "module_name");

    let mut vars = filter_internal_keys(entry, UPDATE_INTERNAL_KEYS);

    // All validation is done; only the non-fatal enrichment call remains.
    let tags = inventory.fetch_tags(&request.asset_id).await;
    merge_tags(&mut vars, &tags, tag_merge);

    let vars_json = to_compact_json(&vars);
    tracing::debug!("Filtered terraform vars: {}", vars_json);

    let mut outputs = OutputSet::new();
    outputs.set("RESOURCE_NAME", component.clone());
    outputs.set("ENTITY_ID", component);
    outputs.set("WORKSPACE_NAME", request.workspace_name.clone());
    outputs.set("ASSET_ID", request.asset_id.clone());
    outputs.set("TERRAFORM_VARS", vars_json);
    outputs.set("CONNECTOR", connector);
    outputs.set("MODULE_NAME", module_name);
    Ok(outputs)
}
