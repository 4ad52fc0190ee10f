//! Delete workflow
//!
//! Re-derives the identifiers for the component being removed. Purely
//! local: no configuration parsing, no tag lookup.

use super::{select_component, DeleteRequest};
use crate::error::PrepError;
use crate::output::OutputSet;

pub fn run(request: &DeleteRequest) -> Result<OutputSet, PrepError> {
    tracing::info!("Processing 'delete' action");

    let component = select_component(&request.component_list, request.iteration)?;
    tracing::info!("Current iteration: {}", request.iteration);
    tracing::info!("Current component: {}", component);

    let mut outputs = OutputSet::new();
    outputs.set("RESOURCE_NAME", component.clone());
    outputs.set("ENTITY_ID", component);
    Ok(outputs)
}
