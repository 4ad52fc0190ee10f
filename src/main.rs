use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wsprep::error::PrepError;
use wsprep::inventory::{InventoryClient, DEFAULT_MAX_ATTEMPTS};
use wsprep::output::OutputPublisher;
use wsprep::workspace::{self, ActionRequest, PipelineInputs, TagMerge};
use wsprep::VERSION;

/// Default inventory API endpoint, overridable via api_url.
const DEFAULT_API_URL: &str =
    "https://svc-pangea-api-nginx.int.nebula-dit.connectcdk.com/api/projects";

/// Exit code when the run is interrupted from outside.
const EXIT_INTERRUPTED: u8 = 130;

/// Workspace preparation step for CI/CD pipelines
///
/// Every flag also binds to the lowercase pipeline environment variable
/// of the same name, which is how pipeline steps normally supply them.
#[derive(Parser, Debug)]
#[command(name = "wsprep", version, about, long_about = None)]
struct Args {
    /// Action to perform: create, update, or delete
    #[arg(long, env = "action")]
    action: Option<String>,

    /// Comma-separated component name list
    #[arg(long, env = "component_name")]
    component_name: Option<String>,

    /// Zero-based index into the component/entry lists
    #[arg(long, env = "iteration")]
    iteration: Option<String>,

    /// Workspace name for this repetition
    #[arg(long, env = "repeat_item")]
    repeat_item: Option<String>,

    /// Asset identifier used for the tag lookup
    #[arg(long, env = "asset_id")]
    asset_id: Option<String>,

    /// Resource configuration JSON (update)
    #[arg(long, env = "resource_config")]
    resource_config: Option<String>,

    /// Item map JSON (create)
    #[arg(long, env = "item_map")]
    item_map: Option<String>,

    /// Cloud project the connector is derived from
    #[arg(long, env = "cloud_project")]
    cloud_project: Option<String>,

    /// Deployment name used in derived identifiers
    #[arg(long, env = "deployment_name")]
    deployment_name: Option<String>,

    /// Inventory API endpoint
    #[arg(long, env = "api_url", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Organization identifier for the entity scope
    #[arg(long, env = "org_identifier", default_value = "")]
    org_identifier: String,

    /// Project identifier for the entity scope
    #[arg(long, env = "project_identifier", default_value = "")]
    project_identifier: String,

    /// Resource owner passed through to the published variables
    #[arg(long, env = "resource_owner", default_value = "")]
    resource_owner: String,

    /// Key the fetched tag set is merged under
    #[arg(long, env = "tag_key", default_value = "cdk_std_tags")]
    tag_key: String,

    /// Leave the tag key out when no tags were fetched
    #[arg(long, env = "skip_empty_tags")]
    skip_empty_tags: bool,

    /// Fail the run when no output sink could be written
    #[arg(long, env = "require_sink")]
    require_sink: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info", env = "log_level")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    debug_mode: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if debug_mode { LogLevel::Debug } else { level };
    let tracing_level = level.to_tracing_level()?;

    let filter = tracing_subscriber::filter::LevelFilter::from_level(tracing_level);
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    // Debug mode additionally appends everything to a log file that
    // survives the step, for post-mortem on failed pipeline runs.
    if debug_mode {
        let log_path = debug_log_path();
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .init();

            tracing::debug!("Debug log file: {:?}", log_path);
            return Some(guard);
        }
    }

    tracing_subscriber::registry().with(filter).with(console).init();
    None
}

fn debug_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("wsprep").join("debug.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".wsprep").join("debug.log");
    }
    PathBuf::from("/tmp/wsprep_debug.log")
}

fn debug_mode_enabled() -> bool {
    std::env::var("DEBUG_MODE")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level, debug_mode_enabled());

    tracing::info!("{}", "=".repeat(68));
    tracing::info!("wsprep {} - workspace preparation started", VERSION);
    tracing::info!("{}", "=".repeat(68));

    let result = tokio::select! {
        result = run(&args) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Execution interrupted");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    match result {
        Ok(()) => {
            tracing::info!("Workspace preparation completed successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match &err {
                PrepError::Other(inner) => tracing::error!("Fatal error: {:#}", inner),
                e if e.is_validation() => tracing::error!("Validation error: {}", e),
                e => tracing::error!("Error: {}", e),
            }
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(args: &Args) -> Result<(), PrepError> {
    tracing::info!("Reading pipeline variables...");

    let inputs = PipelineInputs {
        action: args.action.clone(),
        component_name: args.component_name.clone(),
        iteration: args.iteration.clone(),
        repeat_item: args.repeat_item.clone(),
        asset_id: args.asset_id.clone(),
        resource_config: args.resource_config.clone(),
        item_map: args.item_map.clone(),
        cloud_project: args.cloud_project.clone(),
        deployment_name: args.deployment_name.clone(),
    };
    let request = ActionRequest::from_inputs(&inputs)?;
    tracing::info!("Workspace preparation action: {}", request.action());
    tracing::debug!("API URL: {}", args.api_url);

    let inventory = InventoryClient::new(&args.api_url, DEFAULT_MAX_ATTEMPTS)?;
    let tag_merge = TagMerge {
        key: args.tag_key.clone(),
        skip_when_empty: args.skip_empty_tags,
    };

    let outputs = workspace::run(&request, &inventory, &tag_merge).await?;

    tracing::info!("Exporting environment variables:");
    let mut publisher = OutputPublisher::new(args.require_sink);
    publisher.commit(&outputs)?;

    // Common variables published on every run. ENTITY_ID is read back
    // through the environment, where the workflow just exported it.
    let entity_scope = format!(
        "account.{}.{}",
        args.org_identifier, args.project_identifier
    );
    let entity_id = std::env::var("ENTITY_ID").unwrap_or_default();
    let entity_ref = if entity_id.is_empty() {
        entity_scope.clone()
    } else {
        format!("{entity_scope}/{entity_id}")
    };

    publisher.record("RESOURCE_OWNER", &args.resource_owner)?;
    publisher.record("ENTITY_SCOPE", &entity_scope)?;
    publisher.record("ENTITY_REF", &entity_ref)?;
    tracing::info!("Entity reference: {}", entity_ref);

    tracing::info!("Finalizing outputs...");
    publisher.finalize()?;

    Ok(())
}
