//! stencil-render's main application entry point.
//! Handles command-line argument parsing and wires configuration, backend,
//! batch rendering and the watch loop together.

use log::info;
use stencil_render::{
    batch::{resolve_snapshot, Batch},
    cli::{get_args, Args},
    client::ApiClient,
    config::{env_token, get_config, BackendSettings, Settings},
    error::{default_error_handler, Result},
    local::{load_context, LocalBackend},
    logger::init_logger,
    service::Backend,
    watch::watch,
    writer::Output,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Loads the project configuration and merges it with the flags
/// 2. Sets up the API client or the offline backend
/// 3. Resolves the snapshot and the formation
/// 4. Renders every stencil once
/// 5. Keeps watching for changes when asked to
fn run(args: Args) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = get_config(args.config.as_deref(), &cwd)?;
    let settings = Settings::resolve(args, config, env_token())?;

    match settings.backend.clone() {
        BackendSettings::Api { url, token } => {
            let client = ApiClient::new(&url, token)?;
            render(&client, settings)
        }
        BackendSettings::Local { context } => {
            let context = match context {
                Some(path) => load_context(&path)?,
                None => serde_json::Value::Null,
            };
            let backend = LocalBackend::new(settings.target.watch_dir(), context);
            render(&backend, settings)
        }
    }
}

fn render<B: Backend>(backend: &B, settings: Settings) -> Result<()> {
    let Settings {
        stack,
        formation,
        target,
        output,
        snapshot,
        watch: keep_watching,
        policy,
        debounce,
        ..
    } = settings;

    info!("Stencils: {}", target);
    if let Output::Path(path) = &output {
        info!("Renders: {}", path.display());
    }

    let snapshot = resolve_snapshot(backend, &stack, snapshot.as_deref())?;
    let formation = backend.load_formation(&stack, &formation)?;

    let mut batch = Batch::new(backend, stack, formation, snapshot, target, output, policy);
    let report = batch.run()?;
    info!(
        "Rendered {}, unchanged {}, skipped {}, suppressed {}, failed {}",
        report.rendered, report.unchanged, report.skipped, report.suppressed, report.failed
    );

    if keep_watching {
        watch(&mut batch, debounce)?;
    }

    Ok(())
}
