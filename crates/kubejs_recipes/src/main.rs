use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kubejs_recipes_core::addons::AddonCache;
use kubejs_recipes_core::config::{AppConfig, load_or_init_config};
use kubejs_recipes_core::fetch::{WikiClient, WikiClientOptions};
use kubejs_recipes_core::ipc::IpcSession;
use kubejs_recipes_core::logging::{self, LogConfig};
use kubejs_recipes_core::menu::MenuSession;
use kubejs_recipes_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, normalize_for_display, resolve_root,
};
use kubejs_recipes_core::scanner::AddonScanner;
use kubejs_recipes_core::store::{LoadOutcome, RecipeStore};
use tracing::{info, warn};

#[cfg(feature = "gui")]
mod gui;

#[derive(Debug, Parser)]
#[command(
    name = "kubejs-recipes",
    version,
    about = "Create, edit, search and export KubeJS recipe definitions"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Menu, help = "Interaction surface to run")]
    mode: Mode,
    #[arg(long, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Menu,
    Form,
    Ipc,
}

/// Everything the surfaces share, built once at startup.
struct Runtime {
    paths: ResolvedPaths,
    store: RecipeStore,
    addons: AddonCache,
    client: WikiClient,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = start(&cli)?;

    if cli.diagnostics {
        let report = format!("[diagnostics]\n{}", runtime.paths.diagnostics());
        // stdout carries the protocol in IPC mode
        if cli.mode == Mode::Ipc {
            eprintln!("{report}");
        } else {
            println!("{report}\n");
        }
    }

    match cli.mode {
        Mode::Menu => run_menu(runtime),
        Mode::Ipc => run_ipc(runtime),
        Mode::Form => run_form(runtime),
    }
}

fn start(cli: &Cli) -> Result<Runtime> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: cli.project_root.clone(),
        config: cli.config.clone(),
    };
    let root = resolve_root(&context, &overrides);
    let project_env = root.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    let (config, config_warning) = match load_or_init_config(&root.config_path) {
        Ok((config, _)) => (config, None),
        Err(error) => (AppConfig::default(), Some(format!("{error:#}"))),
    };
    let paths = root.resolve(&config);

    logging::init(&LogConfig::from_config(&config, &paths.log_file))
        .context("failed to initialise logging")?;
    info!(
        "starting kubejs-recipes in {:?} mode (project root {})",
        cli.mode,
        normalize_for_display(&paths.project_root)
    );
    if let Some(message) = config_warning {
        warn!("{message}; using default configuration");
    }

    let (store, outcome) = RecipeStore::open(&paths.recipes_file);
    match outcome {
        LoadOutcome::Loaded(count) => info!("{count} recipes available"),
        LoadOutcome::Created => info!(
            "created empty recipe file {}",
            normalize_for_display(store.path())
        ),
        LoadOutcome::Recovered { backup } => warn!(
            "recipe file was malformed; original kept at {}",
            normalize_for_display(&backup)
        ),
        LoadOutcome::Unreadable => warn!(
            "recipe file {} could not be read; starting empty",
            normalize_for_display(store.path())
        ),
    }

    let options = WikiClientOptions::from_config(&config);
    let origin = AddonScanner::for_page(&options.url).origin().to_string();
    let addons = AddonCache::new(&paths.addons_db_file, config.db_max_age_days(), origin);
    info!(
        "addons database {} (max age {} days)",
        normalize_for_display(addons.path()),
        addons.max_age_days()
    );
    let client = WikiClient::new(options).context("failed to create HTTP client")?;

    Ok(Runtime {
        paths,
        store,
        addons,
        client,
    })
}

fn run_menu(runtime: Runtime) -> Result<()> {
    run_menu_with(runtime, io::stdin().lock(), io::stdout().lock())
}

fn run_menu_with<R: BufRead, W: Write>(mut runtime: Runtime, input: R, output: W) -> Result<()> {
    MenuSession::new(
        &mut runtime.store,
        &runtime.addons,
        &runtime.client,
        runtime.paths.export_default.clone(),
        input,
        output,
    )
    .run()
    .context("menu session failed")
}

fn run_ipc(mut runtime: Runtime) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = IpcSession::new(
        &mut runtime.store,
        &runtime.addons,
        &runtime.client,
        stdin.lock(),
        stdout.lock(),
    )
    .run();

    if let Err(error) = &result {
        let line = serde_json::json!({
            "action": "error",
            "success": false,
            "error": format!("IPC error: {error}"),
        });
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
    result.context("IPC session failed")
}

fn run_form(runtime: Runtime) -> Result<()> {
    run_form_with(runtime, launch_form, io::stdin().lock(), io::stdout().lock())
}

/// Runs the desktop form, dropping to the menu when the window cannot open.
fn run_form_with<L, R, W>(mut runtime: Runtime, launch: L, input: R, output: W) -> Result<()>
where
    L: FnOnce(&Runtime) -> Result<()>,
    R: BufRead,
    W: Write,
{
    let Err(error) = launch(&runtime) else {
        return Ok(());
    };
    warn!("{error:#}; falling back to menu mode");
    eprintln!("Form mode is unavailable ({error}). Falling back to menu mode...");
    // the window may have saved before failing
    runtime.store.load();
    run_menu_with(runtime, input, output)
}

#[cfg(feature = "gui")]
fn launch_form(runtime: &Runtime) -> Result<()> {
    gui::run(
        runtime.store.clone(),
        runtime.addons.clone(),
        Box::new(runtime.client.clone()),
        runtime.paths.export_default.clone(),
    )
}

#[cfg(not(feature = "gui"))]
fn launch_form(_runtime: &Runtime) -> Result<()> {
    Err(anyhow::anyhow!("this build has no desktop form support"))
}
