mod config;
mod context;
mod doctor;
mod error;
mod logging;
mod mkdocs;
mod process;
mod slidev;
mod viewer;
mod workspace;

use clap::{Args, Parser, Subcommand};
use config::{ensure_parent, load_config, read_config, resolve_config_path, DEFAULT_CONFIG_YAML};
use context::{report_error, report_with, Context};
use error::QuillError;
use mkdocs::MkdocsCommand;
use process::{Identity, SystemRunner};
use serde_json::json;
use slidev::SlidevCommand;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use workspace::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    version,
    about = "Manage Slidev presentations and MkDocs documentation with Docker"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    /// Do not launch a browser after starting a server
    #[arg(long, global = true)]
    no_browser: bool,
    #[arg(long, global = true, hide = true)]
    slides_dir: Option<PathBuf>,
    #[arg(long, global = true, hide = true)]
    build_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage Slidev presentations with Docker
    Slidev {
        #[command(subcommand)]
        command: SlidevCommand,
    },
    /// Manage MkDocs documentation with Docker
    Mkdocs {
        #[command(subcommand)]
        command: MkdocsCommand,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Check that Docker and the project layout are usable
    Doctor {
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Validate,
    Show,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let json = cli.global.json;

    if let Err(err) = run(cli) {
        if report_error(json, &err).is_err() {
            eprintln!("{err}");
        }
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), QuillError> {
    let config_path = resolve_config_path(cli.global.config.as_ref());
    match cli.command {
        Commands::Config { command } => handle_config(&config_path, cli.global.json, command),
        Commands::Slidev { command } => {
            let ctx = build_context(&cli.global, config_path)?;
            slidev::handle_slidev(&ctx, command, &SystemRunner, &TerminalPrompter)
        }
        Commands::Mkdocs { command } => {
            let ctx = build_context(&cli.global, config_path)?;
            mkdocs::handle_mkdocs(&ctx, command, &SystemRunner)
        }
        Commands::Doctor { strict } => {
            let ctx = build_context(&cli.global, config_path)?;
            doctor::handle_doctor(&ctx, strict, &SystemRunner)
        }
    }
}

fn build_context(global: &GlobalArgs, config_path: PathBuf) -> Result<Context, QuillError> {
    let config = load_config(&config_path)?;
    let cwd = env::current_dir()?;
    let identity = Identity::detect();
    tracing::debug!(
        cwd = %cwd.display(),
        uid = identity.uid,
        gid = identity.gid,
        "invocation context"
    );
    Ok(Context {
        cwd,
        config_path,
        config,
        identity,
        slides_dir_override: global.slides_dir.clone(),
        build_dir_override: global.build_dir.clone(),
        json: global.json,
        no_browser: global.no_browser,
    })
}

fn handle_config(config_path: &Path, json: bool, command: ConfigCommand) -> Result<(), QuillError> {
    match command {
        ConfigCommand::Init => {
            if config_path.exists() {
                return report_with(
                    json,
                    &format!("Config already exists at {}", config_path.display()),
                    json!({"path": config_path, "created": false}),
                );
            }
            ensure_parent(config_path)?;
            fs::write(config_path, DEFAULT_CONFIG_YAML)?;
            report_with(
                json,
                &format!("Created {}", config_path.display()),
                json!({"path": config_path, "created": true}),
            )
        }
        ConfigCommand::Validate => {
            if !config_path.exists() {
                return Err(QuillError::missing("Config file", config_path.to_path_buf()));
            }
            read_config(config_path)?;
            report_with(
                json,
                &format!("{} is valid.", config_path.display()),
                json!({"path": config_path, "valid": true}),
            )
        }
        ConfigCommand::Show => {
            let cfg = load_config(config_path)?;
            if json {
                let payload = json!({
                    "path": config_path,
                    "exists": config_path.exists(),
                    "config": cfg,
                });
                return report_with(true, "", payload);
            }
            print!("{}", serde_yaml::to_string(&cfg)?);
            Ok(())
        }
    }
}
