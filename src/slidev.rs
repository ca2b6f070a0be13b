//! Slidev presentations: image build, listing, and the compose-driven
//! start/stop/export lifecycle.

use crate::context::{report, Context};
use crate::error::QuillError;
use crate::process::{child_env, execute, probe, ExternalCommand, Runner};
use crate::viewer::{local_url, open_url, open_url_best_effort};
use crate::workspace::{find_presentations, resolve_presentation, Prompter, ResolveRequest};
use clap::Subcommand;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum SlidevCommand {
    /// Build the Slidev Docker image
    Build,
    /// List available presentations (one per line)
    List,
    /// Start a presentation and open the browser
    Start { name: Option<String> },
    /// Stop the Slidev server
    Stop,
    /// Open the running presentation in the browser
    Open,
    /// Create a new presentation with the Slidev wizard
    Create { name: String },
    /// Export a presentation to PDF
    Export { name: Option<String> },
}

pub fn handle_slidev<R: Runner, P: Prompter>(
    ctx: &Context,
    command: SlidevCommand,
    runner: &R,
    prompter: &P,
) -> Result<(), QuillError> {
    match command {
        SlidevCommand::Build => {
            let image = build_image(ctx, runner, "Building Docker image...")?;
            report(
                ctx,
                &format!("Image '{image}' built successfully."),
                json!({"action": "build", "image": image}),
            )
        }
        SlidevCommand::List => list(ctx),
        SlidevCommand::Start { name } => start(ctx, name.as_deref(), runner, prompter),
        SlidevCommand::Stop => stop(ctx, runner),
        SlidevCommand::Open => open(ctx),
        SlidevCommand::Create { name } => create(ctx, &name, runner),
        SlidevCommand::Export { name } => export(ctx, name.as_deref(), runner, prompter),
    }
}

fn build_image<R: Runner>(ctx: &Context, runner: &R, progress: &str) -> Result<String, QuillError> {
    let build_dir = ctx.build_root();
    let dockerfile = build_dir.join(&ctx.config.slidev.dockerfile);
    if !dockerfile.exists() {
        return Err(QuillError::missing("Dockerfile", dockerfile));
    }
    let image = ctx.config.slidev_image();
    let command = ExternalCommand::docker([
        "build".to_string(),
        "-t".to_string(),
        image.clone(),
        "-f".to_string(),
        dockerfile.to_string_lossy().to_string(),
        build_dir.to_string_lossy().to_string(),
    ]);
    ctx.note(progress);
    execute(runner, &command, ctx.capture_output())?;
    Ok(image)
}

fn list(ctx: &Context) -> Result<(), QuillError> {
    let presentations = find_presentations(&ctx.slides_root(), &ctx.config.slidev.markers)?;
    if ctx.json {
        return report(ctx, "", json!({"presentations": presentations}));
    }
    for name in presentations {
        println!("{name}");
    }
    Ok(())
}

fn compose_file(ctx: &Context) -> Result<(PathBuf, PathBuf), QuillError> {
    let build_dir = ctx.build_root();
    let compose_file = build_dir.join(&ctx.config.slidev.compose_file);
    if !compose_file.exists() {
        return Err(QuillError::missing("docker-compose file", compose_file));
    }
    Ok((build_dir, compose_file))
}

fn compose_command(build_dir: &Path, compose_file: &Path, tail: &[&str]) -> ExternalCommand {
    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_file.to_string_lossy().to_string(),
    ];
    args.extend(tail.iter().map(|arg| arg.to_string()));
    ExternalCommand::docker(args).in_dir(build_dir)
}

/// Resolves the target presentation and checks that its directory exists.
fn target_presentation<P: Prompter>(
    ctx: &Context,
    name: Option<&str>,
    prompt: &str,
    prompter: &P,
) -> Result<(String, PathBuf), QuillError> {
    let slides_root = ctx.slides_root();
    let request = ResolveRequest {
        explicit: name,
        cwd: &ctx.cwd,
        slides_root: &slides_root,
        markers: &ctx.config.slidev.markers,
        prompt,
    };
    let name = resolve_presentation(&request, prompter)?;
    let presentation_dir = slides_root.join(&name);
    if !presentation_dir.exists() {
        return Err(QuillError::UnknownPresentation {
            name,
            root: slides_root,
        });
    }
    Ok((name, presentation_dir))
}

fn start<R: Runner, P: Prompter>(
    ctx: &Context,
    name: Option<&str>,
    runner: &R,
    prompter: &P,
) -> Result<(), QuillError> {
    let (name, _) = target_presentation(ctx, name, "Select presentation to start", prompter)?;
    let (build_dir, compose_file) = compose_file(ctx)?;
    let service = ctx.config.slidev.service.as_str();
    let command = compose_command(&build_dir, &compose_file, &["up", "--build", "-d", service])
        .with_env(child_env(&ctx.identity, Some(&name)));

    ctx.note(&format!("Starting '{name}'..."));
    execute(runner, &command, ctx.capture_output())?;

    let url = local_url(ctx.config.slidev.port);
    if !ctx.no_browser {
        ctx.note("Opening browser...");
        open_url_best_effort(&url);
    }
    report(
        ctx,
        &format!("Presentation '{name}' running at {url}"),
        json!({"action": "start", "presentation": name, "url": url}),
    )
}

fn stop<R: Runner>(ctx: &Context, runner: &R) -> Result<(), QuillError> {
    let (build_dir, compose_file) = compose_file(ctx)?;
    let command = compose_command(&build_dir, &compose_file, &["down"])
        .with_env(child_env(&ctx.identity, None));
    execute(runner, &command, ctx.capture_output())?;
    report(ctx, "Slidev server stopped.", json!({"action": "stop"}))
}

fn open(ctx: &Context) -> Result<(), QuillError> {
    let url = local_url(ctx.config.slidev.port);
    ctx.note(&format!("Opening browser at {url}"));
    if !ctx.no_browser {
        open_url(&url)?;
    }
    report(ctx, "", json!({"action": "open", "url": url}))
}

fn validate_name(name: &str) -> Result<(), QuillError> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty")
    } else if name.starts_with('.') {
        Some("name must not start with '.'")
    } else if name.contains('/') || name.contains('\\') {
        Some("name must not contain path separators")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(QuillError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn create<R: Runner>(ctx: &Context, name: &str, runner: &R) -> Result<(), QuillError> {
    validate_name(name)?;
    let slides_root = ctx.slides_root();
    let target_dir = slides_root.join(name);
    if target_dir.exists() {
        return Err(QuillError::AlreadyExists { path: target_dir });
    }

    let image = ctx.config.slidev_image();
    let inspect = ExternalCommand::docker(["image", "inspect", image.as_str()]);
    if !probe(runner, &inspect)? {
        build_image(
            ctx,
            runner,
            &format!("Building Docker image '{image}' (required for create)..."),
        )?;
    }

    fs::create_dir_all(&slides_root)?;
    let slug = &ctx.config.project.slug;
    let command = ExternalCommand::docker([
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        format!("{slug}-slidev-create-{name}"),
        "--user".to_string(),
        ctx.identity.user_spec(),
        "-e".to_string(),
        "HOME=/tmp".to_string(),
        "-e".to_string(),
        "NPM_CONFIG_CACHE=/tmp/.npm".to_string(),
        "-v".to_string(),
        format!("{}:/slidev", slides_root.to_string_lossy()),
        "-w".to_string(),
        "/slidev".to_string(),
        image,
        "sh".to_string(),
        "-lc".to_string(),
        format!("npm create slidev@latest {name} -- --yes"),
    ]);

    ctx.note(&format!("Creating presentation '{name}' using Docker..."));
    ctx.note("This may take a moment while dependencies are installed.\n");
    execute(runner, &command, ctx.capture_output()).map_err(|err| match err {
        QuillError::Process { message, details } => {
            let code = details
                .exit_code
                .map_or_else(|| "unknown".to_string(), |code| code.to_string());
            QuillError::Process {
                message: format!(
                    "Error creating presentation with Docker. Exit code: {code}\n{message}"
                ),
                details,
            }
        }
        other => other,
    })?;

    let next = format!("quill slidev start {name}");
    report(
        ctx,
        &format!(
            "\nPresentation '{name}' created at {}\n\nNext step:\n   {next}",
            target_dir.display()
        ),
        json!({"action": "create", "presentation": name, "path": target_dir, "next": next}),
    )
}

fn export<R: Runner, P: Prompter>(
    ctx: &Context,
    name: Option<&str>,
    runner: &R,
    prompter: &P,
) -> Result<(), QuillError> {
    let (name, presentation_dir) =
        target_presentation(ctx, name, "Select presentation to export", prompter)?;
    let (build_dir, compose_file) = compose_file(ctx)?;
    let service = ctx.config.slidev.export_service.as_str();
    let command = compose_command(&build_dir, &compose_file, &["run", "--rm", service])
        .with_env(child_env(&ctx.identity, Some(&name)));

    ctx.note(&format!("Exporting '{name}' to PDF..."));
    execute(runner, &command, ctx.capture_output())?;

    let out_path = presentation_dir.join(&ctx.config.slidev.export_file);
    report(
        ctx,
        &format!("Exported: {}", out_path.display()),
        json!({"action": "export", "presentation": name, "path": out_path}),
    )
}
