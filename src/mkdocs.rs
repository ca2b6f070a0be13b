use crate::context::{report, Context};
use crate::error::QuillError;
use crate::process::{child_env, execute, ExternalCommand, Runner};
use crate::viewer::{local_url, open_url_best_effort};
use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MkdocsCommand {
    /// Start the MkDocs development server and open the browser
    Start,
    /// Stop the MkDocs server
    Stop,
    /// Build static HTML documentation
    Build,
}

pub fn handle_mkdocs<R: Runner>(
    ctx: &Context,
    command: MkdocsCommand,
    runner: &R,
) -> Result<(), QuillError> {
    let build_dir = ctx.build_root();
    let compose_file = build_dir.join(&ctx.config.mkdocs.compose_file);
    if !compose_file.exists() {
        return Err(QuillError::missing("docker-compose file", compose_file));
    }
    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_file.to_string_lossy().to_string(),
    ];
    let mkdocs = &ctx.config.mkdocs;
    match command {
        MkdocsCommand::Start => {
            args.extend(["up", "--build", "-d"].map(String::from));
            args.push(mkdocs.serve_service.clone());
        }
        MkdocsCommand::Stop => args.push("down".to_string()),
        MkdocsCommand::Build => {
            args.extend(["run", "--rm"].map(String::from));
            args.push(mkdocs.build_service.clone());
        }
    }
    let docker = ExternalCommand::docker(args)
        .in_dir(&build_dir)
        .with_env(child_env(&ctx.identity, None));

    match command {
        MkdocsCommand::Start => {
            ctx.note("Starting MkDocs server...");
            execute(runner, &docker, ctx.capture_output())?;
            let url = local_url(mkdocs.port);
            if !ctx.no_browser {
                ctx.note("Opening browser...");
                open_url_best_effort(&url);
            }
            report(
                ctx,
                &format!("MkDocs server running at {url}"),
                json!({"action": "mkdocs_start", "url": url}),
            )
        }
        MkdocsCommand::Stop => {
            execute(runner, &docker, ctx.capture_output())?;
            report(ctx, "MkDocs server stopped.", json!({"action": "mkdocs_stop"}))
        }
        MkdocsCommand::Build => {
            ctx.note("Building MkDocs documentation...");
            execute(runner, &docker, ctx.capture_output())?;
            report(
                ctx,
                &format!("Documentation built successfully in {}/", mkdocs.site_dir),
                json!({"action": "mkdocs_build", "site_dir": mkdocs.site_dir}),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::make_context;
    use crate::process::tests::MockRunner;
    use std::fs;
    use tempfile::tempdir;

    fn with_compose(root: &std::path::Path) {
        let build = root.join(".build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("mkdocs-compose.yml"), "services: {}\n").unwrap();
    }

    #[test]
    fn missing_compose_file_is_reported() {
        let dir = tempdir().unwrap();
        let ctx = make_context(dir.path());
        let runner = MockRunner::default();
        let err = handle_mkdocs(&ctx, MkdocsCommand::Build, &runner).expect_err("missing");
        assert!(err.to_string().contains("mkdocs-compose.yml"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn start_brings_up_serve_service() {
        let dir = tempdir().unwrap();
        with_compose(dir.path());
        let ctx = make_context(dir.path());
        let runner = MockRunner::default();
        handle_mkdocs(&ctx, MkdocsCommand::Start, &runner).unwrap();

        let commands = runner.commands();
        assert_eq!(&commands[0].args[3..], &["up", "--build", "-d", "mkdocs-serve"]);
        assert_eq!(commands[0].env.get("UID").map(String::as_str), Some("1234"));
        assert!(!commands[0].env.contains_key("PRESENTATION"));
    }

    #[test]
    fn build_runs_one_shot_container() {
        let dir = tempdir().unwrap();
        with_compose(dir.path());
        let ctx = make_context(dir.path());
        let runner = MockRunner::default();
        handle_mkdocs(&ctx, MkdocsCommand::Build, &runner).unwrap();
        assert_eq!(&runner.commands()[0].args[3..], &["run", "--rm", "mkdocs-build"]);
    }

    #[test]
    fn stop_is_repeatable() {
        let dir = tempdir().unwrap();
        with_compose(dir.path());
        let ctx = make_context(dir.path());
        let runner = MockRunner::default();
        handle_mkdocs(&ctx, MkdocsCommand::Stop, &runner).unwrap();
        handle_mkdocs(&ctx, MkdocsCommand::Stop, &runner).unwrap();
        assert_eq!(runner.commands().len(), 2);
    }
}
