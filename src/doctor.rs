use crate::context::{print_json, Context, JsonResult};
use crate::error::QuillError;
use crate::process::{probe, ExternalCommand, Runner};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub id: String,
    pub ok: bool,
    pub severity: String,
    pub message: String,
    pub remediation: String,
}

fn doctor_check(
    id: &str,
    ok: bool,
    severity: &str,
    message: impl Into<String>,
    remediation: impl Into<String>,
) -> DoctorCheck {
    DoctorCheck {
        id: id.to_string(),
        ok,
        severity: severity.to_string(),
        message: message.into(),
        remediation: remediation.into(),
    }
}

fn file_check(id: &str, path: &Path, severity: &str) -> DoctorCheck {
    let ok = path.is_file();
    doctor_check(
        id,
        ok,
        severity,
        if ok {
            format!("found {}", path.display())
        } else {
            format!("missing {}", path.display())
        },
        "Run quill from inside the generated project, or pass --build-dir.",
    )
}

pub fn collect_doctor_checks<R: Runner>(
    ctx: &Context,
    runner: &R,
    docker_installed: bool,
) -> Result<Vec<DoctorCheck>, QuillError> {
    let mut checks = Vec::new();

    let config_exists = ctx.config_path.is_file();
    checks.push(doctor_check(
        "config_file",
        true,
        "info",
        if config_exists {
            format!("using {}", ctx.config_path.display())
        } else {
            format!("no config at {}, using defaults", ctx.config_path.display())
        },
        "Run `quill config init` to write the default config.",
    ));

    let docker_ok = docker_installed && probe(runner, &ExternalCommand::docker(["info"]))?;
    checks.push(doctor_check(
        "docker_runtime",
        docker_ok,
        "error",
        if docker_ok {
            "docker daemon reachable"
        } else if docker_installed {
            "docker is installed but daemon is unreachable"
        } else {
            "docker is not installed or not in PATH"
        },
        "Install/start Docker Desktop (or dockerd) and rerun `quill doctor`.",
    ));

    let compose_ok =
        docker_installed && probe(runner, &ExternalCommand::docker(["compose", "version"]))?;
    checks.push(doctor_check(
        "docker_compose",
        compose_ok,
        "error",
        if compose_ok {
            "docker compose available"
        } else {
            "docker compose is unavailable"
        },
        "Install the Docker Compose plugin.",
    ));

    let slides_root = ctx.slides_root();
    let slides_ok = slides_root.is_dir();
    checks.push(doctor_check(
        "slides_root",
        slides_ok,
        "warning",
        format!(
            "{} {}",
            if slides_ok { "found" } else { "missing" },
            slides_root.display()
        ),
        "Create a presentation with `quill slidev create <name>`.",
    ));

    let build_root = ctx.build_root();
    let build_ok = build_root.is_dir();
    checks.push(doctor_check(
        "build_root",
        build_ok,
        "error",
        format!(
            "{} {}",
            if build_ok { "found" } else { "missing" },
            build_root.display()
        ),
        "Run quill from inside the generated project, or pass --build-dir.",
    ));

    let cfg = &ctx.config;
    checks.push(file_check(
        "slidev_dockerfile",
        &build_root.join(&cfg.slidev.dockerfile),
        "warning",
    ));
    checks.push(file_check(
        "slidev_compose",
        &build_root.join(&cfg.slidev.compose_file),
        "warning",
    ));
    checks.push(file_check(
        "mkdocs_compose",
        &build_root.join(&cfg.mkdocs.compose_file),
        "warning",
    ));
    Ok(checks)
}

pub fn handle_doctor<R: Runner>(ctx: &Context, strict: bool, runner: &R) -> Result<(), QuillError> {
    let docker_installed = which::which("docker").is_ok();
    let checks = collect_doctor_checks(ctx, runner, docker_installed)?;
    let has_error = checks.iter().any(|check| !check.ok && check.severity == "error");
    let has_warning = checks.iter().any(|check| !check.ok);
    let ok = !has_error && (!strict || !has_warning);
    let primary_error = checks
        .iter()
        .find(|check| !check.ok && check.severity == "error")
        .or_else(|| checks.iter().find(|check| !check.ok))
        .map(|check| check.message.clone());

    if ctx.json {
        let payload = JsonResult {
            ok,
            result: Some(json!({ "checks": checks, "strict": strict })),
            error: if ok { None } else { primary_error.clone() },
            error_details: None,
        };
        print_json(&payload)?;
    } else {
        print_checks(&checks);
    }
    if ok {
        return Ok(());
    }
    Err(QuillError::Doctor(
        primary_error.unwrap_or_else(|| "one or more readiness checks failed".to_string()),
    ))
}

fn print_checks(checks: &[DoctorCheck]) {
    for check in checks {
        let state = if check.ok { "ok" } else { "fail" };
        println!(
            "[{}] {} ({}) - {}",
            state, check.id, check.severity, check.message
        );
        if !check.ok {
            println!("  remediation: {}", check.remediation);
        }
    }
}
