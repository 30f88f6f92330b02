//! Shell-backed tools: commands, dependency installs, scaffolding, dev servers
//! and deploys.

use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;

use super::{truncate_output, Args, ToolContext, ToolError};
use crate::pkg_manager::{self, PkgManager};

/// Scaffold commands per project type; `{name}` is replaced by the project name.
const PROJECT_TEMPLATES: &[(&str, &str)] = &[
    ("react", "npx create-react-app {name}"),
    ("next", "npx create-next-app {name}"),
    ("vue", "npm init vue@latest {name}"),
    ("express", "npx express-generator {name}"),
    ("django", "django-admin startproject {name}"),
    (
        "flask",
        r#"mkdir -p {name} && printf '%s\n' 'from flask import Flask' '' 'app = Flask(__name__)' '' "@app.route('/')" 'def home():' "    return 'Hello, World!'" '' "if __name__ == '__main__':" '    app.run(debug=True)' > {name}/app.py"#,
    ),
    ("vite-react", "npm create vite@latest {name} -- --template react"),
    ("vite-vue", "npm create vite@latest {name} -- --template vue"),
    ("vite-svelte", "npm create vite@latest {name} -- --template svelte"),
];

/// Deploy command per hosting platform, run inside the site directory.
const DEPLOY_PLATFORMS: &[(&str, &str)] = &[
    ("netlify", "npx netlify-cli deploy"),
    ("vercel", "npx vercel"),
    ("github-pages", "npx gh-pages -d ."),
    ("surge", "npx surge"),
];

fn shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

fn table_keys(table: &[(&str, &str)]) -> String {
    table.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
}

/// Run a shell command to completion, killing it once `timeout` elapses.
///
/// On Unix the command gets its own process group, so a timeout also takes
/// down anything it started (`a && b`, pipelines, background jobs).
async fn run_shell(command: &str, dir: &Path, ctx: &ToolContext) -> Result<String, ToolError> {
    let timeout = ctx.limits().command_timeout;
    tracing::info!("Executing command: {}", command);

    let (shell, shell_arg) = shell();
    let mut cmd = Command::new(shell);
    cmd.arg(shell_arg)
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| ToolError::Spawn(e.to_string()))?;
    let pid = child.id();

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| ToolError::Spawn(e.to_string()))?,
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            return Err(ToolError::Timeout(timeout.as_secs()));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let max = ctx.limits().max_output_chars;

    if !output.status.success() {
        let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
        return Err(ToolError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            output: truncate_output(detail.trim(), max),
        });
    }

    Ok(truncate_output(stdout.trim(), max))
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; a group that already exited yields ESRCH.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        tracing::debug!("Process group {} already gone", pgid);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn existing_dir(ctx: &ToolContext, raw: &str) -> Result<std::path::PathBuf, ToolError> {
    let dir = ctx.resolve(raw);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(ToolError::DirectoryNotFound(raw.to_string()))
    }
}

pub async fn run_command(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let command = args.str("command")?;
    run_shell(command, ctx.workspace(), ctx).await.map(Value::String)
}

pub async fn install_dependencies(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let packages = match args.get("packages") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => args.str("packages")?.to_string(),
    };
    let manager = args.str("manager")?;

    let pm = PkgManager::from_name(manager).ok_or_else(|| ToolError::Unsupported {
        kind: "package manager",
        value: manager.to_string(),
        available: pkg_manager::supported_names(),
    })?;

    if packages.split_whitespace().next().is_none() {
        return Err(ToolError::Invalid("No packages given to install".to_string()));
    }

    if !pkg_manager::is_available(pm).await {
        return Err(ToolError::Invalid(format!(
            "Package manager '{}' is not installed on this machine",
            pm.name()
        )));
    }

    let command = pm.install_command(&packages);
    run_shell(&command, ctx.workspace(), ctx).await.map(Value::String)
}

/// Project names end up in a shell command line.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Shell command for scaffolding `project_name` as `project_type`.
fn scaffold_command(project_type: &str, project_name: &str) -> Result<String, ToolError> {
    let template = PROJECT_TEMPLATES
        .iter()
        .find(|(kind, _)| *kind == project_type.to_lowercase())
        .map(|(_, template)| *template)
        .ok_or_else(|| ToolError::Unsupported {
            kind: "project type",
            value: project_type.to_string(),
            available: table_keys(PROJECT_TEMPLATES),
        })?;

    if !is_safe_name(project_name) || project_name == "." || project_name == ".." {
        return Err(ToolError::Invalid(format!(
            "Invalid project name '{}': use letters, digits, '-', '_' or '.'",
            project_name
        )));
    }

    Ok(template.replace("{name}", project_name))
}

pub async fn initialize_project(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let command = scaffold_command(args.str("project_type")?, args.str("project_name")?)?;
    run_shell(&command, ctx.workspace(), ctx).await.map(Value::String)
}

/// Start a long-running command in the background without waiting for it.
pub async fn run_dev_server(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let command = args.str("command")?;
    let directory = args.str("directory")?;
    let dir = existing_dir(ctx, directory)?;

    tracing::info!("Starting background command: {} in {}", command, dir.display());

    let (shell, shell_arg) = shell();
    let mut child = Command::new(shell)
        .arg(shell_arg)
        .arg(command)
        .current_dir(&dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ToolError::Spawn(e.to_string()))?;

    let pid = child.id();

    // Catch servers that die immediately (missing script, port in use, ...)
    tokio::time::sleep(ctx.limits().dev_server_settle).await;
    if let Ok(Some(status)) = child.try_wait() {
        if !status.success() {
            return Err(ToolError::CommandFailed {
                code: status.code().unwrap_or(-1),
                output: format!("'{}' exited during startup", command),
            });
        }
        return Ok(Value::String(format!(
            "Command '{}' finished immediately in directory: {}",
            command, directory
        )));
    }

    // Dropping the handle detaches the process; tokio reaps it when it exits.
    drop(child);

    Ok(Value::String(format!(
        "Development server started with command: {} in directory: {}{}",
        command,
        directory,
        pid.map(|p| format!(" (pid {})", p)).unwrap_or_default()
    )))
}

pub async fn deploy_static_site(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let directory = args.str("directory")?;
    let platform = args.str("platform")?;

    let command = DEPLOY_PLATFORMS
        .iter()
        .find(|(name, _)| *name == platform.to_lowercase())
        .map(|(_, command)| *command)
        .ok_or_else(|| ToolError::Unsupported {
            kind: "platform",
            value: platform.to_string(),
            available: table_keys(DEPLOY_PLATFORMS),
        })?;

    let dir = existing_dir(ctx, directory)?;
    run_shell(command, &dir, ctx).await.map(Value::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Payload, ToolLimits, ToolRegistry};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn registry_with(dir: &TempDir, limits: ToolLimits) -> ToolRegistry {
        ToolRegistry::new(dir.path().to_path_buf(), limits)
    }

    #[tokio::test]
    async fn run_command_returns_trimmed_stdout() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch("run_command", &Payload::from("echo hello && pwd"))
            .await
            .unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("hello\n"));
        assert!(!text.ends_with('\n'));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch("run_command", &Payload::from(r#"{"command": "echo oops >&2; exit 3"}"#))
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Command failed with exit code 3:\noops"));
    }

    #[tokio::test]
    async fn slow_command_is_killed_at_timeout() {
        let dir = TempDir::new().unwrap();
        let limits = ToolLimits {
            command_timeout: Duration::from_secs(1),
            ..ToolLimits::default()
        };
        let tools = registry_with(&dir, limits);
        let started = std::time::Instant::now();
        let result = tools
            .dispatch("run_command", &Payload::from("sleep 10"))
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Command timed out after 1 seconds"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_also_stops_background_children() {
        let dir = TempDir::new().unwrap();
        let limits = ToolLimits {
            command_timeout: Duration::from_secs(1),
            ..ToolLimits::default()
        };
        let tools = registry_with(&dir, limits);
        let result = tools
            .dispatch("run_command", &Payload::from("(sleep 2; touch late.txt) & sleep 10"))
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Command timed out after 1 seconds"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("late.txt").exists());
    }

    #[test]
    fn scaffold_table_rejects_unknown_types() {
        let err = scaffold_command("rails", "blog").unwrap_err();
        let text = err.tagged();
        assert!(text.starts_with("[ERROR] Unsupported project type: rails"));
        assert!(text.contains("react, next, vue, express, django, flask, vite-react, vite-vue, vite-svelte"));
    }

    #[test]
    fn scaffold_command_substitutes_name() {
        assert_eq!(
            scaffold_command("vite-react", "shop").unwrap(),
            "npm create vite@latest shop -- --template react"
        );
        assert!(scaffold_command("react", "shop; rm -rf ~").is_err());
        assert!(scaffold_command("react", "--help").is_err());
    }

    #[tokio::test]
    async fn flask_scaffold_writes_app_file() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch("initialize_project", &Payload::from("flask hello"))
            .await
            .unwrap();
        assert!(!result.as_str().unwrap_or_default().starts_with("[ERROR]"), "{result}");

        let app = std::fs::read_to_string(dir.path().join("hello/app.py")).unwrap();
        assert!(app.starts_with("from flask import Flask\n"));
        assert!(app.contains("@app.route('/')"));
        assert!(app.contains("    return 'Hello, World!'"));
    }

    #[tokio::test]
    async fn initialize_project_needs_a_name() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch("initialize_project", &Payload::from("react"))
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Missing required argument 'project_name'"));
    }

    #[tokio::test]
    async fn dev_server_requires_existing_directory() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch(
                "run_dev_server",
                &Payload::from(r#"{"command": "npm run dev", "directory": "missing-app"}"#),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Directory not found: missing-app"));
    }

    #[tokio::test]
    async fn dev_server_is_left_running() {
        let dir = TempDir::new().unwrap();
        let limits = ToolLimits {
            dev_server_settle: Duration::from_millis(200),
            ..ToolLimits::default()
        };
        let tools = registry_with(&dir, limits);
        let result = tools
            .dispatch("run_dev_server", &Payload::from("sleep 5"))
            .await
            .unwrap();
        assert!(result
            .as_str()
            .unwrap()
            .starts_with("Development server started with command: sleep 5 in directory: ."));
    }

    #[tokio::test]
    async fn dev_server_crash_is_reported() {
        let dir = TempDir::new().unwrap();
        let limits = ToolLimits {
            dev_server_settle: Duration::from_millis(300),
            ..ToolLimits::default()
        };
        let tools = registry_with(&dir, limits);
        let result = tools
            .dispatch("run_dev_server", &Payload::from("exit 7"))
            .await
            .unwrap();
        assert!(result
            .as_str()
            .unwrap()
            .starts_with("[ERROR] Command failed with exit code 7"));
    }

    #[tokio::test]
    async fn deploy_rejects_unknown_platform() {
        let dir = TempDir::new().unwrap();
        let tools = registry_with(&dir, ToolLimits::default());
        let result = tools
            .dispatch(
                "deploy_static_site",
                &Payload::from(r#"{"directory": ".", "platform": "geocities"}"#),
            )
            .await
            .unwrap();
        assert_eq!(
            result,
            json!("[ERROR] Unsupported platform: geocities. Available: netlify, vercel, github-pages, surge")
        );
    }
}
