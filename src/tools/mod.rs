//! Tool dispatch.
//!
//! [`ToolRegistry::dispatch`] is the only entry point the agent loop uses: it
//! resolves a tool name, normalizes the raw payload and runs the tool. Tool
//! failures never escape as errors; they come back as `"[ERROR] <reason>"`
//! observations so the model can react to them. Only an unknown tool name is
//! reported to the caller as a [`DispatchError`].

pub mod args;
mod database;
mod fs;
mod registry;
mod search;
mod terminal;
mod web;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub use args::{normalize, ArgError, Args, Payload};
pub use registry::{ToolInfo, ToolKind};

/// Prefix of every failed tool observation.
pub const ERROR_TAG: &str = "[ERROR]";

/// Where `get_weather` looks up conditions.
pub const DEFAULT_WEATHER_URL: &str = "https://wttr.in";

/// Bounds on tool side effects.
#[derive(Debug, Clone)]
pub struct ToolLimits {
    /// Wall-clock limit for shell commands
    pub command_timeout: Duration,
    /// Request timeout for `fetch_api_data`
    pub fetch_timeout: Duration,
    /// Files larger than this are reported instead of read
    pub max_file_bytes: u64,
    /// Command output beyond this many bytes is truncated
    pub max_output_chars: usize,
    /// How long to watch a dev server for an immediate crash
    pub dev_server_settle: Duration,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            max_file_bytes: 1_000_000,
            max_output_chars: 10_000,
            dev_server_settle: Duration::from_secs(2),
        }
    }
}

/// Failure inside a tool. Rendered into the conversation with [`ERROR_TAG`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Arguments(#[from] ArgError),

    #[error("{0}")]
    Invalid(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("File too large to read ({size} bytes, limit {limit}): {path}")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("File contains binary content that cannot be read as text: {0}")]
    Binary(String),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to execute command: {0}")]
    Spawn(String),

    #[error("Command failed with exit code {code}:\n{output}")]
    CommandFailed { code: i32, output: String },

    #[error("Unsupported {kind}: {value}. Available: {available}")]
    Unsupported {
        kind: &'static str,
        value: String,
        available: String,
    },

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Database {0} does not exist")]
    DatabaseNotFound(String),

    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// The observation text for this failure.
    pub fn tagged(&self) -> String {
        format!("{} {}", ERROR_TAG, self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl DispatchError {
    pub fn tagged(&self) -> String {
        format!("{} {}", ERROR_TAG, self)
    }
}

/// Everything a tool needs besides its arguments.
#[derive(Debug, Clone)]
pub struct ToolContext {
    workspace: PathBuf,
    limits: ToolLimits,
    http: reqwest::Client,
    weather_url: String,
}

impl ToolContext {
    pub fn new(workspace: PathBuf, limits: ToolLimits) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
            .timeout(limits.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            workspace,
            limits,
            http,
            weather_url: DEFAULT_WEATHER_URL.to_string(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn limits(&self) -> &ToolLimits {
        &self.limits
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn weather_url(&self) -> &str {
        &self.weather_url
    }

    /// Resolve a model-supplied path against the workspace.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Path as shown to the model: relative to the workspace when inside it.
    pub fn display(&self, path: &Path) -> String {
        let shown = path.strip_prefix(&self.workspace).unwrap_or(path);
        let normal: PathBuf = shown
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if normal.as_os_str().is_empty() {
            ".".to_string()
        } else {
            normal.to_string_lossy().into_owned()
        }
    }
}

/// The dispatcher over the fixed tool set.
pub struct ToolRegistry {
    ctx: ToolContext,
}

impl ToolRegistry {
    pub fn new(workspace: PathBuf, limits: ToolLimits) -> Self {
        Self {
            ctx: ToolContext::new(workspace, limits),
        }
    }

    /// Point `get_weather` at another service base URL.
    pub fn with_weather_url(mut self, url: impl Into<String>) -> Self {
        self.ctx.weather_url = url.into();
        self
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Descriptors of `kinds`, in the order given.
    pub fn list_tools(&self, kinds: &[ToolKind]) -> Vec<ToolInfo> {
        kinds.iter().map(ToolKind::info).collect()
    }

    /// Run the named tool on a raw payload.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownTool` when `name` is not in the catalog.
    /// Any failure of a known tool is returned as a tagged `Value::String`.
    pub async fn dispatch(&self, name: &str, payload: &Payload) -> Result<Value, DispatchError> {
        let kind =
            ToolKind::from_name(name).ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;
        Ok(self.invoke(kind, payload).await)
    }

    /// Normalize and run a known tool, folding failures into the result.
    pub async fn invoke(&self, kind: ToolKind, payload: &Payload) -> Value {
        tracing::info!(tool = kind.name(), "Dispatching tool");

        let result = match normalize(kind.schema(), payload) {
            Ok(args) => self.execute(kind, &args).await,
            Err(e) => Err(ToolError::from(e)),
        };

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = kind.name(), error = %e, "Tool failed");
                Value::String(e.tagged())
            }
        }
    }

    async fn execute(&self, kind: ToolKind, args: &Args) -> Result<Value, ToolError> {
        let ctx = &self.ctx;
        match kind {
            ToolKind::RunCommand => terminal::run_command(args, ctx).await,
            ToolKind::CreateFolderStructure => fs::create_folder_structure(args, ctx).await,
            ToolKind::ReadFolderStructure => fs::read_folder_structure(args, ctx).await,
            ToolKind::ReadFile => fs::read_file(args, ctx).await,
            ToolKind::WriteFile => fs::write_file(args, ctx).await,
            ToolKind::SearchFiles => search::search_files(args, ctx).await,
            ToolKind::InstallDependencies => terminal::install_dependencies(args, ctx).await,
            ToolKind::InitializeProject => terminal::initialize_project(args, ctx).await,
            ToolKind::RunDevServer => terminal::run_dev_server(args, ctx).await,
            ToolKind::FetchApiData => web::fetch_api_data(args, ctx).await,
            ToolKind::DeployStaticSite => terminal::deploy_static_site(args, ctx).await,
            ToolKind::CreateDatabase => database::create_database(args, ctx).await,
            ToolKind::QueryDatabase => database::query_database(args, ctx).await,
            ToolKind::GetWeather => web::get_weather(args, ctx).await,
        }
    }
}

/// Run blocking work (directory walks, SQLite) off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::Internal(e.to_string()))?
}

/// Truncate text to at most `max_chars` bytes on a char boundary.
fn truncate_output(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [output truncated]", &text[..end])
}
