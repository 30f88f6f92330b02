//! The fixed tool catalog.
//!
//! Tools are a closed set: adding one means adding a [`ToolKind`] variant, and
//! the compiler then points at every `match` that has to handle it.

use super::args::{ArgSchema, FieldSpec};

/// Every tool the agent can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    RunCommand,
    CreateFolderStructure,
    ReadFolderStructure,
    ReadFile,
    WriteFile,
    SearchFiles,
    InstallDependencies,
    InitializeProject,
    RunDevServer,
    FetchApiData,
    DeployStaticSite,
    CreateDatabase,
    QueryDatabase,
    GetWeather,
}

/// Descriptor advertised to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Accepted input encodings, one per line
    pub usage: &'static str,
}

impl ToolKind {
    pub const ALL: [ToolKind; 14] = [
        ToolKind::RunCommand,
        ToolKind::CreateFolderStructure,
        ToolKind::ReadFolderStructure,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::SearchFiles,
        ToolKind::InstallDependencies,
        ToolKind::InitializeProject,
        ToolKind::RunDevServer,
        ToolKind::FetchApiData,
        ToolKind::DeployStaticSite,
        ToolKind::CreateDatabase,
        ToolKind::QueryDatabase,
        ToolKind::GetWeather,
    ];

    /// The developer tool set offered to coding sessions.
    pub const CODING: [ToolKind; 13] = [
        ToolKind::RunCommand,
        ToolKind::CreateFolderStructure,
        ToolKind::ReadFolderStructure,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::SearchFiles,
        ToolKind::InstallDependencies,
        ToolKind::InitializeProject,
        ToolKind::RunDevServer,
        ToolKind::FetchApiData,
        ToolKind::DeployStaticSite,
        ToolKind::CreateDatabase,
        ToolKind::QueryDatabase,
    ];

    /// Look up a tool by the name the model uses. Surrounding whitespace is
    /// ignored; anything else must match exactly.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::RunCommand => "run_command",
            ToolKind::CreateFolderStructure => "create_folder_structure",
            ToolKind::ReadFolderStructure => "read_folder_structure",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::SearchFiles => "search_files",
            ToolKind::InstallDependencies => "install_dependencies",
            ToolKind::InitializeProject => "initialize_project",
            ToolKind::RunDevServer => "run_dev_server",
            ToolKind::FetchApiData => "fetch_api_data",
            ToolKind::DeployStaticSite => "deploy_static_site",
            ToolKind::CreateDatabase => "create_database",
            ToolKind::QueryDatabase => "query_database",
            ToolKind::GetWeather => "get_weather",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::RunCommand => "Runs a shell command in the workspace and returns its output",
            ToolKind::CreateFolderStructure => "Creates folders/files from a nested dictionary",
            ToolKind::ReadFolderStructure => "Reads the folder/file structure recursively",
            ToolKind::ReadFile => "Reads the content of a specific file",
            ToolKind::WriteFile => "Writes content to a specific file",
            ToolKind::SearchFiles => "Searches for files containing a specific pattern",
            ToolKind::InstallDependencies => {
                "Installs dependencies using the specified package manager"
            }
            ToolKind::InitializeProject => "Initializes a new project with boilerplate code",
            ToolKind::RunDevServer => "Runs a development server in the background",
            ToolKind::FetchApiData => "Fetches data from an API endpoint",
            ToolKind::DeployStaticSite => "Deploys a static site to a hosting platform",
            ToolKind::CreateDatabase => "Creates an SQLite database with the specified schema",
            ToolKind::QueryDatabase => "Executes a query on an SQLite database",
            ToolKind::GetWeather => "Takes a city name and returns the current weather for the city",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            ToolKind::RunCommand => r#""npm test" or {"command": "npm test"}"#,
            ToolKind::CreateFolderStructure => {
                r#"{"src": {"index.js": "console.log('hi')", "lib": {}}} (objects are folders, strings are file contents)"#
            }
            ToolKind::ReadFolderStructure => {
                r#""src" or {"base_path": "src", "max_depth": 3, "excluded_dirs": ["dist"]}"#
            }
            ToolKind::ReadFile => r#""src/app.js" or {"file_path": "src/app.js"}"#,
            ToolKind::WriteFile => {
                r#"{"file_path": "src/app.js", "content": "..."} or "src/app.js|||file content here""#
            }
            ToolKind::SearchFiles => {
                r#""TODO" or {"pattern": "fox", "file_type": ".txt", "base_path": ".", "max_results": 20}"#
            }
            ToolKind::InstallDependencies => {
                r#"{"packages": "react react-dom", "manager": "npm"} or "react react-dom" or "react react-dom --manager=yarn" (managers: npm, yarn, pip, pipenv, composer)"#
            }
            ToolKind::InitializeProject => {
                r#"{"project_type": "react", "project_name": "my-app"} or "react my-app""#
            }
            ToolKind::RunDevServer => r#""npm run dev" or {"command": "npm run dev", "directory": "my-app"}"#,
            ToolKind::FetchApiData => {
                r#""https://api.example.com/items" or {"url": "...", "method": "POST", "headers": {}, "data": {}}"#
            }
            ToolKind::DeployStaticSite => {
                r#""dist" or {"directory": "dist", "platform": "netlify|vercel|github-pages|surge"}"#
            }
            ToolKind::CreateDatabase => {
                r#"{"db_name": "app", "schema": "CREATE TABLE todos (id INTEGER PRIMARY KEY, title TEXT);"}"#
            }
            ToolKind::QueryDatabase => {
                r#"{"db_name": "app", "query": "SELECT * FROM todos WHERE id = ?", "parameters": [1]}"#
            }
            ToolKind::GetWeather => r#""new york" or {"city": "new york"}"#,
        }
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name(),
            description: self.description(),
            usage: self.usage(),
        }
    }

    /// Argument layout used by the normalizer.
    pub fn schema(&self) -> &'static ArgSchema {
        match self {
            ToolKind::RunCommand => &RUN_COMMAND,
            ToolKind::CreateFolderStructure => &CREATE_FOLDER_STRUCTURE,
            ToolKind::ReadFolderStructure => &READ_FOLDER_STRUCTURE,
            ToolKind::ReadFile => &READ_FILE,
            ToolKind::WriteFile => &WRITE_FILE,
            ToolKind::SearchFiles => &SEARCH_FILES,
            ToolKind::InstallDependencies => &INSTALL_DEPENDENCIES,
            ToolKind::InitializeProject => &INITIALIZE_PROJECT,
            ToolKind::RunDevServer => &RUN_DEV_SERVER,
            ToolKind::FetchApiData => &FETCH_API_DATA,
            ToolKind::DeployStaticSite => &DEPLOY_STATIC_SITE,
            ToolKind::CreateDatabase => &CREATE_DATABASE,
            ToolKind::QueryDatabase => &QUERY_DATABASE,
            ToolKind::GetWeather => &GET_WEATHER,
        }
    }
}

const FILE_PATH: FieldSpec = FieldSpec::new("file_path").aliases(&["path", "filePath", "file"]);
const BASE_PATH: FieldSpec = FieldSpec::new("base_path")
    .aliases(&["basePath", "path", "directory"])
    .default_str(".");
const DB_NAME: FieldSpec = FieldSpec::new("db_name").aliases(&["dbName", "database"]);

static RUN_COMMAND: ArgSchema = ArgSchema {
    fields: &[FieldSpec::new("command").aliases(&["cmd"]).verbatim()],
    delimiter: None,
    object_is_primary: false,
};

static CREATE_FOLDER_STRUCTURE: ArgSchema = ArgSchema {
    fields: &[FieldSpec::new("structure"), BASE_PATH],
    delimiter: None,
    object_is_primary: true,
};

static READ_FOLDER_STRUCTURE: ArgSchema = ArgSchema {
    fields: &[
        BASE_PATH,
        FieldSpec::new("max_depth").aliases(&["maxDepth"]).default_int(5),
        FieldSpec::new("excluded_dirs").aliases(&["excludedDirs", "exclude"]),
    ],
    delimiter: None,
    object_is_primary: false,
};

static READ_FILE: ArgSchema = ArgSchema {
    fields: &[FILE_PATH],
    delimiter: None,
    object_is_primary: false,
};

static WRITE_FILE: ArgSchema = ArgSchema {
    fields: &[FILE_PATH, FieldSpec::new("content").default_str("").verbatim()],
    delimiter: Some("|||"),
    object_is_primary: false,
};

static SEARCH_FILES: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("pattern").aliases(&["query", "regex"]).verbatim(),
        FieldSpec::new("file_type").aliases(&["fileType", "extension"]),
        FieldSpec::new("base_path")
            .aliases(&["basePath", "path", "directory"])
            .default_str("."),
        FieldSpec::new("max_results").aliases(&["maxResults"]).default_int(20),
    ],
    delimiter: None,
    object_is_primary: false,
};

static INSTALL_DEPENDENCIES: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("packages").aliases(&["package", "dependencies"]),
        FieldSpec::new("manager").aliases(&["package_manager", "packageManager"]).default_str("npm"),
    ],
    delimiter: Some(" --manager="),
    object_is_primary: false,
};

static INITIALIZE_PROJECT: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("project_type").aliases(&["projectType", "type"]),
        FieldSpec::new("project_name").aliases(&["projectName", "name"]).required(),
    ],
    delimiter: Some(" "),
    object_is_primary: false,
};

static RUN_DEV_SERVER: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("command").aliases(&["cmd"]).verbatim(),
        FieldSpec::new("directory").aliases(&["dir", "cwd"]).default_str("."),
    ],
    delimiter: None,
    object_is_primary: false,
};

static FETCH_API_DATA: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("url").aliases(&["endpoint"]),
        FieldSpec::new("method").default_str("GET"),
        FieldSpec::new("headers"),
        FieldSpec::new("data").aliases(&["body", "json"]),
    ],
    delimiter: None,
    object_is_primary: false,
};

static DEPLOY_STATIC_SITE: ArgSchema = ArgSchema {
    fields: &[
        FieldSpec::new("directory").aliases(&["dir", "path"]),
        FieldSpec::new("platform").default_str("netlify"),
    ],
    delimiter: None,
    object_is_primary: false,
};

static CREATE_DATABASE: ArgSchema = ArgSchema {
    fields: &[
        DB_NAME,
        FieldSpec::new("schema")
            .aliases(&["schemaSQL", "schema_sql", "sql"])
            .required()
            .verbatim(),
    ],
    delimiter: None,
    object_is_primary: false,
};

static QUERY_DATABASE: ArgSchema = ArgSchema {
    fields: &[
        DB_NAME,
        FieldSpec::new("query").aliases(&["sql"]).required().verbatim(),
        FieldSpec::new("parameters").aliases(&["params", "args"]),
    ],
    delimiter: None,
    object_is_primary: false,
};

static GET_WEATHER: ArgSchema = ArgSchema {
    fields: &[FieldSpec::new("city").aliases(&["location", "place"])],
    delimiter: None,
    object_is_primary: false,
};
