//! Filesystem tools: single files and whole trees.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::{blocking, Args, ToolContext, ToolError};

/// Directories skipped by recursive reads and searches.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    "env",
    ".venv",
    "target",
];

/// Deepest tree read accepted; larger requests are clamped.
const MAX_TREE_DEPTH: u64 = 64;

pub const TOO_LARGE_MARKER: &str = "[FILE TOO LARGE]";
pub const UNREADABLE_MARKER: &str = "[UNREADABLE]";

pub async fn read_file(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let raw = args.str("file_path")?;
    let path = ctx.resolve(raw);

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ToolError::FileNotFound(raw.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        return Err(ToolError::Invalid(format!(
            "{} is a directory; use read_folder_structure",
            raw
        )));
    }

    let limit = ctx.limits().max_file_bytes;
    if meta.len() > limit {
        return Err(ToolError::TooLarge {
            path: raw.to_string(),
            size: meta.len(),
            limit,
        });
    }

    let bytes = tokio::fs::read(&path).await?;
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|_| ToolError::Binary(raw.to_string()))
}

pub async fn write_file(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let raw = args.str("file_path")?;
    let content = args.text("content").unwrap_or_default();
    let path = ctx.resolve(raw);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content.as_bytes()).await?;

    tracing::info!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(Value::String(format!("Successfully wrote to {}", raw)))
}

pub async fn create_folder_structure(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let structure = match args.get("structure") {
        Some(Value::Object(map)) => map.clone(),
        _ => {
            return Err(ToolError::Invalid(
                "Invalid JSON format for folder structure: expected an object of names to folders or file contents"
                    .to_string(),
            ))
        }
    };
    let base = ctx.resolve(args.str("base_path")?);
    let ctx = ctx.clone();

    blocking(move || {
        let mut created = Vec::new();
        create_entries(&base, &structure, &ctx, &mut created)?;
        Ok(Value::Array(created.into_iter().map(Value::String).collect()))
    })
    .await
}

/// Entry names may nest (`src/lib/a.js`) but never leave the base directory.
fn checked_entry(base: &Path, name: &str) -> Result<PathBuf, ToolError> {
    let relative = Path::new(name);
    let safe = !name.trim().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(ToolError::Invalid(format!(
            "Refusing to create '{}': entries must be relative names inside the base directory",
            name
        )));
    }
    Ok(base.join(relative))
}

fn create_entries(
    base: &Path,
    structure: &Map<String, Value>,
    ctx: &ToolContext,
    created: &mut Vec<String>,
) -> Result<(), ToolError> {
    for (name, content) in structure {
        let path = checked_entry(base, name)?;
        match content {
            Value::Object(children) => {
                std::fs::create_dir_all(&path)?;
                created.push(format!("[DIR] {}", ctx.display(&path)));
                create_entries(&path, children, ctx, created)?;
            }
            other => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let text = match other {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    value => value.to_string(),
                };
                std::fs::write(&path, text)?;
                created.push(format!("[FILE] {}", ctx.display(&path)));
            }
        }
    }
    Ok(())
}

pub async fn read_folder_structure(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let raw = args.str("base_path")?;
    let base = ctx.resolve(raw);
    if !base.is_dir() {
        return Err(ToolError::DirectoryNotFound(raw.to_string()));
    }

    let max_depth = args.u64("max_depth")?.unwrap_or(5).min(MAX_TREE_DEPTH) as usize;
    let excluded = excluded_dirs(args.get("excluded_dirs"));
    let limit = ctx.limits().max_file_bytes;

    blocking(move || Ok(Value::Object(walk_tree(&base, max_depth, &excluded, limit))))
        .await
}

/// Excluded directory names from an array, a comma-separated string, or the defaults.
fn excluded_dirs(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Mirror the tree under `base` as nested objects; files map to their text.
///
/// Directories deeper than `max_depth` below `base` are left out, files in a
/// directory at `max_depth` are still listed.
fn walk_tree(base: &Path, max_depth: usize, excluded: &[String], limit: u64) -> Map<String, Value> {
    let mut root = Map::new();

    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(max_depth.saturating_add(1))
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && excluded
                    .iter()
                    .any(|x| e.file_name().to_string_lossy() == x.as_str()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let Some((name, parents)) = parts.split_last() else {
            continue;
        };

        if entry.file_type().is_dir() {
            if entry.depth() <= max_depth {
                insert_at(&mut root, parents, name, Value::Object(Map::new()), false);
            }
        } else if entry.file_type().is_file() {
            insert_at(&mut root, parents, name, file_snapshot(entry.path(), limit), true);
        }
    }

    root
}

fn insert_at(node: &mut Map<String, Value>, parents: &[String], name: &str, value: Value, replace: bool) {
    match parents.split_first() {
        None => {
            if replace || !node.contains_key(name) {
                node.insert(name.to_string(), value);
            }
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_at(map, rest, name, value, replace);
            }
        }
    }
}

/// File content for tree listings, or a marker when it can't be shown.
pub(super) fn file_snapshot(path: &Path, limit: u64) -> Value {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > limit => Value::String(TOO_LARGE_MARKER.to_string()),
        Ok(_) => std::fs::read_to_string(path)
            .map(Value::String)
            .unwrap_or_else(|_| Value::String(UNREADABLE_MARKER.to_string())),
        Err(_) => Value::String(UNREADABLE_MARKER.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Payload, ToolLimits, ToolRegistry};
    use serde_json::json;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> ToolRegistry {
        ToolRegistry::new(dir.path().to_path_buf(), ToolLimits::default())
    }

    #[tokio::test]
    async fn read_file_reports_missing_and_binary_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let tools = registry(&dir);

        let missing = tools.dispatch("read_file", &Payload::from("nope.txt")).await.unwrap();
        assert_eq!(missing, json!("[ERROR] File not found: nope.txt"));

        let binary = tools.dispatch("read_file", &Payload::from("blob.bin")).await.unwrap();
        assert_eq!(
            binary,
            json!("[ERROR] File contains binary content that cannot be read as text: blob.bin")
        );
    }

    #[tokio::test]
    async fn read_file_refuses_oversized_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.log"), vec![b'x'; 2_000_000]).unwrap();
        let result = registry(&dir)
            .dispatch("read_file", &Payload::from(r#"{"path": "big.log"}"#))
            .await
            .unwrap();
        assert!(result.as_str().unwrap().starts_with("[ERROR] File too large to read (2000000 bytes"));
    }

    #[tokio::test]
    async fn write_file_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .dispatch("write_file", &Payload::from("src/deep/mod.js|||export {};\n"))
            .await
            .unwrap();
        assert_eq!(result, json!("Successfully wrote to src/deep/mod.js"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/deep/mod.js")).unwrap(),
            "export {};\n"
        );
    }

    #[tokio::test]
    async fn write_file_serializes_structured_content() {
        let dir = TempDir::new().unwrap();
        registry(&dir)
            .dispatch(
                "write_file",
                &Payload::from(json!({"file_path": "package.json", "content": {"name": "app"}})),
            )
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("package.json")).unwrap(),
            r#"{"name":"app"}"#
        );
    }

    #[tokio::test]
    async fn folder_structure_is_created_from_nested_objects() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .dispatch(
                "create_folder_structure",
                &Payload::from(r##"{"app": {"src": {"index.js": "console.log(1)"}, "README.md": "# app"}}"##),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            json!([
                "[DIR] app",
                "[DIR] app/src",
                "[FILE] app/src/index.js",
                "[FILE] app/README.md"
            ])
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app/src/index.js")).unwrap(),
            "console.log(1)"
        );
    }

    #[tokio::test]
    async fn folder_structure_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .dispatch("create_folder_structure", &Payload::from(r#"{"../evil.txt": "x"}"#))
            .await
            .unwrap();
        assert!(result.as_str().unwrap().starts_with("[ERROR] Refusing to create '../evil.txt'"));
        assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn folder_structure_needs_an_object() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .dispatch("create_folder_structure", &Payload::from("src/index.js"))
            .await
            .unwrap();
        assert!(result
            .as_str()
            .unwrap()
            .starts_with("[ERROR] Invalid JSON format for folder structure"));
    }

    #[tokio::test]
    async fn tree_read_marks_large_files_and_skips_noise() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/left-pad")).unwrap();
        std::fs::write(dir.path().join("src/main.js"), "main()").unwrap();
        std::fs::write(dir.path().join("node_modules/left-pad/index.js"), "pad").unwrap();
        std::fs::write(dir.path().join("huge.bin"), vec![b'a'; 2 * 1024 * 1024]).unwrap();
        std::fs::write(dir.path().join("image.png"), [0x89, 0x50, 0xff, 0xfe]).unwrap();

        let tree = registry(&dir)
            .dispatch("read_folder_structure", &Payload::from("."))
            .await
            .unwrap();

        assert_eq!(tree["huge.bin"], json!(TOO_LARGE_MARKER));
        assert_eq!(tree["image.png"], json!(UNREADABLE_MARKER));
        assert_eq!(tree["src"]["main.js"], json!("main()"));
        assert!(tree.get("node_modules").is_none());
    }

    #[tokio::test]
    async fn tree_read_stops_at_max_depth() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/one.txt"), "1").unwrap();
        std::fs::write(dir.path().join("a/b/two.txt"), "2").unwrap();
        std::fs::write(dir.path().join("a/b/c/three.txt"), "3").unwrap();

        let tree = registry(&dir)
            .dispatch(
                "read_folder_structure",
                &Payload::from(r#"{"base_path": ".", "max_depth": 1, "excluded_dirs": []}"#),
            )
            .await
            .unwrap();

        assert_eq!(tree["a"]["one.txt"], json!("1"));
        assert!(tree["a"].get("b").is_none());
    }

    #[tokio::test]
    async fn explicit_empty_exclusions_include_noise_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "x").unwrap();

        let tree = registry(&dir)
            .dispatch(
                "read_folder_structure",
                &Payload::from(r#"{"base_path": ".", "excluded_dirs": []}"#),
            )
            .await
            .unwrap();
        assert_eq!(tree["node_modules"]["x.js"], json!("x"));

        let defaulted = registry(&dir)
            .dispatch("read_folder_structure", &Payload::from("."))
            .await
            .unwrap();
        assert!(defaulted.get("node_modules").is_none());
    }

    #[tokio::test]
    async fn huge_max_depth_is_clamped() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/deep.txt"), "deep").unwrap();

        let tree = registry(&dir)
            .dispatch(
                "read_folder_structure",
                &Payload::from(r#"{"base_path": ".", "max_depth": 18446744073709551615}"#),
            )
            .await
            .unwrap();
        assert_eq!(tree["a"]["b"]["deep.txt"], json!("deep"));
    }

    #[tokio::test]
    async fn tree_read_of_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .dispatch("read_folder_structure", &Payload::from("ghost"))
            .await
            .unwrap();
        assert_eq!(result, json!("[ERROR] Directory not found: ghost"));
    }
}
