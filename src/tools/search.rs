//! Content search across the workspace.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::fs::DEFAULT_EXCLUDED_DIRS;
use super::{blocking, Args, ToolContext, ToolError};

/// Lines of context kept on each side of a match.
const CONTEXT_LINES: usize = 2;

pub async fn search_files(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let pattern = args.str("pattern")?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ToolError::Invalid(format!("Invalid search pattern '{}': {}", pattern, e)))?;

    let raw_base = args.str("base_path")?;
    let base = ctx.resolve(raw_base);
    if !base.is_dir() {
        return Err(ToolError::DirectoryNotFound(raw_base.to_string()));
    }

    let file_type = args.opt_str("file_type").map(str::to_string);
    let max_results = args.u64("max_results")?.unwrap_or(20) as usize;
    let limit = ctx.limits().max_file_bytes;
    let ctx = ctx.clone();

    tracing::info!("Searching {} for /{}/", base.display(), pattern);

    blocking(move || {
        let mut results = Map::new();
        for path in candidate_files(&base, file_type.as_deref(), limit) {
            if results.len() >= max_results {
                break;
            }
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            let hits = matches_in(&text, &regex);
            if !hits.is_empty() {
                results.insert(ctx.display(&path), Value::Object(hits));
            }
        }
        Ok(Value::Object(results))
    })
    .await
}

/// Regular files under `base`, sorted, with noise directories pruned.
fn candidate_files(base: &Path, file_type: Option<&str>, limit: u64) -> Vec<PathBuf> {
    WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && DEFAULT_EXCLUDED_DIRS
                    .iter()
                    .any(|x| e.file_name().to_string_lossy() == *x))
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            file_type.map_or(true, |ext| {
                e.file_name().to_string_lossy().ends_with(ext)
            })
        })
        .filter(|e| e.metadata().is_ok_and(|m| m.len() <= limit))
        .map(|e| e.into_path())
        .collect()
}

/// `"Line N"` to the surrounding lines for every matching line in `text`.
fn matches_in(text: &str, regex: &Regex) -> Map<String, Value> {
    let lines: Vec<&str> = text.lines().collect();
    let mut hits = Map::new();

    for (idx, line) in lines.iter().enumerate() {
        if !regex.is_match(line) {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(lines.len());
        hits.insert(
            format!("Line {}", idx + 1),
            Value::String(lines[start..end].join("\n")),
        );
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Payload, ToolLimits, ToolRegistry};
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "the quick\nbrown FOX\njumps").unwrap();
        std::fs::write(dir.path().join("b.txt"), "nothing to see").unwrap();
        std::fs::write(dir.path().join("c.md"), "a fox in markdown").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/fox.txt"), "fox").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_matches_case_insensitively_with_context() {
        let dir = fixture();
        let tools = ToolRegistry::new(dir.path().to_path_buf(), ToolLimits::default());

        let result = tools
            .dispatch("search_files", &Payload::from(r#"{"pattern": "fox", "file_type": ".txt"}"#))
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"a.txt": {"Line 2": "the quick\nbrown FOX\njumps"}})
        );
    }

    #[tokio::test]
    async fn max_results_caps_matching_files() {
        let dir = fixture();
        let tools = ToolRegistry::new(dir.path().to_path_buf(), ToolLimits::default());

        let result = tools
            .dispatch("search_files", &Payload::from(r#"{"pattern": "fox", "max_results": 1}"#))
            .await
            .unwrap();

        assert_eq!(result.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_pattern_is_reported() {
        let dir = fixture();
        let tools = ToolRegistry::new(dir.path().to_path_buf(), ToolLimits::default());

        let result = tools.dispatch("search_files", &Payload::from("(unclosed")).await.unwrap();
        assert!(result
            .as_str()
            .unwrap()
            .starts_with("[ERROR] Invalid search pattern '(unclosed'"));
    }

    #[test]
    fn context_is_clamped_at_file_edges() {
        let regex = Regex::new("one").unwrap();
        let hits = matches_in("one\ntwo\nthree\nfour", &regex);
        assert_eq!(hits["Line 1"], json!("one\ntwo\nthree"));
    }
}
