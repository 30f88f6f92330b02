//! SQLite tools. Database files live in the workspace as `<name>.db`.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Map, Value};

use super::{blocking, Args, ToolContext, ToolError};

fn db_file_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(".db") {
        name.to_string()
    } else {
        format!("{}.db", name)
    }
}

fn db_path(args: &Args, ctx: &ToolContext) -> Result<(String, PathBuf), ToolError> {
    let name = db_file_name(args.str("db_name")?);
    let path = ctx.resolve(&name);
    Ok((name, path))
}

pub async fn create_database(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let (name, path) = db_path(args, ctx)?;
    let schema = args.str("schema")?.to_string();

    tracing::info!("Creating database {}", path.display());

    blocking(move || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(&schema)?;
        Ok(Value::String(format!(
            "Database {} created successfully with the provided schema",
            name
        )))
    })
    .await
}

/// Bound statement parameters: positional or named.
enum Params {
    Positional(Vec<SqlValue>),
    Named(Vec<(String, SqlValue)>),
}

impl Params {
    fn from_arg(value: Option<&Value>) -> Result<Self, ToolError> {
        match value {
            None => Ok(Params::Positional(Vec::new())),
            Some(Value::Array(items)) => Ok(Params::Positional(items.iter().map(to_sql).collect())),
            Some(Value::Object(map)) => Ok(Params::Named(
                map.iter()
                    .map(|(k, v)| {
                        let key = if k.starts_with([':', '@', '$']) {
                            k.clone()
                        } else {
                            format!(":{}", k)
                        };
                        (key, to_sql(v))
                    })
                    .collect(),
            )),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Self::from_arg(Some(&parsed)),
                _ => Err(ToolError::Invalid(
                    "Query parameters must be a JSON array or object".to_string(),
                )),
            },
            Some(other) => Ok(Params::Positional(vec![to_sql(other)])),
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(STANDARD.encode(b)),
    }
}

fn run_query(conn: &Connection, sql: &str, params: &Params) -> Result<Value, ToolError> {
    let mut stmt = conn.prepare(sql)?;

    // statements that produce columns are read back; everything else reports a count
    if stmt.column_count() == 0 {
        let affected = match params {
            Params::Positional(values) => stmt.execute(params_from_iter(values.iter()))?,
            Params::Named(pairs) => {
                let named: Vec<(&str, &dyn rusqlite::ToSql)> = pairs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v as &dyn rusqlite::ToSql))
                    .collect();
                stmt.execute(named.as_slice())?
            }
        };
        return Ok(json!({
            "affected_rows": affected,
            "message": "Query executed successfully",
        }));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = match params {
        Params::Positional(values) => stmt.query(params_from_iter(values.iter()))?,
        Params::Named(pairs) => {
            let named: Vec<(&str, &dyn rusqlite::ToSql)> = pairs
                .iter()
                .map(|(k, v)| (k.as_str(), v as &dyn rusqlite::ToSql))
                .collect();
            stmt.query(named.as_slice())?
        }
    };

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::new();
        for (idx, column) in columns.iter().enumerate() {
            record.insert(column.clone(), from_sql(row.get_ref(idx)?));
        }
        out.push(Value::Object(record));
    }

    Ok(json!({
        "rows": out,
        "row_count": out.len(),
    }))
}

pub async fn query_database(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let (name, path) = db_path(args, ctx)?;
    if !path.is_file() {
        return Err(ToolError::DatabaseNotFound(name));
    }
    let sql = args.str("query")?.to_string();
    let params = Params::from_arg(args.get("parameters"))?;

    tracing::info!("Querying database {}", path.display());

    blocking(move || {
        let conn = Connection::open(&path)?;
        run_query(&conn, &sql, &params)
    })
    .await
}
