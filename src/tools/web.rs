//! HTTP tools: generic API fetch and the weather lookup.

use reqwest::Method;
use serde_json::{json, Map, Value};
use url::Url;

use super::{Args, ToolContext, ToolError};

/// Non-JSON bodies are cut to this many bytes.
const MAX_TEXT_BODY: usize = 20_000;

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

fn parse_method(raw: &str) -> Result<Method, ToolError> {
    match raw.trim().to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(ToolError::Unsupported {
            kind: "HTTP method",
            value: other.to_string(),
            available: METHODS.join(", "),
        }),
    }
}

/// Headers may arrive as an object or as a JSON-encoded object string.
fn header_pairs(value: Option<&Value>) -> Result<Vec<(String, String)>, ToolError> {
    let map = match value {
        None => return Ok(Vec::new()),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => return Err(ToolError::Invalid("Headers must be a JSON object".to_string())),
        },
        Some(_) => return Err(ToolError::Invalid("Headers must be a JSON object".to_string())),
    };

    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect())
}

/// Request body: JSON strings are decoded, anything else is sent as given.
fn body_json(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn classify(e: reqwest::Error) -> ToolError {
    if e.is_timeout() {
        ToolError::RequestTimeout
    } else if e.is_connect() {
        ToolError::Connection(e.to_string())
    } else {
        ToolError::Http(e.to_string())
    }
}

pub async fn fetch_api_data(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let raw_url = args.str("url")?.trim();
    let url = Url::parse(raw_url)
        .map_err(|e| ToolError::Invalid(format!("Invalid URL '{}': {}", raw_url, e)))?;
    let method = parse_method(args.str("method")?)?;

    tracing::info!("Fetching {} {}", method, url);

    let mut request = ctx.http().request(method.clone(), url);
    for (name, value) in header_pairs(args.get("headers"))? {
        request = request.header(name, value);
    }
    if matches!(method, Method::POST | Method::PUT) {
        if let Some(data) = args.get("data") {
            request = request.json(&body_json(data));
        }
    }

    let response = request.send().await.map_err(classify)?;
    let status = response.status().as_u16();
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()),
            )
        })
        .collect();

    let body = response.text().await.map_err(classify)?;
    let content = match serde_json::from_str::<Value>(&body) {
        Ok(parsed) => parsed,
        Err(_) => Value::String(super::truncate_output(&body, MAX_TEXT_BODY)),
    };

    Ok(json!({
        "status_code": status,
        "content": content,
        "headers": headers,
    }))
}

/// Current conditions and temperature, e.g. `Sunny +21°C`.
const WEATHER_FORMAT: &str = "format=%C+%t";

pub async fn get_weather(args: &Args, ctx: &ToolContext) -> Result<Value, ToolError> {
    let city = args.str("city")?.trim();
    let mut url = Url::parse(ctx.weather_url())
        .map_err(|e| ToolError::Invalid(format!("Invalid weather service URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| ToolError::Invalid("Weather service URL cannot take a path".to_string()))?
        .pop_if_empty()
        .push(city);
    url.set_query(Some(WEATHER_FORMAT));

    tracing::info!("Looking up weather for {}", city);

    let response = ctx.http().get(url).send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolError::Http(format!("weather service returned {}", status)));
    }
    let report = response.text().await.map_err(classify)?;
    Ok(Value::String(format!("The weather in {} is {}.", city, report.trim())))
}
