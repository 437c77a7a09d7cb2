// SPDX-License-Identifier: Apache-2.0

use crate::{AccessMode, EngineBackend, EngineError, EngineSession, Params, Row};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// HTTP transport to the graph-analytics engine's transactional
/// endpoint. Read and write traffic may target different replica
/// endpoints; auth is an optional bearer token.
pub struct HttpEngineBackend {
    read_endpoint: String,
    write_endpoint: String,
    database: String,
    bearer_token: Option<String>,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl HttpEngineBackend {
    #[must_use]
    pub fn new(endpoint: String, database: String) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self {
            read_endpoint: endpoint.clone(),
            write_endpoint: endpoint,
            database,
            bearer_token: None,
            request_timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_write_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint {
            self.write_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn commit_url(&self, mode: AccessMode) -> String {
        let base = match mode {
            AccessMode::Read => &self.read_endpoint,
            AccessMode::Write => &self.write_endpoint,
        };
        format!("{base}/db/{}/tx/commit", self.database)
    }
}

#[async_trait]
impl EngineBackend for HttpEngineBackend {
    fn backend_tag(&self) -> &'static str {
        "http"
    }

    async fn connect(&self, mode: AccessMode) -> Result<Box<dyn EngineSession>, EngineError> {
        Ok(Box::new(HttpEngineSession {
            client: self.client.clone(),
            url: self.commit_url(mode),
            bearer_token: self.bearer_token.clone(),
            request_timeout: self.request_timeout,
        }))
    }
}

struct HttpEngineSession {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
    request_timeout: Duration,
}

#[async_trait]
impl EngineSession for HttpEngineSession {
    async fn run(&mut self, query: &str, params: Params) -> Result<Vec<Row>, EngineError> {
        let body = json!({
            "statements": [{
                "statement": query,
                "parameters": Value::Object(params),
            }]
        });
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::connection(format!(
                "engine endpoint returned {status}"
            )));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::connection(e.to_string()))?;

        if let Some(error) = payload
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            return Err(classify_engine_error(error));
        }

        Ok(decode_result_rows(&payload))
    }
}

fn classify_engine_error(error: &Value) -> EngineError {
    let code = error.get("code").and_then(Value::as_str).unwrap_or("");
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("engine error without message");
    let rendered = format!("{code}: {message}");
    debug!("engine error: {rendered}");
    if code.contains("NotFound") || message.to_ascii_lowercase().contains("not found") {
        EngineError::not_found(rendered)
    } else {
        EngineError::query(rendered)
    }
}

/// Zips the column names of the first result against each data row.
/// Field presence is never trusted downstream, so malformed rows
/// simply come out shorter.
fn decode_result_rows(payload: &Value) -> Vec<Row> {
    let Some(result) = payload
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
    else {
        return Vec::new();
    };
    let columns: Vec<&str> = result
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(data) = result.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    data.iter()
        .filter_map(|entry| entry.get("row").and_then(Value::as_array))
        .map(|row| {
            let mut out = Row::new();
            for (column, value) in columns.iter().zip(row.iter()) {
                out.insert((*column).to_string(), value.clone());
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_zips_columns_and_rows() {
        let payload = json!({
            "results": [{
                "columns": ["exists"],
                "data": [{"row": [true]}, {"row": [false]}]
            }],
            "errors": []
        });
        let rows = decode_result_rows(&payload);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("exists"), Some(&json!(true)));
        assert_eq!(rows[1].get("exists"), Some(&json!(false)));
    }

    #[test]
    fn decode_tolerates_missing_results() {
        let rows = decode_result_rows(&json!({"errors": []}));
        assert!(rows.is_empty());
    }

    #[test]
    fn engine_errors_classify_not_found() {
        let err = classify_engine_error(&json!({
            "code": "Neo.ClientError.Procedure.GraphNotFound",
            "message": "Graph with name `abc` does not exist"
        }));
        assert!(err.is_not_found());

        let err = classify_engine_error(&json!({
            "code": "Neo.ClientError.Statement.SyntaxError",
            "message": "Invalid input"
        }));
        assert!(!err.is_not_found());
    }
}
