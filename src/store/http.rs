use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

use crate::config::ElasticsearchConfig;
use crate::error::StoreError;
use crate::store::{AliasAction, CreateOutcome, ReindexReport, SearchStore};

/// Elasticsearch REST 实现
pub struct HttpStore {
    client: Client,
    base: String,
}

impl HttpStore {
    pub fn new(cfg: &ElasticsearchConfig) -> Result<Self, StoreError> {
        // _reindex 可能持续很久，不设整体请求超时，只限制建连
        let client = Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .build()
            .map_err(|source| StoreError::Transport {
                endpoint: cfg.url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base: cfg.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), StoreError> {
        let endpoint = format!("{} {}", method, path);
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(|source| StoreError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|source| StoreError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        tracing::debug!("{} -> {}", endpoint, status);

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?
        };
        Ok((status, value))
    }

    /// 2xx 返回 body，404 返回 None，其余为错误
    async fn get_optional(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let (status, value) = self.send(Method::GET, path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        ensure_success(&format!("GET {}", path), status, &value)?;
        Ok(Some(value))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, StoreError> {
        let (status, value) = self.send(Method::PUT, path, Some(body)).await?;
        ensure_success(&format!("PUT {}", path), status, &value)?;
        Ok(value)
    }
}

fn ensure_success(endpoint: &str, status: StatusCode, body: &Value) -> Result<(), StoreError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(StoreError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.to_string(),
        })
    }
}

fn error_type(body: &Value) -> Option<&str> {
    body.get("error")?.get("type")?.as_str()
}

fn malformed(endpoint: &str, reason: &str) -> StoreError {
    StoreError::Malformed {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl SearchStore for HttpStore {
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StoreError> {
        let path = format!("/_alias/{}", alias);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(Vec::new());
        };
        let obj = body
            .as_object()
            .ok_or_else(|| malformed(&path, "expected an object keyed by index"))?;
        let mut names: Vec<String> = obj.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_mapping(&self, index: &str) -> Result<Option<Value>, StoreError> {
        let path = format!("/{}/_mapping", index);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(None);
        };
        // 形如 {"<index>": {"mappings": {...}}}
        let entry = body
            .get(index)
            .or_else(|| body.as_object().and_then(|o| o.values().next()))
            .ok_or_else(|| malformed(&path, "missing index entry"))?;
        Ok(Some(entry.get("mappings").cloned().unwrap_or_else(|| json!({}))))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<CreateOutcome, StoreError> {
        let path = format!("/{}", index);
        let (status, value) = self.send(Method::PUT, &path, Some(body)).await?;
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }
        if error_type(&value) == Some("resource_already_exists_exception") {
            return Ok(CreateOutcome::AlreadyExists);
        }
        ensure_success(&format!("PUT {}", path), status, &value)?;
        Ok(CreateOutcome::Created)
    }

    async fn count(&self, index: &str) -> Result<u64, StoreError> {
        let path = format!("/{}/_count", index);
        let body = self
            .get_optional(&path)
            .await?
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed(&path, "missing count"))
    }

    async fn reindex(&self, from: &str, to: &str) -> Result<ReindexReport, StoreError> {
        let path = "/_reindex?wait_for_completion=true&refresh=true";
        let body = json!({
            "source": { "index": from },
            "dest": { "index": to },
        });
        let (status, value) = self.send(Method::POST, path, Some(&body)).await?;
        ensure_success(&format!("POST {}", path), status, &value)?;

        let failures = value
            .get("failures")
            .and_then(Value::as_array)
            .map(|f| f.len())
            .unwrap_or(0);
        if failures > 0 {
            return Err(StoreError::ReindexFailures {
                from: from.to_string(),
                to: to.to_string(),
                failures,
            });
        }
        let count = |k: &str| value.get(k).and_then(Value::as_u64).unwrap_or(0);
        Ok(ReindexReport {
            total: count("total"),
            created: count("created"),
            updated: count("updated"),
        })
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StoreError> {
        let path = "/_aliases";
        let body = json!({ "actions": actions });
        let (status, value) = self.send(Method::POST, path, Some(&body)).await?;
        ensure_success(&format!("POST {}", path), status, &value)
    }

    async fn get_index_template(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let path = format!("/_index_template/{}", name);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(None);
        };
        // {"index_templates": [{"name": .., "index_template": {...}}]}
        Ok(body
            .get("index_templates")
            .and_then(Value::as_array)
            .and_then(|list| {
                list.iter()
                    .find(|t| t.get("name").and_then(Value::as_str) == Some(name))
            })
            .and_then(|t| t.get("index_template").cloned()))
    }

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), StoreError> {
        self.put(&format!("/_index_template/{}", name), body).await?;
        Ok(())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let path = format!("/_ingest/pipeline/{}", id);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(None);
        };
        Ok(body.get(id).cloned())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), StoreError> {
        self.put(&format!("/_ingest/pipeline/{}", id), body).await?;
        Ok(())
    }
}
