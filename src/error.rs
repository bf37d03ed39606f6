use std::path::PathBuf;

/// 存储引擎（Elasticsearch）调用错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("index {0} not found")]
    IndexNotFound(String),

    #[error("reindex {from} -> {to} reported {failures} failure(s)")]
    ReindexFailures {
        from: String,
        to: String,
        failures: usize,
    },
}

/// 定义文件加载错误（启动期，不可恢复）
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("cannot read definition {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in definition {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("definition {path:?}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid alias name {0:?}: expected lowercase letters, digits, '-' or '_'")]
    AliasName(String),

    #[error("alias {0:?} is configured more than once")]
    DuplicateAlias(String),
}

/// 单个逻辑索引迁移失败（在 setup 内部记录日志后吞掉，不向调用方传播）
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("definition unavailable: {0}")]
    Definition(String),

    #[error("no usable physical index name for alias {alias} after {tried} candidates")]
    CandidatesExhausted { alias: String, tried: usize },

    #[error("index {index} was created but its mapping does not match the definition")]
    CreatedMismatch { index: String },
}
