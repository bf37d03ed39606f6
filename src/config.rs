use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

/// 进程级配置：启动时构造一次，显式传给各组件
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub elasticsearch: ElasticsearchConfig,
    pub setup: SetupConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupConfig {
    /// 定义文件目录（相对路径以进程工作目录为基准）
    pub dir: PathBuf,
    pub indices: Vec<IndexEntry>,
    pub log_template: TemplateEntry,
    pub log_pipeline: PipelineEntry,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexEntry {
    pub alias: String,
    pub file: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateEntry {
    pub name: String,
    pub file: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineEntry {
    pub id: String,
    pub file: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./_setup"),
            indices: vec![
                IndexEntry {
                    alias: "blog-posts".to_string(),
                    file: PathBuf::from("blog-posts.json"),
                },
                IndexEntry {
                    alias: "blog-comments".to_string(),
                    file: PathBuf::from("blog-comments.json"),
                },
            ],
            log_template: TemplateEntry {
                name: "blog-logs".to_string(),
                file: PathBuf::from("logs-template.json"),
            },
            log_pipeline: PipelineEntry {
                id: "blog-logs".to_string(),
                file: PathBuf::from("logs-pipeline.json"),
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elasticsearch: ElasticsearchConfig::default(),
            setup: SetupConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ElasticsearchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl SetupConfig {
    /// 定义文件的完整路径
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.dir.join(file)
        }
    }
}

impl Config {
    /// 从 TOML 文件加载；未出现的字段取默认值
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// 别名即 ES 索引名的前缀，必须满足 ES 命名规则
    pub fn validate(&self) -> Result<(), ConfigError> {
        let re = Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").expect("static regex");
        let mut seen = std::collections::HashSet::new();
        for entry in &self.setup.indices {
            if !re.is_match(&entry.alias) {
                return Err(ConfigError::AliasName(entry.alias.clone()));
            }
            if !seen.insert(entry.alias.as_str()) {
                return Err(ConfigError::DuplicateAlias(entry.alias.clone()));
            }
        }
        Ok(())
    }
}
