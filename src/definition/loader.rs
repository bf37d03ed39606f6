use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::SetupConfig;
use crate::definition::fingerprint::fingerprint;
use crate::error::DefinitionError;

/// 逻辑索引的期望形态（别名 + mappings + settings）
#[derive(Clone, Debug)]
pub struct IndexDefinition {
    pub alias: String,
    pub path: PathBuf,
    pub mappings: Value,
    pub settings: Value,
    fingerprint: String,
}

/// 日志子系统的 index-template / ingest pipeline 定义（整体 body）
#[derive(Clone, Debug)]
pub struct ArtifactDefinition {
    pub name: String,
    pub path: PathBuf,
    pub body: Value,
}

/// 加载结果槽位：失败时保留错误，该项永久处于“未就绪”状态
#[derive(Clone, Debug)]
pub struct Slot<T> {
    pub name: String,
    pub definition: Result<T, Arc<DefinitionError>>,
}

impl<T> Slot<T> {
    pub fn ok(name: impl Into<String>, definition: T) -> Self {
        Self {
            name: name.into(),
            definition: Ok(definition),
        }
    }

    pub fn broken(name: impl Into<String>, error: DefinitionError) -> Self {
        Self {
            name: name.into(),
            definition: Err(Arc::new(error)),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.definition.as_ref().err().map(|e| e.to_string())
    }
}

/// 启动时加载的全部定义；进程生命周期内不变（无热加载）
#[derive(Clone, Debug)]
pub struct Definitions {
    pub indices: Vec<Slot<IndexDefinition>>,
    pub log_template: Slot<ArtifactDefinition>,
    pub log_pipeline: Slot<ArtifactDefinition>,
}

impl IndexDefinition {
    pub fn new(alias: impl Into<String>, mappings: Value, settings: Value) -> Self {
        let fingerprint = fingerprint(&mappings, &settings);
        Self {
            alias: alias.into(),
            path: PathBuf::new(),
            mappings,
            settings,
            fingerprint,
        }
    }

    /// 解析 `{"mappings": {...}, "settings": {...}}`，两个键均可省略
    pub fn from_value(alias: &str, path: &Path, value: Value) -> Result<Self, DefinitionError> {
        let shape = |reason: String| DefinitionError::Shape {
            path: path.to_path_buf(),
            reason,
        };
        let Value::Object(mut obj) = value else {
            return Err(shape("top level must be an object".to_string()));
        };
        let mappings = take_object(&mut obj, "mappings").map_err(shape)?;
        let settings = take_object(&mut obj, "settings").map_err(shape)?;
        if let Some(extra) = obj.keys().next() {
            return Err(shape(format!("unexpected top-level key {:?}", extra)));
        }

        let mut def = Self::new(alias, mappings, settings);
        def.path = path.to_path_buf();
        Ok(def)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// `alias-<fingerprint>`
    pub fn candidate_name(&self) -> String {
        format!("{}-{}", self.alias, self.fingerprint)
    }

    /// 第 n 个候选名：0 为原始名，之后追加递增后缀
    pub fn candidate(&self, attempt: usize) -> String {
        if attempt == 0 {
            self.candidate_name()
        } else {
            format!("{}-{}", self.candidate_name(), attempt)
        }
    }

    /// create-index 请求体
    pub fn create_body(&self) -> Value {
        serde_json::json!({
            "mappings": self.mappings,
            "settings": self.settings,
        })
    }
}

fn take_object(obj: &mut Map<String, Value>, key: &str) -> Result<Value, String> {
    match obj.remove(key) {
        None => Ok(Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => Ok(v),
        Some(_) => Err(format!("\"{}\" must be an object", key)),
    }
}

fn read_json(path: &Path) -> Result<Value, DefinitionError> {
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DefinitionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_index(alias: &str, path: &Path) -> Result<IndexDefinition, DefinitionError> {
    let value = read_json(path)?;
    IndexDefinition::from_value(alias, path, value)
}

pub fn load_artifact(name: &str, path: &Path) -> Result<ArtifactDefinition, DefinitionError> {
    let body = read_json(path)?;
    if !body.is_object() {
        return Err(DefinitionError::Shape {
            path: path.to_path_buf(),
            reason: "top level must be an object".to_string(),
        });
    }
    Ok(ArtifactDefinition {
        name: name.to_string(),
        path: path.to_path_buf(),
        body,
    })
}

impl Definitions {
    /// 读取 setup 目录下的所有定义。单个文件失败不会中断其余加载，
    /// 失败项以错误槽位保留，使该项永远无法报告就绪。
    pub fn load(cfg: &SetupConfig) -> Self {
        let indices = cfg
            .indices
            .iter()
            .map(|entry| {
                let path = cfg.resolve(&entry.file);
                match load_index(&entry.alias, &path) {
                    Ok(def) => {
                        tracing::info!(
                            "Loaded definition for {} from {:?} (fingerprint {})",
                            entry.alias,
                            path,
                            def.fingerprint()
                        );
                        Slot::ok(&entry.alias, def)
                    }
                    Err(e) => {
                        tracing::error!("Definition for {} unusable: {}", entry.alias, e);
                        Slot::broken(&entry.alias, e)
                    }
                }
            })
            .collect();

        let log_template = artifact_slot(
            &cfg.log_template.name,
            &cfg.resolve(&cfg.log_template.file),
        );
        let log_pipeline = artifact_slot(
            &cfg.log_pipeline.id,
            &cfg.resolve(&cfg.log_pipeline.file),
        );

        Self {
            indices,
            log_template,
            log_pipeline,
        }
    }

    /// 第一个加载错误（CLI 用于非零退出）
    pub fn first_error(&self) -> Option<String> {
        self.indices
            .iter()
            .filter_map(|s| s.error_message().map(|e| format!("{}: {}", s.name, e)))
            .chain(
                [&self.log_template, &self.log_pipeline]
                    .into_iter()
                    .filter_map(|s| s.error_message().map(|e| format!("{}: {}", s.name, e))),
            )
            .next()
    }
}

fn artifact_slot(name: &str, path: &Path) -> Slot<ArtifactDefinition> {
    match load_artifact(name, path) {
        Ok(def) => Slot::ok(name, def),
        Err(e) => {
            tracing::error!("Definition for {} unusable: {}", name, e);
            Slot::broken(name, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("blog-store-{}-{}", tag, nanos))
    }

    #[test]
    fn candidate_names_are_alias_prefixed() {
        let def = IndexDefinition::new("blog-posts", json!({}), json!({}));
        let base = def.candidate_name();
        assert!(base.starts_with("blog-posts-"));
        assert_eq!(def.candidate(0), base);
        assert_eq!(def.candidate(3), format!("{}-3", base));
    }

    #[test]
    fn missing_sections_default_to_empty_objects() {
        let def =
            IndexDefinition::from_value("blog-posts", Path::new("x.json"), json!({})).unwrap();
        assert_eq!(def.mappings, json!({}));
        assert_eq!(def.settings, json!({}));
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let err = IndexDefinition::from_value(
            "blog-posts",
            Path::new("x.json"),
            json!({"mappings": {}, "aliases": {}}),
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::Shape { .. }));
    }

    #[test]
    fn rejects_non_object_mappings() {
        let err = IndexDefinition::from_value(
            "blog-posts",
            Path::new("x.json"),
            json!({"mappings": []}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("mappings"));
    }

    #[test]
    fn load_keeps_broken_slots_alongside_good_ones() {
        let dir = unique_tmp_dir("defs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("blog-posts.json"),
            r#"{"mappings":{"properties":{"title":{"type":"text"}}}}"#,
        )
        .unwrap();
        std::fs::write(dir.join("blog-comments.json"), "{not json").unwrap();
        std::fs::write(dir.join("logs-template.json"), r#"{"index_patterns":["logs-*"]}"#)
            .unwrap();
        // logs-pipeline.json 缺失

        let mut cfg = Config::default().setup;
        cfg.dir = dir.clone();
        let defs = Definitions::load(&cfg);

        assert!(defs.indices[0].definition.is_ok());
        assert!(matches!(
            defs.indices[1].definition.as_ref().map_err(|e| &**e),
            Err(DefinitionError::Parse { .. })
        ));
        assert!(defs.log_template.definition.is_ok());
        assert!(matches!(
            defs.log_pipeline.definition.as_ref().map_err(|e| &**e),
            Err(DefinitionError::Read { .. })
        ));
        assert!(defs.first_error().unwrap().starts_with("blog-comments"));
    }
}
