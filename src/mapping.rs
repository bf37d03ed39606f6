use serde_json::{Map, Value};

/// 结构化 mapping 比较：desired 中定义的每个字段/选项都必须以相同的值出现在 actual 中。
///
/// 规则：
/// - 对象：逐键比较 desired 的键；actual 多出的键（引擎注入的元数据等）忽略。
///   desired 中的空对象视为未定义任何内容，actual 缺失该键也算匹配。
/// - 数组：长度相同且逐元素匹配（顺序敏感）。
/// - 标量：值相等；另外接受字符串与其字面量形式相等（ES 会把 `"false"` 规范化为 `false`）。
pub fn mappings_equal(desired: &Value, actual: &Value) -> bool {
    match (desired, actual) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, dv)| match have.get(k) {
            Some(av) => mappings_equal(dv, av),
            None => is_empty_object(dv),
        }),
        (Value::Object(want), _) => want.is_empty(),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(d, a)| mappings_equal(d, a))
        }
        (Value::Array(_), _) => false,
        (d, a) => scalar_eq(d, a),
    }
}

/// index template 比较：`template.settings` 先按引擎的存储形式规范化再比较，其余部分同 [`mappings_equal`]。
///
/// ES 读回模板时把 settings 改写为 `{"index": {...}}` 嵌套形式、标量存为字符串，
/// 因此 `{"number_of_shards": 1}` 与 `{"index": {"number_of_shards": "1"}}` 视为相同。
pub fn templates_equal(desired: &Value, actual: &Value) -> bool {
    mappings_equal(&normalize_template(desired), &normalize_template(actual))
}

fn normalize_template(body: &Value) -> Value {
    let mut body = body.clone();
    if let Some(settings) = body.pointer_mut("/template/settings") {
        *settings = Value::Object(flatten_settings(settings));
    }
    body
}

/// settings 展平为 `index.` 前缀的点分键，标量统一为字符串
pub fn flatten_settings(settings: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into("", settings, &mut flat);
    flat.into_iter()
        .map(|(k, v)| {
            if k.starts_with("index.") {
                (k, v)
            } else {
                (format!("index.{}", k), v)
            }
        })
        .collect()
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_into(&key, v, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), stringify(leaf));
        }
    }
}

fn stringify(v: &Value) -> Value {
    match v {
        Value::Bool(_) | Value::Number(_) => Value::String(v.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(stringify).collect()),
        other => other.clone(),
    }
}

fn is_empty_object(v: &Value) -> bool {
    matches!(v, Value::Object(m) if m.is_empty())
}

fn scalar_eq(d: &Value, a: &Value) -> bool {
    if d == a {
        return true;
    }
    match (d, a) {
        (Value::String(s), Value::Bool(_) | Value::Number(_))
        | (Value::Bool(_) | Value::Number(_), Value::String(s)) => {
            let other = if d.is_string() { a } else { d };
            *s == other.to_string()
        }
        _ => false,
    }
}
