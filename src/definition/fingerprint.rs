use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

/// 规范化序列化：对象键递归排序、紧凑输出。
///
/// 源文件的缩进、换行、键顺序不影响结果；任何语义变化（值、数组顺序、增删键）都会改变结果。
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out.into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_json_string(k, out);
                out.push(':');
                write_canonical(&map[k.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => push_json_string(s, out),
        // null / bool / number：serde_json 的输出本身就是确定的
        other => out.push_str(&other.to_string()),
    }
}

fn push_json_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// 定义指纹：mappings + settings 规范化字节的 xxh3-64，16 位十六进制
pub fn fingerprint(mappings: &Value, settings: &Value) -> String {
    let mut bytes = canonical_bytes(mappings);
    // 分隔符不会出现在紧凑 JSON 的顶层边界上，避免 mappings/settings 拼接歧义
    bytes.push(b'\n');
    bytes.extend_from_slice(&canonical_bytes(settings));
    format!("{:016x}", xxh3_64(&bytes))
}
