//! 密钥 / 环境文件加载
//!
//! 读取 KEY=VALUE 格式的 env 文件：跳过空行与 # 注释，去掉成对引号，已存在的环境变量不覆盖；
//! 加载完成后对本次写入的值做 `${VAR}` / `${VAR:-default}` 展开。

use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("valid env var pattern")
    })
}

/// 用 lookup 展开 `${VAR}` 与 `${VAR:-default}`；变量缺失且无默认值时替换为空串
pub fn expand_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var_pattern()
        .replace_all(text, |caps: &Captures| {
            let key = &caps[1];
            lookup(key)
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// 按当前进程环境展开
pub fn expand_vars(text: &str) -> String {
    expand_with(text, |k| std::env::var(k).ok())
}

/// 解析一行 KEY=VALUE；注释、空行、无等号的行返回 None
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim().trim_start_matches("export ").trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    };
    Some((key.to_string(), unquoted.to_string()))
}

/// 依次加载 env 文件（不存在的文件跳过），返回新写入的变量名
pub fn load_env_files<P: AsRef<Path>>(paths: &[P]) -> Vec<String> {
    let mut loaded = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let Ok(data) = std::fs::read_to_string(path) else {
            tracing::debug!(path = %path.display(), "env file not found, skipped");
            continue;
        };
        for (key, value) in data.lines().filter_map(parse_env_line) {
            if std::env::var_os(&key).is_some() {
                continue;
            }
            std::env::set_var(&key, &value);
            loaded.push(key);
        }
        tracing::info!(path = %path.display(), "env file loaded");
    }

    for key in &loaded {
        if let Ok(value) = std::env::var(key) {
            if value.contains("${") {
                std::env::set_var(key, expand_vars(&value));
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_env_line() {
        assert_eq!(
            parse_env_line("API_KEY=\"abc\""),
            Some(("API_KEY".into(), "abc".into()))
        );
        assert_eq!(
            parse_env_line("export URL='http://x'"),
            Some(("URL".into(), "http://x".into()))
        );
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("NOEQUALS"), None);
    }

    #[test]
    fn test_expand_with_defaults() {
        let env: HashMap<&str, &str> = [("HOST", "db.local")].into_iter().collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());
        assert_eq!(
            expand_with("postgres://${HOST}:${PORT:-5432}/x", lookup),
            "postgres://db.local:5432/x"
        );
        assert_eq!(expand_with("${MISSING}", |_| None), "");
    }

    #[test]
    fn test_load_env_files_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.env");
        std::fs::write(
            &path,
            "HIVE_TEST_SECRET_A=one\nHIVE_TEST_SECRET_B=${HIVE_TEST_SECRET_A}-two\n",
        )
        .unwrap();
        std::env::set_var("HIVE_TEST_SECRET_PRESET", "kept");
        std::fs::write(
            dir.path().join("other.env"),
            "HIVE_TEST_SECRET_PRESET=replaced\n",
        )
        .unwrap();

        let loaded = load_env_files(&[path, dir.path().join("other.env"), dir.path().join("missing.env")]);
        assert!(loaded.contains(&"HIVE_TEST_SECRET_A".to_string()));
        assert_eq!(std::env::var("HIVE_TEST_SECRET_B").unwrap(), "one-two");
        assert_eq!(std::env::var("HIVE_TEST_SECRET_PRESET").unwrap(), "kept");
    }
}
