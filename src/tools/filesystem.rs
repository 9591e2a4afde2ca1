//! 沙箱文件系统工具
//!
//! SafeFs 绑定工作区根目录。读取与列目录要求路径 canonicalize 后仍在根下；
//! 写入时目标可能尚不存在，改为词法校验（拒绝绝对路径与 `..`），再检查已存在的父目录没有经符号链接逃逸。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::Tool;

/// 单次读取返回的最大字符数
const MAX_READ_CHARS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析已存在的路径，必须落在根目录下
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let rel = path.trim().trim_start_matches("./");
        let canonical = self
            .root_dir
            .join(rel)
            .canonicalize()
            .map_err(|_| AgentError::ToolExecutionFailed(format!("Path not found: {rel}")))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(AgentError::PathEscape(rel.to_string()))
        }
    }

    /// 解析写入目标：只允许普通相对路径分量
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, AgentError> {
        let rel = Path::new(path.trim());
        if rel.as_os_str().is_empty() {
            return Err(AgentError::ToolExecutionFailed("Empty path".into()));
        }
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AgentError::PathEscape(path.to_string()));
        }
        let full = self.root_dir.join(rel);
        // 已存在的最近祖先必须仍在根下（防止经符号链接目录写出去）
        let mut ancestor = full.parent();
        while let Some(dir) = ancestor {
            if let Ok(canon) = dir.canonicalize() {
                if !canon.starts_with(&self.root_dir) {
                    return Err(AgentError::PathEscape(path.to_string()));
                }
                break;
            }
            ancestor = dir.parent();
        }
        Ok(full)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {e}")))?;
        if content.chars().count() > MAX_READ_CHARS {
            let head: String = content.chars().take(MAX_READ_CHARS).collect();
            return Ok(format!("{head}\n...[truncated]"));
        }
        Ok(content)
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let base = if path.trim().is_empty() || path.trim() == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut dir = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("List failed: {e}")))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();
        Ok(entries)
    }

    /// 写入文件（覆盖），按需创建父目录；返回写入字节数
    pub async fn write_file(&self, path: &str, content: &str) -> Result<usize, AgentError> {
        let target = self.resolve_for_write(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::ToolExecutionFailed(format!("Create dir failed: {e}")))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {e}")))?;
        Ok(content.len())
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// cat：读取文件
pub struct CatTool {
    fs: SafeFs,
}

impl CatTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for CatTool {
    fn name(&self) -> &str {
        "cat"
    }

    fn description(&self) -> &str {
        "Read file contents. Args: {\"path\": \"file path relative to workspace\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "path").unwrap_or("");
        self.fs.read_file(path).await.map_err(|e| e.to_string())
    }
}

/// ls：列目录
pub struct LsTool {
    fs: SafeFs,
}

impl LsTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List directory. Args: {\"path\": \"directory path, default '.'\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "path").unwrap_or(".");
        let entries = self.fs.list_dir(path).await.map_err(|e| e.to_string())?;
        if entries.is_empty() {
            return Ok("(empty directory)".into());
        }
        Ok(entries.join("\n"))
    }
}

/// write_file：在工作区内创建或覆盖文件
pub struct WriteFileTool {
    fs: SafeFs,
}

impl WriteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file in the workspace. Args: {\"path\": \"relative path\", \"content\": \"file content\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "path").ok_or("Missing 'path'")?;
        let content = str_arg(&args, "content").ok_or("Missing 'content'")?;
        let n = self
            .fs
            .write_file(path, content)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Wrote {n} bytes to {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_read_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());
        let write = WriteFileTool::new(fs.clone());
        let out = write
            .execute(json!({"path": "src/lib.rs", "content": "pub fn a() {}"}))
            .await
            .unwrap();
        assert!(out.contains("13 bytes"));

        let cat = CatTool::new(fs.clone());
        assert_eq!(
            cat.execute(json!({"path": "src/lib.rs"})).await.unwrap(),
            "pub fn a() {}"
        );
        let ls = LsTool::new(fs);
        assert_eq!(ls.execute(json!({})).await.unwrap(), "src/");
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ws")).unwrap();
        let fs = SafeFs::new(dir.path().join("ws"));
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();

        assert!(matches!(
            fs.resolve("../secret.txt"),
            Err(AgentError::PathEscape(_))
        ));
        assert!(matches!(
            fs.resolve_for_write("../evil.txt"),
            Err(AgentError::PathEscape(_))
        ));
        assert!(matches!(
            fs.resolve_for_write("/etc/passwd"),
            Err(AgentError::PathEscape(_))
        ));
        assert!(fs.write_file("a/../../b", "x").await.is_err());
    }
}
