//! Prompt inventory tools: `prompts` and `get_prompt`
//!
//! Prompts are plain `.md`/`.txt` files in the configured folder. A missing
//! folder is an empty inventory, not an error.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub name: String,
    pub summary: String,
}

pub struct PromptService {
    folder: Option<PathBuf>,
}

impl PromptService {
    pub fn new(folder: Option<String>) -> Self {
        Self {
            folder: folder.map(PathBuf::from),
        }
    }

    /// List available prompts with their first-line summaries
    pub fn list(&self) -> Vec<PromptInfo> {
        let Some(folder) = &self.folder else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(folder) else {
            return Vec::new();
        };

        let mut prompts: Vec<PromptInfo> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let extension = path.extension()?.to_str()?;
                if extension != "md" && extension != "txt" {
                    return None;
                }
                let name = path.file_stem()?.to_str()?.to_string();
                let summary = first_line_summary(&path);
                Some(PromptInfo { name, summary })
            })
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    /// Load a prompt by name with `{{variable}}` substitution from the
    /// argument map
    pub fn get(&self, name: &str, args: &Value) -> Result<String, String> {
        let folder = self
            .folder
            .as_ref()
            .ok_or_else(|| "No prompts folder configured".to_string())?;

        let path = ["md", "txt"]
            .iter()
            .map(|ext| folder.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| format!("Prompt not found: {name}"))?;

        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read prompt '{name}': {e}"))?;

        Ok(substitute_variables(&content, args))
    }
}

fn first_line_summary(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| {
            content
                .lines()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .map(String::from)
        })
        .unwrap_or_default()
}

fn substitute_variables(content: &str, args: &Value) -> String {
    let Some(map) = args.as_object() else {
        return content.to_string();
    };
    let mut out = content.to_string();
    for (key, value) in map {
        let placeholder = format!("{{{{{key}}}}}");
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&placeholder, &replacement);
    }
    out
}
