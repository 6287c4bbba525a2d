//! Scanner for collections of git repositories.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use crate::types::{CollectionItem, GitStatus, ItemKind, PreservedAnnotation};

use super::{apply_preserved, file_time, FileTimeKind, Scanner};

#[derive(Debug)]
pub struct RepositoryScanner;

impl Scanner for RepositoryScanner {
    fn name(&self) -> &'static str {
        "repositories"
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["dir"]
    }

    fn default_categories(&self) -> Vec<String> {
        vec![
            "ai_llm_agents".into(),
            "terminal_ui".into(),
            "creative_aesthetic".into(),
            "dev_tools".into(),
            "esoteric_experimental".into(),
            "system_infrastructure".into(),
            "utilities_misc".into(),
        ]
    }

    fn detect(&self, root: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(root) else {
            return false;
        };
        let subdirs: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir() && !is_hidden(&e.file_name().to_string_lossy()))
            .collect();
        if subdirs.is_empty() {
            return false;
        }
        let git_repos = subdirs
            .iter()
            .filter(|e| e.path().join(".git").exists())
            .count();
        (git_repos as f64) / (subdirs.len() as f64) >= 0.5
    }

    fn scan(
        &self,
        root: &Path,
        scanner_config: &Value,
        preserve_map: &HashMap<String, PreservedAnnotation>,
    ) -> crate::error::Result<Vec<CollectionItem>> {
        let exclude_hidden = scanner_config
            .get("exclude_hidden")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut items = Vec::new();
        let entries = std::fs::read_dir(root).map_err(crate::error::ScannerError::Io)?;

        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if exclude_hidden && is_hidden(&name) {
                continue;
            }

            let metadata = entry.metadata().map_err(crate::error::ScannerError::Io)?;
            let git = check_git_status(&path);
            let size_bytes = directory_size(&path);
            let remote_url = git_output(&path, &["config", "--get", "remote.origin.url"])
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            let branch = git_output(&path, &["rev-parse", "--abbrev-ref", "HEAD"])
                .map(|s| s.trim().to_string())
                .unwrap_or_default();

            let canonical = path
                .canonicalize()
                .unwrap_or(path.clone())
                .to_string_lossy()
                .to_string();

            let mut item = CollectionItem {
                path: canonical,
                short_name: name,
                item_type: ItemKind::dir(),
                size_bytes,
                created: file_time(&metadata, FileTimeKind::Created),
                modified: file_time(&metadata, FileTimeKind::Modified),
                accessed: file_time(&metadata, FileTimeKind::Accessed),

                description: None,
                category: None,
                metadata: HashMap::from([
                    ("git_status".to_string(), json!(git.as_str())),
                    ("remote_url".to_string(), json!(remote_url)),
                    ("branch".to_string(), json!(branch)),
                ]),
            };
            apply_preserved(&mut item, preserve_map);
            items.push(item);
        }

        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(items)
    }

    fn description_prompt_template(&self) -> String {
        "Generate a one-sentence description and category for a software repository based on its README.\n\nRemote: {remote_url}\nBranch: {branch}\n\nREADME content:\n---\n{content}\n---\n\nRespond as JSON: {{\"description\": \"...\", \"category\": \"...\"}}".to_string()
    }

    fn content_for_description(&self, item: &CollectionItem) -> String {
        const CANDIDATES: &[&str] = &["README.md", "readme.md", "README", "Readme.md"];
        let root = Path::new(&item.path);
        for name in CANDIDATES {
            let readme = root.join(name);
            if let Ok(text) = std::fs::read_to_string(&readme) {
                return crate::types::truncate_graphemes(&text, 3000);
            }
        }
        String::new()
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn directory_size(path: &Path) -> u64 {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let Ok(meta) = entry.metadata() else { continue };
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }
    total
}

/// Runs `git` subprocess checks to classify a repository's sync state
/// against its remote. Network calls (`fetch`) are time-bounded.
fn check_git_status(repo_path: &Path) -> GitStatus {
    if !repo_path.join(".git").exists() {
        return GitStatus::NotARepo;
    }

    if !git_ok(repo_path, &["config", "--get", "remote.origin.url"], None) {
        return GitStatus::NoRemote;
    }

    if !git_ok(
        repo_path,
        &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        None,
    ) {
        return GitStatus::Error;
    }

    if !git_ok(repo_path, &["fetch", "--quiet"], Some(Duration::from_secs(30))) {
        warn!(repo = %repo_path.display(), "git fetch failed or timed out");
        return GitStatus::Error;
    }

    match git_output(repo_path, &["rev-list", "HEAD..@{u}", "--count"]) {
        Some(out) => match out.trim().parse::<u64>() {
            Ok(0) => GitStatus::UpToDate,
            Ok(_) => GitStatus::UpdatesAvailable,
            Err(_) => GitStatus::Error,
        },
        None => GitStatus::Error,
    }
}

fn git_ok(repo_path: &Path, args: &[&str], _timeout: Option<Duration>) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .is_ok_and(|out| out.status.success())
}

fn git_output(repo_path: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).to_string())
}
