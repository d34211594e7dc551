//! Script template loading and parameter interpolation.
//!
//! Templates are plain `.py` files with `{UPPER_SNAKE}` placeholders that
//! always sit inside a Python double-quoted (or triple-quoted) string literal.
//! [`interpolate`] escapes every value for that context, so a value can never
//! terminate the literal it is placed in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::RwLock;

use crate::error::CoreError;

/// File extension of script templates.
pub const TEMPLATE_EXTENSION: &str = ".py";

/// Regex pattern matching `{PLACEHOLDER}` tokens in script templates.
pub const PLACEHOLDER_PATTERN: &str = r"\{([A-Z][A-Z0-9_]*)\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Separator placed between composed script fragments.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Loads templates from one directory and caches them for its lifetime.
#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Template text for `name`; `.py` is appended when missing.
    pub async fn get(&self, name: &str) -> Result<Arc<str>, CoreError> {
        let file_name = template_file_name(name);
        if let Some(text) = self.cache.read().await.get(&file_name) {
            return Ok(Arc::clone(text));
        }

        let path = self.dir.join(&file_name);
        let text: Arc<str> = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::Template {
                name: file_name.clone(),
                message: e.to_string(),
            })?
            .into();
        tracing::debug!(template = %file_name, bytes = text.len(), "Loaded script template");

        let mut cache = self.cache.write().await;
        let entry = cache.entry(file_name).or_insert(text);
        Ok(Arc::clone(entry))
    }

    /// Load every `.py` file in the directory into the cache.
    ///
    /// Returns the number of templates now cached.
    pub async fn preload(&self) -> Result<usize, CoreError> {
        let dir_error = |e: std::io::Error| CoreError::Template {
            name: self.dir.display().to_string(),
            message: e.to_string(),
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(dir_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMPLATE_EXTENSION) {
                self.get(&name).await?;
            }
        }
        let count = self.cache.read().await.len();
        tracing::info!(dir = %self.dir.display(), count, "Preloaded script templates");
        Ok(count)
    }

    /// Load and join several templates in order.
    pub async fn compose(&self, names: &[&str]) -> Result<String, CoreError> {
        let mut parts = Vec::with_capacity(names.len());
        for name in names {
            parts.push(self.get(name).await?);
        }
        Ok(combine(parts.iter().map(|p| p.as_ref())))
    }
}

fn template_file_name(name: &str) -> String {
    if name.ends_with(TEMPLATE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{TEMPLATE_EXTENSION}")
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Escape `value` for the body of a Python `"..."` or `"""..."""` literal.
pub fn escape_python_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Replace each `{KEY}` whose key appears in `params` with the escaped value.
///
/// Substitution is a single pass, so placeholders inside values are never
/// expanded. Unknown placeholders are left untouched.
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match params.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => escape_python_string(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Placeholder names still present in `script`, in order of first use.
pub fn unresolved_placeholders(script: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(script) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Join fragments with a blank line between them.
pub fn combine<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts.into_iter().collect::<Vec<_>>().join(FRAGMENT_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::BUNDLED_SCRIPTS_DIR;

    #[test]
    fn interpolate_escapes_backslashes_and_quotes() {
        let out = interpolate(
            "PATH = \"{PROJECT_FILE_PATH}\"",
            &[("PROJECT_FILE_PATH", "C:\\Projects\\My \"PLC\".project")],
        );
        assert_eq!(out, "PATH = \"C:\\\\Projects\\\\My \\\"PLC\\\".project\"");
    }

    #[test]
    fn interpolate_replaces_every_occurrence() {
        let out = interpolate("{A} and {A} but {B}", &[("A", "x")]);
        assert_eq!(out, "x and x but {B}");
    }

    #[test]
    fn values_are_not_expanded_twice() {
        let out = interpolate("{A}|{B}", &[("A", "{B}"), ("B", "y")]);
        assert_eq!(out, "{B}|y");
    }

    #[test]
    fn newlines_in_values_become_escapes() {
        assert_eq!(escape_python_string("a\r\nb"), "a\\r\\nb");
    }

    #[test]
    fn python_format_braces_are_not_placeholders() {
        let script = "guid = \" {%s}\" % obj.guid\nname = \"{POU_NAME}\"";
        assert_eq!(unresolved_placeholders(script), vec!["POU_NAME".to_string()]);
    }

    #[test]
    fn combine_uses_blank_line() {
        assert_eq!(combine(["a", "b", "c"]), "a\n\nb\n\nc");
    }

    #[tokio::test]
    async fn get_appends_extension_and_caches() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("hello.py");
        std::fs::write(&path, "print(\"{NAME}\")").expect("write");

        let store = TemplateStore::new(dir.path());
        let first = store.get("hello").await.expect("load");
        std::fs::remove_file(&path).expect("remove");
        let second = store.get("hello.py").await.expect("cached");

        assert_eq!(&*first, "print(\"{NAME}\")");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn missing_template_names_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = TemplateStore::new(dir.path());
        let err = store.get("absent").await.expect_err("missing");
        assert_matches!(err, CoreError::Template { ref name, .. } if name == "absent.py");
    }

    #[tokio::test]
    async fn preload_reads_only_python_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("a.py"), "a").expect("write");
        std::fs::write(dir.path().join("b.py"), "b").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");

        let store = TemplateStore::new(dir.path());
        assert_eq!(store.preload().await.expect("preload"), 2);
    }

    #[tokio::test]
    async fn bundled_templates_have_no_stub_helpers() {
        let store = TemplateStore::new(BUNDLED_SCRIPTS_DIR);
        store.preload().await.expect("preload bundled");
        for name in [
            "open_project",
            "save_project",
            "create_pou",
            "set_pou_code",
            "create_property",
            "create_method",
            "compile_project",
            "get_project_structure",
            "get_pou_code",
        ] {
            let text = store.get(name).await.expect("template");
            assert!(
                !text.contains("def ensure_project_open"),
                "{name} redefines the prelude helper"
            );
            assert!(
                !text.contains("def find_object_by_path_robust"),
                "{name} redefines the lookup helper"
            );
        }
    }
}
