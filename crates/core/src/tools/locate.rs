//! Locate the `Standard.project` template a new project is copied from.

use std::path::{Path, PathBuf};

pub const STANDARD_TEMPLATE_FILE: &str = "Standard.project";

const DEFAULT_PROGRAM_DATA: &str = "C:\\ProgramData";

/// Shared application-data directory, from `ALLUSERSPROFILE` or `ProgramData`.
pub fn program_data_dir(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    ["ALLUSERSPROFILE", "ProgramData"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM_DATA))
}

/// Candidate template locations in search order.
///
/// The install layout is `<root>/CODESYS/Common/CODESYS.exe`, so the first
/// candidate is `<root>/CODESYS/Templates`.
pub fn template_candidates(executable: &Path, profile: &str, program_data: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(base) = executable.parent().and_then(Path::parent) {
        candidates.push(base.join("Templates").join(STANDARD_TEMPLATE_FILE));
    }
    candidates.push(
        program_data
            .join("CODESYS")
            .join("CODESYS")
            .join(profile)
            .join("Templates")
            .join(STANDARD_TEMPLATE_FILE),
    );
    candidates.push(
        program_data
            .join("CODESYS")
            .join("Templates")
            .join(STANDARD_TEMPLATE_FILE),
    );
    candidates
}

/// First candidate that exists as a file.
pub async fn find_standard_template(
    executable: &Path,
    profile: &str,
    program_data: &Path,
) -> Option<PathBuf> {
    for candidate in template_candidates(executable, profile, program_data) {
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {
                tracing::debug!(template = %candidate.display(), "Found project template");
                return Some(candidate);
            }
            _ => tracing::debug!(candidate = %candidate.display(), "No project template here"),
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_data_prefers_allusersprofile() {
        let dir = program_data_dir(|k| match k {
            "ALLUSERSPROFILE" => Some("D:\\Shared".into()),
            "ProgramData" => Some("E:\\Data".into()),
            _ => None,
        });
        assert_eq!(dir, PathBuf::from("D:\\Shared"));
        assert_eq!(program_data_dir(|_| None), PathBuf::from(DEFAULT_PROGRAM_DATA));
    }

    #[test]
    fn candidates_follow_search_order() {
        let exe = Path::new("/opt/CODESYS 3.5/CODESYS/Common/CODESYS.exe");
        let pd = Path::new("/pd");
        let list = template_candidates(exe, "CODESYS V3.5 SP21", pd);
        assert_eq!(
            list,
            vec![
                PathBuf::from("/opt/CODESYS 3.5/CODESYS/Templates/Standard.project"),
                PathBuf::from("/pd/CODESYS/CODESYS/CODESYS V3.5 SP21/Templates/Standard.project"),
                PathBuf::from("/pd/CODESYS/Templates/Standard.project"),
            ]
        );
    }

    #[tokio::test]
    async fn falls_back_to_program_data() {
        let root = tempfile::tempdir().expect("temp dir");
        let exe = root.path().join("CODESYS").join("Common").join("CODESYS.exe");
        let pd = root.path().join("pd");
        let fallback = pd.join("CODESYS").join("Templates");
        std::fs::create_dir_all(&fallback).expect("mkdir");
        std::fs::write(fallback.join(STANDARD_TEMPLATE_FILE), b"tpl").expect("write");

        let found = find_standard_template(&exe, "P", &pd).await;
        assert_eq!(found, Some(fallback.join(STANDARD_TEMPLATE_FILE)));
    }

    #[tokio::test]
    async fn none_when_nothing_exists() {
        let root = tempfile::tempdir().expect("temp dir");
        let exe = root.path().join("CODESYS").join("Common").join("CODESYS.exe");
        assert_eq!(find_standard_template(&exe, "P", root.path()).await, None);
    }
}
