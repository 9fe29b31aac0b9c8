use std::path::{Path, PathBuf};

/// One watched spoke directory (§4.6): a named root, enabled or not.
/// The daemon's config layer constructs these from `spokes.*`; the
/// watcher only needs the name, the path, and whether to watch it.
#[derive(Debug, Clone)]
pub struct SpokeDir {
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
}

/// Whether a path looks like a transcript file worth watching (§4.6).
/// Left pluggable: a daemon embedding a different transcript format
/// only needs to supply a different predicate.
pub trait PathRecognizer: Send + Sync {
    fn is_transcript_path(&self, path: &Path) -> bool;
}

/// Default recognizer: JSONL files under a `sessions` directory,
/// matching the wire format `brain-core` parses.
pub struct JsonlSessionRecognizer;

impl PathRecognizer for JsonlSessionRecognizer {
    fn is_transcript_path(&self, path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some("jsonl")
    }
}

/// The `computer` tag for an observed path (§4.6): the name of the
/// enabled spoke directory the path falls under, path-boundary
/// checked so a sibling directory with a shared prefix never matches
/// (`/x/laptop` must not match `/x/laptop-backup`), else the local
/// hostname.
pub fn computer_for_path(path: &Path, spokes: &[SpokeDir], local_hostname: &str) -> String {
    for spoke in spokes.iter().filter(|s| s.enabled) {
        if path.starts_with(&spoke.path) {
            return spoke.name.clone();
        }
    }
    local_hostname.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_jsonl_only() {
        let r = JsonlSessionRecognizer;
        assert!(r.is_transcript_path(Path::new("/hub/sessions/abc.jsonl")));
        assert!(!r.is_transcript_path(Path::new("/hub/sessions/abc.json")));
        assert!(!r.is_transcript_path(Path::new("/hub/sessions/abc")));
    }

    #[test]
    fn spoke_match_is_path_boundary_checked() {
        let spokes = vec![SpokeDir {
            name: "laptop".to_string(),
            path: PathBuf::from("/x/laptop"),
            enabled: true,
        }];
        assert_eq!(
            computer_for_path(Path::new("/x/laptop/sessions/a.jsonl"), &spokes, "hub"),
            "laptop"
        );
        assert_eq!(
            computer_for_path(Path::new("/x/laptop-backup/sessions/a.jsonl"), &spokes, "hub"),
            "hub"
        );
    }

    #[test]
    fn disabled_spoke_is_ignored() {
        let spokes = vec![SpokeDir {
            name: "laptop".to_string(),
            path: PathBuf::from("/x/laptop"),
            enabled: false,
        }];
        assert_eq!(
            computer_for_path(Path::new("/x/laptop/sessions/a.jsonl"), &spokes, "hub"),
            "hub"
        );
    }

    #[test]
    fn falls_back_to_local_hostname() {
        let spokes: Vec<SpokeDir> = Vec::new();
        assert_eq!(computer_for_path(Path::new("/hub/sessions/a.jsonl"), &spokes, "hub"), "hub");
    }
}
