//! Script discovery and introspection for `GET /server/script/list` and
//! `GET /server/script/analyze`. Scripts are standalone binaries built by
//! the harness, so their declared-argument metadata isn't recoverable by
//! reflection the way a decorator-based script can report on itself; each
//! script ships a small sidecar manifest (`<name>.manifest.json`) written
//! at build time, and this module just reads it back.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptManifest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn manifest_path(scripts_dir: &Path, script_name: &str) -> PathBuf {
    scripts_dir.join(format!("{script_name}.manifest.json"))
}

/// Lists every script with a manifest in `scripts_dir`, sorted by name.
pub fn list_scripts(scripts_dir: &Path) -> Vec<ScriptManifest> {
    let mut manifests = Vec::new();
    let Ok(entries) = std::fs::read_dir(scripts_dir) else {
        return manifests;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(text) = std::fs::read_to_string(&path) {
            if let Ok(manifest) = serde_json::from_str::<ScriptManifest>(&text) {
                manifests.push(manifest);
            }
        }
    }
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    manifests
}

/// Reads one script's manifest by name, `None` if it has no manifest.
pub fn analyze_script(scripts_dir: &Path, script_name: &str) -> Option<ScriptManifest> {
    let text = std::fs::read_to_string(manifest_path(scripts_dir, script_name)).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, manifest: &ScriptManifest) {
        std::fs::write(
            manifest_path(dir, &manifest.name),
            serde_json::to_string(manifest).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn lists_manifests_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            &ScriptManifest {
                name: "zebra".into(),
                description: "z".into(),
                args: vec![],
            },
        );
        write_manifest(
            dir.path(),
            &ScriptManifest {
                name: "apple".into(),
                description: "a".into(),
                args: vec!["--dns:str:google.com".into()],
            },
        );
        let scripts = list_scripts(dir.path());
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].name, "apple");
        assert_eq!(scripts[1].name, "zebra");
    }

    #[test]
    fn analyze_missing_script_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(analyze_script(dir.path(), "nope").is_none());
    }

    #[test]
    fn analyze_returns_declared_args() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            &ScriptManifest {
                name: "goto_live".into(),
                description: "Navigate to live".into(),
                args: vec!["userinterface_name:str:horizon_android_mobile".into()],
            },
        );
        let manifest = analyze_script(dir.path(), "goto_live").unwrap();
        assert_eq!(manifest.args.len(), 1);
    }
}
