// ─── Java Locator ───
// Finds the Java binary used to run loader installers.

use std::path::{Path, PathBuf};

use tracing::debug;

fn java_exe() -> &'static str {
    if cfg!(target_os = "windows") {
        "java.exe"
    } else {
        "java"
    }
}

fn locate_java_binary(runtime_root: &Path) -> Option<PathBuf> {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return Some(primary);
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    mac_layout.exists().then_some(mac_layout)
}

/// Explicit path, then `JAVA_HOME`, then whatever `java` the PATH yields.
pub fn resolve_java_binary(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        if let Some(java) = locate_java_binary(Path::new(&home)) {
            debug!("Using Java from JAVA_HOME: {:?}", java);
            return java;
        }
    }

    PathBuf::from(java_exe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/opt/jdk/bin/java");
        assert_eq!(resolve_java_binary(Some(&explicit)), explicit);
    }

    #[test]
    fn finds_bin_layout_under_runtime_root() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(java_exe()), b"").unwrap();

        assert_eq!(locate_java_binary(dir.path()), Some(bin.join(java_exe())));
    }
}
