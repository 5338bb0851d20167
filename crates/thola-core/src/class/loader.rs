// Class file sources: the compiled-in set, or a directory on disk.
//
// Paths are relative to the class root and use `/`. `generic.yaml` is the
// root class; `generic/<a>.yaml` is class `a`, `generic/<a>/<b>.yaml` is
// class `a/b` with parent `a`.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct ClassSource {
    pub path: String,
    pub contents: String,
}

impl ClassSource {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Class name derived from the path, or `None` for non-class files.
    pub fn class_name(&self) -> Option<String> {
        let stem = self
            .path
            .strip_suffix(".yaml")
            .or_else(|| self.path.strip_suffix(".yml"))?;
        if stem == "generic" {
            return Some("generic".to_owned());
        }
        stem.strip_prefix("generic/")
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned)
    }
}

macro_rules! builtin_class {
    ($path:literal) => {
        ($path, include_str!(concat!("../../device-classes/", $path)))
    };
}

const BUILTIN: [(&str, &str); 10] = [
    builtin_class!("generic.yaml"),
    builtin_class!("generic/acme-packet.yaml"),
    builtin_class!("generic/apc.yaml"),
    builtin_class!("generic/ceraos.yaml"),
    builtin_class!("generic/cisco.yaml"),
    builtin_class!("generic/cisco/ios.yaml"),
    builtin_class!("generic/ironport.yaml"),
    builtin_class!("generic/juniper.yaml"),
    builtin_class!("generic/net-snmp.yaml"),
    builtin_class!("generic/net-snmp/linux.yaml"),
];

/// The device classes shipped with the engine.
pub fn builtin() -> Vec<ClassSource> {
    BUILTIN
        .iter()
        .map(|(path, contents)| ClassSource::new(*path, *contents))
        .collect()
}

/// Read every `.yaml`/`.yml` file below `root`.
pub async fn load_dir(root: &Path) -> Result<Vec<ClassSource>, CoreError> {
    let mut sources = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let io = |path: &Path, e: std::io::Error| {
        CoreError::config(format!("cannot read class directory {}: {e}", path.display()))
    };

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io(&dir, e))? {
            let path = entry.path();
            let kind = entry.file_type().await.map_err(|e| io(&path, e))?;
            if kind.is_dir() {
                pending.push(path);
                continue;
            }
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if !is_yaml {
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .map_err(|_| CoreError::Internal(format!("{} escaped {}", path.display(), root.display())))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io(&path, e))?;
            sources.push(ClassSource::new(relative, contents));
        }
    }
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}
