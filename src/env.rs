//! Server environment metadata that is not part of the request itself.

use std::path::{Path, PathBuf};

/// Server-side facts about where and how a request is being served.
///
/// Always passed in explicitly: readers never consult process globals.
#[derive(Clone, Debug, Default)]
pub struct ServerEnv {
    script_filename: Option<PathBuf>,
    document_root: Option<PathBuf>,
    server_name: Option<String>,
    server_port: Option<u16>,
}

impl ServerEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// The environment of the running binary: its executable is the script.
    pub fn current_process() -> Self {
        Self {
            script_filename: std::env::current_exe().ok(),
            ..Self::default()
        }
    }

    pub fn script_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_filename = Some(path.into());
        self
    }

    pub fn document_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_root = Some(path.into());
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.server_name.as_deref().filter(|n| !n.is_empty())
    }

    pub(crate) fn port(&self) -> Option<u16> {
        self.server_port
    }

    /// Absolute script path: absolute as given, else under the document root,
    /// else against the working directory.
    pub(crate) fn script_path(&self) -> Option<PathBuf> {
        let script = self.script_filename.as_deref().filter(|p| !p.as_os_str().is_empty())?;
        if script.is_absolute() {
            return Some(script.to_path_buf());
        }
        match &self.document_root {
            Some(root) if root.is_absolute() => Some(root.join(script)),
            _ => std::path::absolute(script).ok(),
        }
    }
}

/// `(full, base)` strings for a resolved script path, empty when unknown.
pub(crate) fn script_strings(path: Option<&Path>) -> (String, String) {
    let Some(path) = path else {
        return (String::new(), String::new());
    };
    let full = path.to_string_lossy().into_owned();
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (full, base)
}
