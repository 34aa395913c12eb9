//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

use assetforged_common::{Error, Result};

/// ImageMagick 7 entry point.
pub const MAGICK: &str = "magick";
/// ImageMagick 6 entry point.
pub const CONVERT: &str = "convert";

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Check if a tool is available using a custom version argument.
pub fn check_tool_with_arg(name: &str, version_arg: &str) -> ToolInfo {
    let result = Command::new(name).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(name).ok(),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check every tool a transform backend can use.
pub fn check_tools() -> Vec<ToolInfo> {
    vec![
        check_tool_with_arg(MAGICK, "-version"),
        check_tool_with_arg(CONVERT, "-version"),
    ]
}

/// Locate ImageMagick, preferring a configured path over PATH lookup.
///
/// `magick` is preferred over the legacy `convert` entry point.
pub fn find_imagemagick(config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!("Configured tool path {:?} does not exist, searching PATH", path);
    }

    which::which(MAGICK)
        .or_else(|_| which::which(CONVERT))
        .map_err(|_| Error::configuration("ImageMagick not found (tried magick, convert)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool_with_arg("nonexistent_tool_12345", "-version");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
    }

    #[test]
    fn test_configured_path_preferred() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let found = find_imagemagick(Some(file.path())).unwrap();
        assert_eq!(found, file.path());
    }
}
