//! External tool detection and encoder selection.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Software H.264 encoder available in every ffmpeg build we support.
pub const SOFTWARE_ENCODER: &str = "libx264";

/// Hardware encoder on Apple silicon.
pub const VIDEOTOOLBOX_ENCODER: &str = "h264_videotoolbox";

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// ffmpeg and ffprobe take `-version` rather than `--version`.
///
/// # Example
///
/// ```no_run
/// use vidforge_av::check_tool;
///
/// let info = check_tool("ffprobe");
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str) -> ToolInfo {
    let result = Command::new(name).arg("-version").output();

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

/// Check both tools the pipeline depends on.
pub fn check_tools() -> Vec<ToolInfo> {
    vec![check_tool("ffmpeg"), check_tool("ffprobe")]
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if the tool is not on `PATH`.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    require_tool(name)
}

/// How the video encoder is picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderPreference {
    /// Hardware encoder when the platform has one, otherwise software.
    Auto,
    /// Always the software encoder.
    Software,
    /// A specific ffmpeg encoder name.
    Named(String),
}

impl EncoderPreference {
    /// Parse the `hw_accel` configuration value.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Self::Auto,
            "none" | "off" | "software" => Self::Software,
            _ => Self::Named(value.trim().to_string()),
        }
    }
}

/// Whether this host is Apple silicon, where VideoToolbox is available.
pub const fn is_apple_silicon() -> bool {
    cfg!(all(target_os = "macos", target_arch = "aarch64"))
}

/// Pick an encoder given the preference and the output of
/// `ffmpeg -hide_banner -encoders`.
pub fn choose_encoder(preference: &EncoderPreference, encoders: &str, apple_silicon: bool) -> String {
    let listed = |name: &str| {
        encoders
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(name))
    };

    match preference {
        EncoderPreference::Named(name) => name.clone(),
        EncoderPreference::Software => SOFTWARE_ENCODER.to_string(),
        EncoderPreference::Auto if apple_silicon && listed(VIDEOTOOLBOX_ENCODER) => {
            VIDEOTOOLBOX_ENCODER.to_string()
        }
        EncoderPreference::Auto => SOFTWARE_ENCODER.to_string(),
    }
}

/// Resolve the encoder ffmpeg at `ffmpeg` should use.
///
/// Failing to list encoders is not fatal; the software encoder is assumed.
pub fn select_encoder(ffmpeg: &Path, preference: &EncoderPreference) -> String {
    let encoders = match preference {
        EncoderPreference::Auto if is_apple_silicon() => Command::new(ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    };

    choose_encoder(preference, &encoders, is_apple_silicon())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "Encoders:\n \
        V....D libx264              libx264 H.264 / AVC\n \
        V....D h264_videotoolbox    VideoToolbox H.264 Encoder\n";

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool("nonexistent_tool_12345");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
    }

    #[test]
    fn test_require_tool_not_found() {
        assert!(matches!(
            require_tool("nonexistent_tool_12345"),
            Err(Error::ToolNotFound { .. })
        ));
    }

    #[test]
    fn test_preference_from_config() {
        assert_eq!(EncoderPreference::from_config("auto"), EncoderPreference::Auto);
        assert_eq!(EncoderPreference::from_config(""), EncoderPreference::Auto);
        assert_eq!(EncoderPreference::from_config("None"), EncoderPreference::Software);
        assert_eq!(
            EncoderPreference::from_config("h264_nvenc"),
            EncoderPreference::Named("h264_nvenc".into())
        );
    }

    #[test]
    fn test_auto_prefers_videotoolbox_on_apple_silicon() {
        assert_eq!(
            choose_encoder(&EncoderPreference::Auto, ENCODERS, true),
            VIDEOTOOLBOX_ENCODER
        );
        assert_eq!(
            choose_encoder(&EncoderPreference::Auto, ENCODERS, false),
            SOFTWARE_ENCODER
        );
    }

    #[test]
    fn test_auto_falls_back_when_not_listed() {
        let only_software = " V....D libx264  libx264 H.264\n";
        assert_eq!(
            choose_encoder(&EncoderPreference::Auto, only_software, true),
            SOFTWARE_ENCODER
        );
    }

    #[test]
    fn test_explicit_choices_win() {
        assert_eq!(
            choose_encoder(&EncoderPreference::Software, ENCODERS, true),
            SOFTWARE_ENCODER
        );
        assert_eq!(
            choose_encoder(&EncoderPreference::Named("h264_qsv".into()), "", false),
            "h264_qsv"
        );
    }
}
