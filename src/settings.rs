use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::serial::{OpenMode, SerialSettings, TextEncoding};

/// Open-mode presets selectable from a profile
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModePreset {
    Receive,
    Transmit,
    #[default]
    ReceiveAndTransmit,
}

impl ModePreset {
    pub fn open_mode(self) -> OpenMode {
        match self {
            ModePreset::Receive => OpenMode::receive(),
            ModePreset::Transmit => OpenMode::transmit(),
            ModePreset::ReceiveAndTransmit => OpenMode::receive_and_transmit(),
        }
    }
}

/// A saved port configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SerialProfile {
    pub port: String,
    pub mode: ModePreset,
    /// Encoding used for text sent to the port
    pub encoding: TextEncoding,
    pub settings: SerialSettings,
}

impl Default for SerialProfile {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: ModePreset::default(),
            encoding: TextEncoding::default(),
            settings: SerialSettings::default(),
        }
    }
}

fn default_port() -> String {
    if cfg!(target_os = "macos") {
        "/dev/cu.usbserial".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

/// `<config dir>/serialwire/profile.toml`
pub fn default_profile_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir().ok_or_else(|| "Failed to get config dir".to_string())?;
    Ok(config_dir.join("serialwire").join("profile.toml"))
}

/// Load a profile. A missing file yields the default profile.
pub fn load_profile(path: &Path) -> Result<SerialProfile, String> {
    if !path.exists() {
        return Ok(SerialProfile::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read profile {}: {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse profile {}: {}", path.display(), e))
}

pub fn save_profile(path: &Path, profile: &SerialProfile) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create profile directory: {}", e))?;
    }

    let content = toml::to_string_pretty(profile)
        .map_err(|e| format!("Failed to serialize profile: {}", e))?;

    std::fs::write(path, content).map_err(|e| format!("Failed to write profile: {}", e))
}
