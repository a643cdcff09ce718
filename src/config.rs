//! Loading the platform bootstrap bank (users + legacy courses) from TOML.
//!
//! See `PlatformConfig` for the expected schema. This is how the first admin
//! account and legacy name-owned courses enter the system.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Role;
use crate::protocol::ContentItemIn;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PlatformConfig {
  #[serde(default)]
  pub users: Vec<UserCfg>,
  #[serde(default)]
  pub courses: Vec<CourseCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserCfg {
  #[serde(default)] pub id: Option<String>,
  pub full_name: String,
  #[serde(default)] pub role: Option<Role>,
  #[serde(default)] pub enrolled_courses: Vec<String>,
}

/// Course entry accepted in TOML configuration. Bank courses are the legacy
/// form: owner recorded by display name, content as a flat list.
#[derive(Clone, Debug, Deserialize)]
pub struct CourseCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  /// Display name of the owning instructor (legacy representation).
  pub owner: String,
  #[serde(default)] pub price: Option<f64>,
  #[serde(default)] pub duration: Option<String>,
  #[serde(default)] pub published: bool,
  #[serde(default)] pub content: Vec<ContentItemIn>,
}

/// Attempt to load `PlatformConfig` from PLATFORM_CONFIG_PATH. On any
/// parsing/IO error, returns None and the stores start empty.
pub fn load_platform_config_from_env() -> Option<PlatformConfig> {
  let path = std::env::var("PLATFORM_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PlatformConfig>(&s) {
      Ok(cfg) => {
        info!(target: "learnhub_backend", %path, "Loaded platform config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "learnhub_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "learnhub_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
