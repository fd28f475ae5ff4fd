/*
 * This file is part of Thermofan.
 *
 * Copyright (C) 2025 Thermofan contributors
 *
 * Thermofan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Thermofan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Thermofan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controller::{validate_controller_config, ControllerConfig};

/// Temperature source: hwmon chip selector ("name" or "name@hwmonX")
/// plus the tempN index on that chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSpec {
    pub chip: String,
    pub temp_idx: usize,
}

/// Fan output: chip selector plus the pwmN index on that chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PwmSpec {
    pub chip: String,
    pub pwm_idx: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    pub controller: ControllerConfig,
    pub sensor: SensorSpec,
    pub pwm: PwmSpec,
    /// Optional sysfs value file gating power to the fan (e.g. a GPIO value
    /// path). Absent means no relay is wired.
    #[serde(default)]
    pub relay_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Sane-range clamp applied to every sample before control.
    #[serde(default = "default_sensor_min_c")]
    pub sensor_min_c: f64,
    #[serde(default = "default_sensor_max_c")]
    pub sensor_max_c: f64,
    /// Drive applied after repeated sensor failures. Defaults to half of
    /// `max_drive` when absent.
    #[serde(default)]
    pub failsafe_drive: Option<f64>,
    /// Minimum drive change (native units) worth a hardware write.
    #[serde(default = "default_write_min_delta")]
    pub write_min_delta: f64,
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_sensor_min_c() -> f64 { -20.0 }
fn default_sensor_max_c() -> f64 { 120.0 }
fn default_write_min_delta() -> f64 { 2.0 }

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            sensor: SensorSpec { chip: "coretemp".into(), temp_idx: 1 },
            pwm: PwmSpec { chip: "nct6775".into(), pwm_idx: 1 },
            relay_path: None,
            poll_interval_ms: default_poll_interval_ms(),
            sensor_min_c: default_sensor_min_c(),
            sensor_max_c: default_sensor_max_c(),
            failsafe_drive: None,
            write_min_delta: default_write_min_delta(),
        }
    }
}

impl DaemonConfig {
    /// Effective failsafe drive level for this config.
    pub fn failsafe_drive(&self) -> f64 {
        self.failsafe_drive
            .unwrap_or(self.controller.max_drive * 0.5)
            .clamp(0.0, self.controller.max_drive)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("thermofan").join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("thermofan")
            .join("config.json");
    }
    PathBuf::from("/etc/thermofan/config.json")
}

pub fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/thermofan/config.json")
}

pub fn load_config_from(path: &Path) -> Result<DaemonConfig, String> {
    let data = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let cfg: DaemonConfig = serde_json::from_str(&data).map_err(|e| format!("parse error: {}", e))?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// User config if present, otherwise the system config.
pub fn load_saved_config() -> Result<DaemonConfig, String> {
    let user = config_path();
    if user.exists() {
        return load_config_from(&user);
    }
    load_config_from(&system_config_path())
}

pub fn write_config_to(path: &Path, cfg: &DaemonConfig) -> io::Result<()> {
    validate_config(cfg).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cfg).unwrap_or_else(|_| "{}".to_string());
    fs::write(path, json)?;
    // Best-effort set permissions to 0644
    let perms = fs::Permissions::from_mode(0o644);
    let _ = fs::set_permissions(path, perms);
    Ok(())
}

pub fn write_system_config(cfg: &DaemonConfig) -> io::Result<()> {
    write_config_to(&system_config_path(), cfg)
}

fn is_safe_label(s: &str) -> bool {
    if s.is_empty() || s.len() > 128 {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.' | '@'))
}

pub fn validate_config(cfg: &DaemonConfig) -> Result<(), String> {
    validate_controller_config(&cfg.controller)?;

    if !is_safe_label(&cfg.sensor.chip) {
        return Err("invalid sensor chip selector".into());
    }
    if !is_safe_label(&cfg.pwm.chip) {
        return Err("invalid pwm chip selector".into());
    }
    if cfg.sensor.temp_idx == 0 || cfg.sensor.temp_idx > 32 {
        return Err("sensor temp_idx out of range (1..32)".into());
    }
    if cfg.pwm.pwm_idx == 0 || cfg.pwm.pwm_idx > 32 {
        return Err("pwm_idx out of range (1..32)".into());
    }
    if cfg.poll_interval_ms < 50 {
        return Err("poll_interval_ms too small (min 50)".into());
    }
    if cfg.poll_interval_ms > 600_000 {
        return Err("poll_interval_ms too large".into());
    }
    if !(cfg.sensor_min_c.is_finite() && cfg.sensor_max_c.is_finite()) {
        return Err("sensor range must be finite".into());
    }
    if cfg.sensor_min_c >= cfg.sensor_max_c {
        return Err("sensor_min_c must be below sensor_max_c".into());
    }
    if let Some(fs_drive) = cfg.failsafe_drive {
        if !fs_drive.is_finite() || fs_drive < 0.0 || fs_drive > cfg.controller.max_drive {
            return Err("failsafe_drive out of range".into());
        }
    }
    if !cfg.write_min_delta.is_finite() || cfg.write_min_delta < 0.0 || cfg.write_min_delta > 64.0 {
        return Err("write_min_delta out of range (0..64)".into());
    }
    Ok(())
}
