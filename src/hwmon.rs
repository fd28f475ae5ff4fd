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

//! Linux hwmon collaborators: the temperature input and the PWM/relay
//! outputs the control loop talks to through the port traits.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

use crate::logger;
use crate::ports::{DriveOutput, TemperatureSensor};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Raw duty-cycle ceiling for standard hwmon PWM files.
pub const PWM_RAW_MAX: f64 = 255.0;

#[derive(Debug, Error)]
pub enum HwmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Permission denied - need root")]
    PermissionDenied,
}

fn read_trimmed<P: AsRef<Path>>(path: P) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

/// Resolve the sysfs directory for a chip selector of the form
/// "name@hwmonX" or plain "name". The tag wins when both are given;
/// a plain name matches the first chip whose `name` file agrees.
pub fn resolve_chip_dir(root: &Path, chip_selector: &str) -> Option<PathBuf> {
    let (want_name, tag_opt) = match chip_selector.split_once('@') {
        Some((n, tag)) => (n, Some(tag)),
        None => (chip_selector, None),
    };

    let entries = fs::read_dir(root).ok()?;
    let mut by_name: Option<PathBuf> = None;
    for ent in entries.flatten() {
        let dir = ent.path();
        if !dir.is_dir() {
            continue;
        }
        let file_tag = dir.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(tag) = tag_opt {
            if file_tag == tag {
                return Some(dir);
            }
        }
        if by_name.is_none() {
            if let Ok(name) = read_trimmed(dir.join("name")) {
                if name == want_name {
                    by_name = Some(dir);
                }
            }
        }
    }
    if tag_opt.is_some() {
        // An explicit tag that resolves nowhere is a miss, not a fallback
        return None;
    }
    by_name
}

/// Temperature input collaborator. Converts millidegree sysfs readings to
/// Celsius, clamps them to the configured sane range, and papers over
/// transient garbage with the last valid sample.
#[derive(Debug)]
pub struct HwmonSensor {
    input_path: PathBuf,
    min_c: f64,
    max_c: f64,
    last_valid_c: Option<f64>,
}

impl HwmonSensor {
    pub fn open(
        root: &Path,
        chip_selector: &str,
        temp_idx: usize,
        min_c: f64,
        max_c: f64,
    ) -> Result<Self, HwmonError> {
        let dir = resolve_chip_dir(root, chip_selector).ok_or_else(|| {
            HwmonError::InvalidData(format!("Chip {} not found", chip_selector))
        })?;
        let input_path = dir.join(format!("temp{}_input", temp_idx));
        if !input_path.exists() {
            return Err(HwmonError::InvalidData(format!(
                "Sensor {}:temp{} not found",
                chip_selector, temp_idx
            )));
        }
        Ok(Self { input_path, min_c, max_c, last_valid_c: None })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    fn read_raw_c(&self) -> Result<f64, HwmonError> {
        let raw = read_trimmed(&self.input_path)?;
        let milli: f64 = raw
            .parse()
            .map_err(|_| HwmonError::Parse(format!("bad temperature value '{}'", raw)))?;
        Ok(milli / 1000.0)
    }

    fn fall_back(&self, reason: &str, err: HwmonError) -> Result<f64, HwmonError> {
        match self.last_valid_c {
            Some(last) => {
                logger::log_event(
                    "sensor_fault",
                    json!({
                        "path": self.input_path.display().to_string(),
                        "reason": reason,
                        "held_c": last,
                    }),
                );
                Ok(last)
            }
            None => Err(err),
        }
    }
}

impl TemperatureSensor for HwmonSensor {
    fn read_temp_c(&mut self) -> Result<f64, HwmonError> {
        match self.read_raw_c() {
            Ok(c) if c.is_finite() => {
                let c = c.clamp(self.min_c, self.max_c);
                self.last_valid_c = Some(c);
                Ok(c)
            }
            Ok(c) => self.fall_back(
                "non-finite reading",
                HwmonError::Parse(format!("non-finite temperature {}", c)),
            ),
            Err(e @ HwmonError::Parse(_)) => self.fall_back("unparsable reading", e),
            Err(e) => Err(e),
        }
    }
}

/// PWM + relay output collaborator.
///
/// Drive values arrive in native 0-255 units and are rounded only here,
/// at the hardware boundary. Writing forces `pwmN_enable` to manual mode
/// first and honors `pwmN_max` scaling when the chip exposes one.
#[derive(Debug)]
pub struct PwmDrive {
    pwm_path: PathBuf,
    enable_path: PathBuf,
    pwm_max_path: PathBuf,
    relay_path: Option<PathBuf>,
}

impl PwmDrive {
    pub fn open(
        root: &Path,
        chip_selector: &str,
        pwm_idx: usize,
        relay_path: Option<PathBuf>,
    ) -> Result<Self, HwmonError> {
        let dir = resolve_chip_dir(root, chip_selector).ok_or_else(|| {
            HwmonError::InvalidData(format!("Chip {} not found", chip_selector))
        })?;
        let pwm_path = dir.join(format!("pwm{}", pwm_idx));
        if !pwm_path.exists() {
            return Err(HwmonError::InvalidData(format!(
                "PWM {}:pwm{} not found",
                chip_selector, pwm_idx
            )));
        }
        if let Err(e) = OpenOptions::new().write(true).open(&pwm_path) {
            if e.kind() == io::ErrorKind::PermissionDenied {
                return Err(HwmonError::PermissionDenied);
            }
            return Err(e.into());
        }
        Ok(Self {
            enable_path: dir.join(format!("pwm{}_enable", pwm_idx)),
            pwm_max_path: dir.join(format!("pwm{}_max", pwm_idx)),
            pwm_path,
            relay_path,
        })
    }

    pub fn pwm_path(&self) -> &Path {
        &self.pwm_path
    }
}

impl DriveOutput for PwmDrive {
    fn set_drive(&mut self, drive: f64) -> Result<(), HwmonError> {
        let raw = drive.round().clamp(0.0, PWM_RAW_MAX) as u64;

        // Manual mode (1) first, or the chip keeps overriding our writes
        let mut manual_forced = false;
        if self.enable_path.exists() {
            fs::write(&self.enable_path, "1")?;
            manual_forced = true;
        }

        let write_val = if self.pwm_max_path.exists() {
            match read_trimmed(&self.pwm_max_path)?.parse::<u64>() {
                // Real chips report 16-bit resolutions at most; anything
                // beyond that is garbage and would wrap the product
                Ok(maxv) if maxv > 0 && maxv <= 65_535 => {
                    (raw * maxv / PWM_RAW_MAX as u64).to_string()
                }
                _ => raw.to_string(),
            }
        } else {
            raw.to_string()
        };
        fs::write(&self.pwm_path, &write_val)?;

        logger::log_event(
            "pwm_write",
            json!({
                "path": self.pwm_path.display().to_string(),
                "requested": drive,
                "written": write_val,
                "manual_forced": manual_forced,
            }),
        );
        Ok(())
    }

    fn set_relay(&mut self, on: bool) -> Result<(), HwmonError> {
        let Some(path) = &self.relay_path else {
            // No relay wired on this platform
            return Ok(());
        };
        fs::write(path, if on { "1" } else { "0" })?;
        logger::log_event(
            "relay_write",
            json!({
                "path": path.display().to_string(),
                "on": on,
            }),
        );
        Ok(())
    }
}
