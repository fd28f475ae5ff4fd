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

//! Thermal control decision engine.
//!
//! Maps a temperature sample to a fan drive level and relay state using
//! two thresholds with a hysteresis band below the lower one. The engine
//! holds exactly one bit of state between ticks: whether the fan was
//! running after the previous decision.

use serde::{Deserialize, Serialize};

/// Threshold configuration, immutable for the lifetime of a controller.
///
/// Drive values are in the actuator's native duty-cycle units
/// (0-255 for standard Linux hwmon PWM).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Temperature at which the fan turns on at `min_drive`.
    pub on_threshold_c: f64,
    /// Temperature at which the fan reaches `max_drive`.
    pub max_threshold_c: f64,
    /// Width of the turn-off band below `on_threshold_c`.
    pub hysteresis_c: f64,
    /// Drive level at the low end of the proportional band.
    pub min_drive: f64,
    /// Drive ceiling; output never exceeds this.
    pub max_drive: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            on_threshold_c: 45.0,
            max_threshold_c: 70.0,
            hysteresis_c: 3.0,
            min_drive: 80.0,
            max_drive: 255.0,
        }
    }
}

pub fn validate_controller_config(cfg: &ControllerConfig) -> Result<(), String> {
    let fields = [
        ("on_threshold_c", cfg.on_threshold_c),
        ("max_threshold_c", cfg.max_threshold_c),
        ("hysteresis_c", cfg.hysteresis_c),
        ("min_drive", cfg.min_drive),
        ("max_drive", cfg.max_drive),
    ];
    for (name, v) in fields {
        if !v.is_finite() {
            return Err(format!("{} must be finite", name));
        }
    }
    if cfg.on_threshold_c >= cfg.max_threshold_c {
        return Err("on_threshold_c must be below max_threshold_c".into());
    }
    if cfg.hysteresis_c < 0.0 {
        return Err("hysteresis_c must not be negative".into());
    }
    if cfg.hysteresis_c > 50.0 {
        return Err("hysteresis too large (max 50)".into());
    }
    if cfg.min_drive < 0.0 {
        return Err("min_drive must not be negative".into());
    }
    if cfg.min_drive > cfg.max_drive {
        return Err("min_drive > max_drive".into());
    }
    if cfg.max_drive > 255.0 {
        return Err("max_drive out of range (max 255)".into());
    }
    Ok(())
}

/// The single piece of memory carried between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerState {
    pub fan_active: bool,
}

/// Output of one control decision. Produced fresh each tick;
/// the caller applies it and discards it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub drive: f64,
    pub relay_on: bool,
}

impl DriveCommand {
    pub const OFF: DriveCommand = DriveCommand { drive: 0.0, relay_on: false };
}

#[derive(Debug, Clone)]
pub struct ThermalController {
    config: ControllerConfig,
    state: ControllerState,
}

impl ThermalController {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config, state: ControllerState::default() }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn fan_active(&self) -> bool {
        self.state.fan_active
    }

    /// Forget the hysteresis history, as if freshly constructed.
    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }

    /// Compute the drive command for one temperature sample.
    ///
    /// Four bands, evaluated highest first:
    /// at or above `max_threshold_c` the fan runs flat out; between the
    /// thresholds the drive interpolates linearly from `min_drive` to
    /// `max_drive`; below the hysteresis band everything is off; inside
    /// the hysteresis band the previous on/off decision is held (at
    /// `min_drive` when on) so the fan does not chatter around the
    /// threshold.
    ///
    /// Deterministic given the sample and the current `fan_active` flag.
    /// A non-finite sample falls into the hold band and leaves the prior
    /// state untouched; the sensor layer is expected to filter those out.
    pub fn update(&mut self, temp_c: f64) -> DriveCommand {
        let cfg = self.config;

        let command = if temp_c >= cfg.max_threshold_c {
            self.state.fan_active = true;
            DriveCommand { drive: cfg.max_drive, relay_on: true }
        } else if temp_c >= cfg.on_threshold_c {
            let ratio = (temp_c - cfg.on_threshold_c) / (cfg.max_threshold_c - cfg.on_threshold_c);
            let drive = cfg.min_drive + (cfg.max_drive - cfg.min_drive) * ratio;
            self.state.fan_active = true;
            DriveCommand { drive, relay_on: true }
        } else if temp_c < cfg.on_threshold_c - cfg.hysteresis_c {
            self.state.fan_active = false;
            DriveCommand::OFF
        } else if self.state.fan_active {
            // Hold band: keep spinning at the floor until temperature
            // drops out the bottom of the band.
            DriveCommand { drive: cfg.min_drive, relay_on: true }
        } else {
            DriveCommand::OFF
        };

        DriveCommand {
            drive: command.drive.clamp(0.0, cfg.max_drive),
            relay_on: command.relay_on,
        }
    }
}
