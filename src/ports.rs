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

//! Seams between the control loop and its hardware collaborators.

use crate::hwmon::HwmonError;

/// Calibrated temperature input, one sample per tick.
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSensor {
    fn read_temp_c(&mut self) -> Result<f64, HwmonError>;
}

/// Proportional fan drive plus the auxiliary power relay.
#[cfg_attr(test, mockall::automock)]
pub trait DriveOutput {
    /// Apply a drive level in native duty-cycle units (0-255 scale).
    fn set_drive(&mut self, drive: f64) -> Result<(), HwmonError>;

    fn set_relay(&mut self, on: bool) -> Result<(), HwmonError>;
}

/// Per-tick status reporting. Implementations must swallow their own
/// failures; the control loop ignores this port's outcome entirely.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink {
    fn report(&mut self, temp_c: f64, fan_active: bool, drive: f64);
}

/// Sink that discards every report.
#[derive(Debug, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn report(&mut self, _temp_c: f64, _fan_active: bool, _drive: f64) {}
}
