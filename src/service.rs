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

//! Control loop: one sensor sample per tick through the controller and out
//! to the PWM and relay, with write suppression and a failsafe for
//! persistently failing sensors.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::DaemonConfig;
use crate::controller::{DriveCommand, ThermalController};
use crate::logger::log_event;
use crate::ports::{DriveOutput, StatusSink, TemperatureSensor};

/// Consecutive sensor failures tolerated before the failsafe drive is applied.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Status sink that appends one JSON line per tick via the global logger.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn report(&mut self, temp_c: f64, fan_active: bool, drive: f64) {
        log_event(
            "tick",
            json!({
                "temp_c": temp_c,
                "fan_active": fan_active,
                "drive": drive,
            }),
        );
    }
}

pub struct ControlService<S, O, K>
where
    S: TemperatureSensor,
    O: DriveOutput,
    K: StatusSink,
{
    controller: ThermalController,
    sensor: S,
    output: O,
    sink: K,
    poll_interval: Duration,
    write_min_delta: f64,
    failsafe_drive: f64,
    consecutive_errors: u32,
    last_written: Option<DriveCommand>,
}

impl<S, O, K> ControlService<S, O, K>
where
    S: TemperatureSensor,
    O: DriveOutput,
    K: StatusSink,
{
    pub fn new(cfg: &DaemonConfig, sensor: S, output: O, sink: K) -> Self {
        Self {
            controller: ThermalController::new(cfg.controller.clone()),
            sensor,
            output,
            sink,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            write_min_delta: cfg.write_min_delta,
            failsafe_drive: cfg.failsafe_drive(),
            consecutive_errors: 0,
            last_written: None,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_written(&self) -> Option<&DriveCommand> {
        self.last_written.as_ref()
    }

    /// One control step: sample, decide, actuate, report.
    pub fn tick(&mut self) -> Result<()> {
        let temp_c = match self.sensor.read_temp_c() {
            Ok(t) => {
                self.consecutive_errors = 0;
                t
            }
            Err(e) => {
                self.consecutive_errors += 1;
                log_event(
                    "sensor_error",
                    json!({
                        "error": e.to_string(),
                        "consecutive": self.consecutive_errors,
                    }),
                );
                if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return self.apply_failsafe();
                }
                // Hold the last output until the failsafe threshold is hit.
                return Ok(());
            }
        };

        let command = self.controller.update(temp_c);
        self.apply(&command).context("apply drive command")?;
        self.sink
            .report(temp_c, self.controller.fan_active(), command.drive);
        Ok(())
    }

    /// Sensor is gone: run the fan at the configured failsafe level so the
    /// load stays cooled regardless of what the controller last decided.
    fn apply_failsafe(&mut self) -> Result<()> {
        log_event(
            "failsafe",
            json!({ "drive": self.failsafe_drive, "consecutive": self.consecutive_errors }),
        );
        let command = DriveCommand {
            drive: self.failsafe_drive,
            relay_on: true,
        };
        self.force_apply(&command).context("apply failsafe drive")
    }

    /// Write the command to hardware, skipping writes that would change the
    /// drive by less than `write_min_delta`. Relay transitions and on/off
    /// edges always go through.
    fn apply(&mut self, command: &DriveCommand) -> Result<()> {
        let must_write = match &self.last_written {
            None => true,
            Some(prev) => {
                prev.relay_on != command.relay_on
                    || (prev.drive == 0.0) != (command.drive == 0.0)
                    || (command.drive - prev.drive).abs() >= self.write_min_delta
            }
        };
        if !must_write {
            return Ok(());
        }
        self.force_apply(command)
    }

    fn force_apply(&mut self, command: &DriveCommand) -> Result<()> {
        // Relay first when powering on so the fan has supply before PWM ramps,
        // and last when powering off.
        if command.relay_on {
            self.output.set_relay(true)?;
            self.output.set_drive(command.drive)?;
        } else {
            self.output.set_drive(command.drive)?;
            self.output.set_relay(false)?;
        }
        self.last_written = Some(command.clone());
        Ok(())
    }

    /// Blocking loop, one tick per poll interval. Hardware errors end the
    /// loop; sensor errors are absorbed by the failsafe policy in `tick`.
    pub fn run(&mut self) -> Result<()> {
        let mut last: Option<Instant> = None;
        loop {
            let now = Instant::now();
            if !tick_due(last, now, self.poll_interval) {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            last = Some(now);
            self.tick()?;
        }
    }
}

/// `None` means no tick has run yet, which is always due. Keeping this
/// off `Instant` arithmetic matters near boot, where the monotonic clock
/// can be younger than the poll interval.
fn tick_due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        Some(prev) => now.duration_since(prev) >= interval,
    }
}
