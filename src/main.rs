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

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use thermofan::config::{self, DaemonConfig};
use thermofan::hwmon::{self, HwmonSensor, PwmDrive};
use thermofan::logger;
use thermofan::service::{ControlService, LogStatusSink};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Controlling pwmN_enable and writing PWM values needs root.
    let skip_root_check = args.iter().any(|a| a == "--no-root-check");
    if !skip_root_check && unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: thermofan requires root privileges to drive fans.");
        eprintln!(
            "Please run with: sudo {}",
            args.first().cloned().unwrap_or_else(|| "thermofan".to_string())
        );
        std::process::exit(1);
    }

    // Optional logging to /etc/thermofan/logs.json
    let logging_enabled = args.iter().any(|a| a == "--logging");
    if logging_enabled {
        logger::init_logging();
        logger::log_event("startup", serde_json::json!({ "args": args }));
    }

    let config_override = arg_value(&args, "--config").map(PathBuf::from);
    let cfg = load_config(config_override.as_deref())?;

    // `thermofan save` persists the validated config to the system path,
    // so a user-edited config survives as /etc/thermofan/config.json.
    if args.get(1).map(|s| s.as_str()) == Some("save") {
        config::write_system_config(&cfg).context("write system config")?;
        println!("Wrote config to {}", config::system_config_path().display());
        return Ok(());
    }

    // `thermofan --check` validates the config and resolves hardware paths,
    // then exits without touching any output.
    if args.iter().any(|a| a == "--check") {
        let sensor = open_sensor(&cfg)?;
        println!("sensor:  {}", sensor.input_path().display());
        let drive = open_drive(&cfg)?;
        println!("pwm:     {}", drive.pwm_path().display());
        match &cfg.relay_path {
            Some(p) => println!("relay:   {}", p.display()),
            None => println!("relay:   (none)"),
        }
        println!("config OK");
        return Ok(());
    }

    let sensor = open_sensor(&cfg)?;
    let drive = open_drive(&cfg)?;
    eprintln!("thermofan: starting control loop");
    if logging_enabled {
        logger::log_event("service_start", serde_json::json!({}));
    }

    let mut service = ControlService::new(&cfg, sensor, drive, LogStatusSink);
    let res = service.run();
    if let Err(err) = &res {
        eprintln!("error: {err}");
        if logging_enabled {
            logger::log_event("fatal_error", serde_json::json!({ "error": err.to_string() }));
        }
        std::process::exit(1);
    }
    res
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn load_config(path: Option<&Path>) -> Result<DaemonConfig> {
    match path {
        Some(p) => config::load_config_from(p)
            .map_err(|e| anyhow!("config {}: {}", p.display(), e)),
        None => config::load_saved_config().map_err(|e| anyhow!("config: {}", e)),
    }
}

fn open_sensor(cfg: &DaemonConfig) -> Result<HwmonSensor> {
    HwmonSensor::open(
        Path::new(hwmon::HWMON_ROOT),
        &cfg.sensor.chip,
        cfg.sensor.temp_idx,
        cfg.sensor_min_c,
        cfg.sensor_max_c,
    )
    .with_context(|| format!("open sensor {} temp{}", cfg.sensor.chip, cfg.sensor.temp_idx))
}

fn open_drive(cfg: &DaemonConfig) -> Result<PwmDrive> {
    PwmDrive::open(
        Path::new(hwmon::HWMON_ROOT),
        &cfg.pwm.chip,
        cfg.pwm.pwm_idx,
        cfg.relay_path.clone(),
    )
    .with_context(|| format!("open pwm {} pwm{}", cfg.pwm.chip, cfg.pwm.pwm_idx))
}
