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

//! Thermofan - closed-loop thermal fan controller for Linux hwmon
//!
//! This library samples a temperature sensor, maps it to a fan drive level
//! through a threshold policy with hysteresis, and writes the result to a
//! PWM output and an optional power relay.

pub mod config;
pub mod controller;
pub mod hwmon;
pub mod logger;
pub mod ports;
pub mod service;

#[cfg(test)]
pub mod test_utils;
