//! Core module containing the main functionality of Protoscope
//!
//! This module provides:
//! - Captured frame loading (candump logs, raw and hex streams)
//! - Protocol primitives (checksums, SLIP, Modbus RTU)
//! - Pattern discovery over frames and streams

pub mod analysis;
pub mod capture;
pub mod protocol;
