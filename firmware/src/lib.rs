#![no_std]

//! nRF52832 firmware support
//!
//! Register-level implementations of the radiosoc core traits on RTC1, the
//! CLOCK and POWER blocks and the NVIC, plus the statics shared between
//! `main` and the interrupt handlers.

// nRF52832 hardware module
pub mod nrf52832_hardware;

// Statics and interrupt handler bodies
pub mod irq;

// Unrecoverable errors
pub mod fault;

pub use nrf52832_hardware::*;
pub use irq::{Clock, Timers, HF_CRYSTAL, LONG_CLOCK, REASON_FOR_WAKE, RTC_INTERRUPT, TIMERS};

/// Firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
