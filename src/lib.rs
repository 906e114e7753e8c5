//! Vitals monitor for an ECG and pulse oximetry sensor.
//!
//! The sensor streams framed samples over a serial port or Bluetooth. [`pipeline::Pipeline`]
//! decodes them and estimates heart rate and SpO2, [`link`] feeds it from several transports.

pub mod config;
pub mod link;
pub mod pipeline;
