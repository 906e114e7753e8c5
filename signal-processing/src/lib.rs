#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate logger;

pub mod buffer;
pub mod ecg;
pub mod filter;
pub mod heart_rate;
pub mod moving;
pub mod sampling;
pub mod spo2;
