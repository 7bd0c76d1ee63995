//! # Acquisition Module
//!
//! Continuous telemetry acquisition with live/demo mode switching.
//!
//! This module handles:
//! - The {Idle, Live, Demo} state machine and its control surface
//! - The single worker task running the per-cycle pipeline
//! - Cooperative cancellation and bounded stop
//! - Synthetic data generation for demo mode

pub mod demo;
pub mod service;
pub(crate) mod worker;

pub use demo::DemoGenerator;
pub use service::{AcquisitionMode, AcquisitionService};
