//! Sensor Monitor - alert lifecycle and consistency service for sensor fleets
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod model;
pub mod monitor;
pub mod persistence;
pub mod query;
pub mod routes;
pub mod services;
pub mod store;
