pub mod alerts;
pub mod locations;
pub mod readings;
pub mod sensors;
