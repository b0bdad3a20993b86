//! Configuration system
//!
//! Loads the YAML configuration file with sections for:
//! - Icinga2 API connection and event subscription
//! - Request Tracker connection (optional)
//! - Event cache location
//! - Ticket behaviour (permitted states, queue, "nobody" owner)
//! - Logging

mod app_config;
pub mod validation;

pub use app_config::{
    CacheSettings, Icinga2RtConfig, IcingaConfig, LoggingConfig, RtConfig, TicketConfig,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
