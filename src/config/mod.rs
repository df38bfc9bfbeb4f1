pub mod hub;

pub use hub::{HubConfig, OracleConfig, DEFAULT_CONFIG_PATH};
