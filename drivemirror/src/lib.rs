pub mod config;
pub mod credentials;
pub mod logging;
pub mod sync;
