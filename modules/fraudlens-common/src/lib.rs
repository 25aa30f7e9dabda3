pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::FraudLensError;
pub use types::*;

use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env-filter, defaulting fraudlens crates to info.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("fraudlens=info".parse().expect("static directive"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
