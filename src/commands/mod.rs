pub mod serve;

// Re-export command functions for convenience
pub use serve::{apply_overrides, load_config, race_server, ServeParams};
