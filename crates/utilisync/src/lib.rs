//! # Utilisync
//!
//! User accounts and token authentication for the Utilisync billing
//! backend, served over [`utilisync_server`].
//!
//! - [`token`] - HS256 bearer tokens
//! - [`password`] - Password hashing and temporary password generation
//! - [`users`] - User model, store, service and `/users/*` routes
//! - [`probes`] - Circuit breaker probes
//! - [`app`] - Wiring from configuration to a running server
//!
//! ## Example
//!
//! ```rust,ignore
//! use utilisync::app;
//! use utilisync_config::ConfigLoader;
//! use utilisync_server::os_shutdown_signal;
//!
//! let config = ConfigLoader::new().with_defaults().with_env_prefix("UTILISYNC").load()?;
//! app::run(&config, os_shutdown_signal()).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/utilisync/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod password;
pub mod probes;
pub mod token;
pub mod users;

pub use app::{build, run, Application};
pub use token::{JwtTokens, TokenSettings};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
