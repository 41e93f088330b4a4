pub mod auth;
pub mod memorize;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers and middleware the binary needs to build the router.
pub use memorize::memorize_handler;
pub use middleware::{optional_auth, require_auth};
pub use rest::ApiDoc;
