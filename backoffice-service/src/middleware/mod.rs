pub mod auth;
pub mod metrics;

pub use auth::{AuthClaims, Claims, CurrentUser};
pub use metrics::metrics_middleware;
