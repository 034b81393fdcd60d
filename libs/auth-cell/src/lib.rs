pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::AuthCellState;
pub use models::{AuthError, AuthPolicy, LoginRequest, LoginResponse, RequestContext};
pub use router::auth_routes;
