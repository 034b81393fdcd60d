pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::ProviderCellState;
pub use models::{Provider, RegisterProviderRequest};
pub use router::provider_routes;
