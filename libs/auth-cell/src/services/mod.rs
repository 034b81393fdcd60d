pub mod auth;
pub mod credentials;
pub mod directory;
pub mod session;

pub use auth::AuthService;
pub use credentials::CredentialService;
pub use directory::{PrincipalDirectory, StoreDirectory};
pub use session::SessionService;
