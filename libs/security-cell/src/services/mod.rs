pub mod events;
pub mod guard;
pub mod password;

pub use events::SecurityEventService;
pub use guard::RateGuard;
pub use password::PasswordService;
