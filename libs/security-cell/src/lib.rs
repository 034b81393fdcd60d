// =====================================================================================
// SECURITY CELL - EVENT LOG, RATE GUARDS, PASSWORD HANDLING
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{SecurityEvent, SecurityEventKind, Severity};
pub use services::{PasswordService, RateGuard, SecurityEventService};
