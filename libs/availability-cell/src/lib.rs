pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AppointmentType, AvailabilitySlot, AvailabilityTemplate, PricingInfo, SlotProjection,
    SlotStatus,
};
pub use router::availability_routes;
