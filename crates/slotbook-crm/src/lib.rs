//! CRM layer: HubSpot schema discovery, record writes and search, and the
//! booking flow built on them.

#[cfg(feature = "http")]
pub mod booking;
#[cfg(feature = "http")]
pub mod client;

#[cfg(feature = "http")]
pub use booking::{AppointmentBooker, Booking, Discovery};
#[cfg(feature = "http")]
pub use client::{CrmClient, CrmError, SearchQuery};
