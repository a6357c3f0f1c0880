//! Request handlers, one module per resource

pub mod audit;
pub mod bookings;
pub mod health;
pub mod invoices;
