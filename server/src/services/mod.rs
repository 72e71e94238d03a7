pub mod booking;
pub mod catalog;
pub mod payment;
pub mod reconciler;
pub mod schedule;
pub mod seats;
