pub mod booking;
pub mod calendar;
pub mod providers;
pub mod scheduling;
pub mod session;
