pub mod booking;
pub mod movie;
pub mod showtime;
pub mod studio;
pub mod webhook;
