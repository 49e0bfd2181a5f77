pub mod airport;
pub mod flight;
pub mod reservation;
pub mod user;
