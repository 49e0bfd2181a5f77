pub mod airport_service;
pub mod flight_service;
pub mod reservation_service;
pub mod search_service;
pub mod seat_ledger;
pub mod token_service;
pub mod user_service;
