pub mod fanout;
pub mod gateway;
pub mod health_service;
pub mod listing;
pub mod message_service;
pub mod rate_limit_service;
pub mod room_service;
