pub mod gateway;
pub mod health;
pub mod messages;
pub mod rooms;
