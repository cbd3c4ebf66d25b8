pub mod auth;
pub mod daily;
pub mod health;
pub mod oura;
