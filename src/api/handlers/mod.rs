pub mod health;
pub mod upload;
pub mod videos;
