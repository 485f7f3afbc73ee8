pub mod auth;
pub mod comments;
pub mod dto;
pub mod extract;
pub mod likes;
pub mod server;
pub mod stories;
pub mod users;
