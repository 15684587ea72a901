pub mod auth;
pub mod docs;
pub mod health;
pub mod model;
pub mod skill;
pub mod swap;
pub mod user;
