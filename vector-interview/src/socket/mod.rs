pub mod collab;
pub mod handlers;
