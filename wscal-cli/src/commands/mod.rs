pub mod auth;
pub mod config;
pub mod delete;
pub mod events;
pub mod new;
pub mod next;
pub mod push;
pub mod sync;
pub mod update;
