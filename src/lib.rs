pub mod auth;
pub mod calendar;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod console;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod remote;
pub mod sync;
