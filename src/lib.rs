mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod pagination;
    pub mod postgres;
    pub mod schema;
    pub mod store;
    pub mod views;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
}
mod api {
    pub mod handlers;
    pub mod rejection;
    pub mod routes;
}
mod config;
mod constants;

pub use api::*;
pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
