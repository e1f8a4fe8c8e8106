pub mod app;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;
