pub mod openapi;
pub mod routes;
pub mod secret;
pub mod serve;
pub mod token;
