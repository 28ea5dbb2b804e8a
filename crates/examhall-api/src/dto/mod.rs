//! Request and response DTOs for the admin API.

pub mod request;
pub mod response;
