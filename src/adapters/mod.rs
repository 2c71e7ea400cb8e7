pub mod api_errors;
pub mod gateway;
pub mod signature;
pub mod webhook;
