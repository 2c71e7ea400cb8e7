pub mod audit;
pub mod error;
pub mod event;
pub mod gateway;
pub mod id;
pub mod job;
pub mod money;
pub mod profile;
