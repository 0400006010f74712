pub mod batch;
pub mod quiz;
pub mod result;
pub mod user;
