pub mod combine;
pub mod config;
pub mod info;
pub mod name;
pub mod reduce;
