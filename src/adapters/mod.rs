pub mod database;
pub mod memory;
pub mod smtp;
