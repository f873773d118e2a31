pub mod email;
pub mod health;
