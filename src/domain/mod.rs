pub mod email;
pub mod relay;
