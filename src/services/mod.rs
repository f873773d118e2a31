pub mod dispatcher;
pub mod health_service;
pub mod mailer;
pub mod relay_pool;
pub mod store;
