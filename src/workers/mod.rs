pub mod email_cleanup;

pub use email_cleanup::EmailCleanupWorker;
