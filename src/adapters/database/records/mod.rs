pub mod email;

pub use email::{AttachmentRecord, EmailRecord};
