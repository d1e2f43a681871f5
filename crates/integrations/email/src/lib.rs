pub mod backend;
pub mod config;
pub mod error;
pub mod log;
pub mod smtp;
pub mod templates;
pub mod testing;

pub use backend::{EmailBackend, EmailMessage, EmailResult};
pub use config::{EmailConfig, SmtpConfig};
pub use error::EmailError;
pub use log::LogBackend;
pub use smtp::SmtpBackend;
pub use templates::{EmailTemplate, RenderedEmail, TemplateRenderer};
