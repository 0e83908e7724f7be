pub mod service;

pub use service::StaleSessionReaper;
