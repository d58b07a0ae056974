pub mod cert_expiration;
pub mod threshold;
