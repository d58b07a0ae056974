//! The hostwatch agent: configuration, the OS inspector and the long-running
//! monitoring tasks wired together by the binary.

pub mod cert;
pub mod config;
pub mod context;
pub mod daily;
pub mod inspector;
pub mod logwatch;
pub mod metrics;
pub mod probe;
pub mod rule_builder;
pub mod scheduler;
pub mod traffic;
