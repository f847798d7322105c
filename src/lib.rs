//! `kubesee`: watches Kubernetes events, routes them through a rule tree,
//! renders them through an optional template layout, and ships them to
//! pluggable sinks.

pub mod config;
pub mod engine;
pub mod event;
pub mod registry;
pub mod route;
pub mod sinks;
pub mod template;
pub mod watcher;
