//! Incrementally fill per-locale ARB resource files by translating a base
//! language through an OpenAI chat completion endpoint.

pub mod base;
pub mod cli;
pub mod client;
pub mod config;
pub mod conversation;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod store;
pub mod validator;
