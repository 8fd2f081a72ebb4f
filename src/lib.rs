pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod installment;
pub mod merge;
pub mod rules;
pub mod service;
pub mod utils;
pub mod validator;
