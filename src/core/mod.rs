//! Core library components.

pub mod chain;
pub mod domain;
pub mod exchange;
pub mod service;
pub mod strategy;
