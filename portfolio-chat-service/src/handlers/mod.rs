//! HTTP handlers for the portfolio chat service.

pub mod chat;
pub mod health;
pub mod page;
