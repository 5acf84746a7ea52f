//! Balas core library — WhatsApp webhook handling, retry dedupe, Gemini inference and
//! Graph API delivery, served by a small axum gateway. Used by the `balas` CLI.

pub mod channels;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod llm;
