//! Core types shared by every frontgate crate.
//!
//! This crate provides the strongly-typed identifiers used across the
//! request pipeline and the rootcause-based `Result` alias used on the
//! boot path.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RequestId, SessionId};
