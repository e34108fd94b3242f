//! `estate-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no ledger or IO concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::DomainError;
pub use id::{AttemptId, InvestorAddress, PropertyId};
pub use value_object::ValueObject;
