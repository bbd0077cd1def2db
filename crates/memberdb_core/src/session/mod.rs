//! Unit of work and persistence context.
//!
//! # Responsibility
//! - Track managed entities per identity and defer writes until flush.
//! - Own the SQLite transaction that scopes one logical unit of work.
//!
//! # Invariants
//! - One `Managed<T>` handle per identity per unit of work.
//! - Handles outlive their unit of work as detached copies; nothing they
//!   reference is loaded implicitly afterwards.

mod context;
mod identity_map;
mod managed;
mod unit_of_work;

pub use context::PersistenceContext;
pub use identity_map::{EntryState, IdentityMap};
pub use managed::Managed;
pub use unit_of_work::{FlushMode, FlushStats, LoadOptions, UnitOfWork};
