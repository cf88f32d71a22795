//! Command builders for the fixed saga/outbox/subscription operation set.
//!
//! Builders are pure: given a [`crate::PersistenceConfig`] they emit
//! [`crate::CommandTemplate`]s once, at configuration time. No builder
//! performs I/O or fails at query time.

pub mod outbox;
pub mod saga;
pub mod subscription;

pub use outbox::OutboxCommands;
pub use saga::SagaCommands;
pub use subscription::SubscriptionCommands;
