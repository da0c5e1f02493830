//! Adapters connecting ports to concrete technology.

pub mod outbound;
