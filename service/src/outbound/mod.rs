//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters are thin translators between domain types and wire
//! representations; they contain no resilience or business logic.

pub mod overpass;
