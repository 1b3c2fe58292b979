//! Domain model of a reset run
pub mod aggregates;
pub mod events;
pub mod value_objects;
