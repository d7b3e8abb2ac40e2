pub mod events;
pub mod harness;
