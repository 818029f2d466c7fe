//! Background work running alongside request handling.

pub mod tasks;

pub use tasks::TaskRunner;
