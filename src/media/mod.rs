pub mod catalog;
pub mod chunks;
pub mod mime;
