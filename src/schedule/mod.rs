pub mod actor;
pub mod slots;
