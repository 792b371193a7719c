pub mod members;
pub mod rides;
