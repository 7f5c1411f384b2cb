pub mod network;
pub mod protocol;
