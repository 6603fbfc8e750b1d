pub mod config;
pub mod device;
pub mod interface;
pub mod packet;
pub mod stats;
