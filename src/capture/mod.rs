pub mod manager;
pub mod parser;
pub mod source;
