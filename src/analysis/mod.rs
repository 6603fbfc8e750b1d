pub mod mapper;
pub mod pipeline;
pub mod presence;
pub mod stats;
