pub mod callable;
pub mod context;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod types;
