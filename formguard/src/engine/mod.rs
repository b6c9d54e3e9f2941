pub mod dispatcher;
pub mod fusion;
pub mod pipeline;
pub mod scoring;
