pub mod store;
pub mod window;
