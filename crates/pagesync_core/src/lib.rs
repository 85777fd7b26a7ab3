pub mod config;
pub mod document;
pub mod extract;
pub mod normalize;
pub mod patch;
pub mod resolve;
pub mod store;
pub mod sync;
