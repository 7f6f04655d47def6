pub mod render;
pub mod upload;
