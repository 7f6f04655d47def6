pub mod ffmpeg;
pub mod source_info;
pub mod renderer;
