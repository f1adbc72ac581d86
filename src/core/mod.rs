pub mod config;
pub mod gallery;
pub mod playback;
