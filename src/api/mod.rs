pub mod error;
pub mod gallery;
pub mod playback;
pub mod sampler;
pub mod session;
