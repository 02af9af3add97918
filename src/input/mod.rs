//! Input loading
//! Job and candidate JSON records plus free-text candidate documents

pub mod file_detector;
pub mod manager;
pub mod text_extractor;

pub use manager::InputManager;
