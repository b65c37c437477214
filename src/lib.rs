pub mod camera;
pub mod config;
pub mod error;
pub mod gi;
pub mod object;
pub mod render_system;
pub mod utils;
