pub mod menu;
pub mod upload;

pub use menu::*;
pub use upload::*;
