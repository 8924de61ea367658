mod license_state;
mod shop;

pub use license_state::*;
pub use shop::*;
