mod layout;
mod path;
mod splice;
mod topology;

pub use layout::*;
pub use path::*;
pub use splice::*;
pub use topology::*;
