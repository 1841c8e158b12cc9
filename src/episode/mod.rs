mod select;

pub use select::{Selection, select_episode};
