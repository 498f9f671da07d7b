pub mod fits;

pub use fits::{read_fits, write_fits, FitsReader};
