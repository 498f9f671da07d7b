pub mod combine;
pub mod consts;
pub mod cosmic;
pub mod error;
pub mod frame;
pub mod io;
pub mod mode;
pub mod naming;
pub mod normalize;
pub mod ops;
pub mod pipeline;
pub mod region;
pub mod slit;
pub mod stats;
