pub mod domain;
pub mod judge;
pub mod pipeline;
pub mod toolchain;
pub mod traits;
pub mod workspace;
