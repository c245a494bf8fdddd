//! OS abstraction for volume statistics.

pub mod pal;
