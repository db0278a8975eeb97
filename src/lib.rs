// Library exports for longjoin
pub mod bin_index;
pub mod config;
pub mod decision;
pub mod error;
pub mod format_io;
pub mod ids;
pub mod join;
pub mod path;
pub mod pipeline;
pub mod range;
pub mod range_set;
pub mod split;
pub mod store;
pub mod union_find;
