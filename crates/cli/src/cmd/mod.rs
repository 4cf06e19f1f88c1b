mod build;
mod graph;
mod index;
mod serve;

pub use build::cmd_build;
pub use graph::cmd_graph;
pub use index::cmd_index;
pub use serve::cmd_serve;
