mod node;
mod project;

pub use node::NodeModel;
pub use project::ProjectModel;
