mod shutdown;
mod vars;

pub use shutdown::Shutdown;
pub use vars::Vars;
