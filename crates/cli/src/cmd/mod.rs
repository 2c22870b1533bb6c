mod build;
mod status;
mod unlock;

pub use build::cmd_build;
pub use status::cmd_status;
pub use unlock::cmd_unlock;
