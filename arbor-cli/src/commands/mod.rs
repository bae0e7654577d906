//! CLI command implementations

pub mod branch;
pub mod clone;
pub mod remote;

pub use branch::BranchArgs;
pub use clone::CloneArgs;
pub use remote::LsRemoteArgs;
