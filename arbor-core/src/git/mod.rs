//! Git porcelain over libgit2
//!
//! This module provides repository open/clone/close, branch handles and
//! scoped remote connections.

mod backend;
mod branch;
mod clone;
mod oid;
mod remote;
mod repo;

#[cfg(test)]
pub(crate) mod test_support;

pub use branch::{Branch, BranchKind};
pub use clone::CloneUrl;
pub use oid::Oid;
pub use remote::{Connection, Remote, RemoteRef};
pub use repo::Repository;
