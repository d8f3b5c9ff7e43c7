//! IO modules - side effects (network, filesystem)

#[cfg(target_os = "macos")]
pub mod dmg;
pub mod extract;
pub mod fetch;
pub mod retry;
pub mod verify;
