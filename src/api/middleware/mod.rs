//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Identity: gateway headers → `UserContext`, 401 otherwise
//! 2. Audit logger: runs after identity, has the user

pub mod audit;
pub mod auth;
