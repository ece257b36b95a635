//! CLI 명령어 구현

pub mod check;
pub mod policy;
