// Core pipeline: scan → fingerprint → group → decide → dispose.

pub mod decision;
pub mod disposal;
pub mod duplicate;
pub mod fingerprint;
pub mod hash;
pub mod image;
pub mod pipeline;
pub mod run_log;
pub mod scanner;
