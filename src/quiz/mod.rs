// src/quiz/mod.rs

pub mod scoring;
pub mod session;
