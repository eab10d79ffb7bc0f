// src/models/mod.rs

pub mod class;
pub mod lesson;
pub mod user;
