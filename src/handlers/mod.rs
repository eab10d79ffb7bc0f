// src/handlers/mod.rs

pub mod auth;
pub mod classes;
pub mod lessons;
pub mod quiz;
pub mod schedule;
