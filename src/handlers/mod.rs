// src/handlers/mod.rs

pub mod generate;
