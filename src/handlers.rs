// src/handlers.rs

pub mod dashboard;
pub mod locations;
pub mod movements;
pub mod operators;
pub mod products;
