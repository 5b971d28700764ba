// src/services.rs

pub mod catalog_service;
pub mod dashboard_service;
pub mod movement_service;
