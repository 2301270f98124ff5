//! API layer - admin HTTP surface

pub mod rest;
