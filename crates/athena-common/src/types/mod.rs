//! Core identifier types for Athena

pub mod ids;
