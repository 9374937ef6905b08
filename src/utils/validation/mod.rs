//! Consolidated validation utilities
//!
//! This module provides centralized validation logic shared by the
//! preprocessing operations, configuration types and batch-norm layer.

pub mod numeric;
pub mod tensor;

pub use numeric::NumericValidator;
pub use tensor::TensorValidator;
