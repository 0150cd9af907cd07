//! Safe resume: re-validate size, range support and validators before resuming.
//!
//! A resumed package is only trusted if a fresh probe still describes the
//! same resource. Anything else fails the resume instead of silently
//! splicing bytes from two different versions.

mod validate;

pub use validate::{validate_for_resume, ValidationError, ValidationErrorKind};
