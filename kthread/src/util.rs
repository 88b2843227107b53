//! Allocation helpers.

use crate::KernelError;

/// Duplicates `name` into a freshly allocated [`String`].
///
/// # Errors
/// Returns [`KernelError::NoMemory`] if the allocation fails.
pub fn kstrdup(name: &str) -> Result<String, KernelError> {
    let mut s = String::new();
    s.try_reserve_exact(name.len())
        .map_err(|_| KernelError::NoMemory)?;
    s.push_str(name);
    Ok(s)
}
