//! CPU reference for `c = a + b`.

use crate::{ClError, Result};

pub fn reference(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Checks `c` element by element against `a + b`.
///
/// The comparison is exact: a single IEEE add rounds the same on every
/// conforming device. The first differing index is reported.
pub fn verify(a: &[f32], b: &[f32], c: &[f32]) -> Result<()> {
    if a.len() != c.len() || b.len() != c.len() {
        return Err(ClError::LengthMismatch {
            host: a.len().min(b.len()),
            device: c.len(),
        });
    }
    match a
        .iter()
        .zip(b)
        .zip(c)
        .position(|((x, y), z)| x + y != *z)
    {
        Some(index) => Err(ClError::Mismatch {
            index,
            expected: a[index] + b[index],
            actual: c[index],
        }),
        None => Ok(()),
    }
}
