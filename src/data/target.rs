//! Row-identifier capability shared by every expression object a GeneSetDb
//! can be conformed against.

use crate::error::{GseaError, Result};

/// An ordered source of row identifiers.
///
/// This is the only thing conformation needs from an expression object, so
/// any matrix-like type becomes a valid target by implementing it.
pub trait RowIdentifiers {
    /// Row identifiers in row order.
    fn row_ids(&self) -> &[String];

    /// Number of rows in the underlying object.
    fn n_rows(&self) -> usize {
        self.row_ids().len()
    }
}

impl RowIdentifiers for Vec<String> {
    fn row_ids(&self) -> &[String] {
        self
    }
}

impl RowIdentifiers for [String] {
    fn row_ids(&self) -> &[String] {
        self
    }
}

impl<T: RowIdentifiers + ?Sized> RowIdentifiers for &T {
    fn row_ids(&self) -> &[String] {
        (**self).row_ids()
    }

    fn n_rows(&self) -> usize {
        (**self).n_rows()
    }
}

/// Check that a target exposes one identifier per row and at least one row.
pub fn validate_target<T: RowIdentifiers + ?Sized>(target: &T) -> Result<()> {
    let ids = target.row_ids();
    if target.n_rows() != ids.len() {
        return Err(GseaError::DimensionMismatch {
            expected: target.n_rows(),
            actual: ids.len(),
        });
    }
    if ids.is_empty() {
        return Err(GseaError::InvalidParameter(
            "target object has no row identifiers".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lying {
        ids: Vec<String>,
    }

    impl RowIdentifiers for Lying {
        fn row_ids(&self) -> &[String] {
            &self.ids
        }

        fn n_rows(&self) -> usize {
            self.ids.len() + 1
        }
    }

    #[test]
    fn test_vec_is_a_target() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(ids.n_rows(), 2);
        assert!(validate_target(&ids).is_ok());
        assert!(validate_target(ids.as_slice()).is_ok());
    }

    #[test]
    fn test_empty_target_rejected() {
        let ids: Vec<String> = Vec::new();
        assert!(matches!(
            validate_target(&ids),
            Err(GseaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let target = Lying {
            ids: vec!["a".to_string()],
        };
        assert!(matches!(
            validate_target(&target),
            Err(GseaError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }
}
