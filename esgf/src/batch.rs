//! Results of operations applied to many independent items at once, where each item can fail
//! on its own.
//!
use std::fmt::Display;

use crate::errors::{Error, Failure, Result};

/// An item that was flagged while processing a batch, possibly with an error
///
#[derive(Debug)]
pub struct ItemError<T> {
    pub item: T,
    pub err: Option<Error>,
}

#[derive(Debug)]
pub struct Batch<T> {
    pub succeeded: Vec<T>,
    pub errors: Vec<ItemError<T>>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            succeeded: vec![],
            errors: vec![],
        }
    }
}

impl<T: Display> Batch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn push_err(&mut self, item: T, err: Option<Error>) {
        self.errors.push(ItemError { item, err });
    }

    /// Whether any flagged item carries an actual error
    pub fn has_failures(&self) -> bool {
        self.errors.iter().any(|error| error.err.is_some())
    }

    /// Split into the succeeded items and one `Failure` per item that carries an error
    pub fn into_parts(self) -> (Vec<T>, Vec<Failure>) {
        let failures = self
            .errors
            .into_iter()
            .filter_map(|error| {
                let item = error.item.to_string();
                error.err.map(|err| Failure { item, err })
            })
            .collect();

        (self.succeeded, failures)
    }

    /// The succeeded items, or a single composite error carrying every failure
    pub fn into_result(self) -> Result<Vec<T>> {
        let (succeeded, failures) = self.into_parts();
        raise(failures)?;

        Ok(succeeded)
    }
}

/// Raise a composite error if, and only if, there are failures
pub fn raise(failures: Vec<Failure>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Retrieval(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flagged_items_without_error_do_not_raise() {
        let mut batch = Batch::new();
        batch.push_ok("a".to_string());
        batch.push_err("b".to_string(), None);
        assert!(!batch.has_failures());
        assert_eq!(batch.into_result().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_every_failure_is_reported() {
        let mut batch: Batch<String> = Batch::new();
        batch.push_err("a".to_string(), Some(Error::Invalid("boom".to_string())));
        batch.push_err("b".to_string(), None);
        batch.push_err("c".to_string(), Some(Error::Invalid("bang".to_string())));
        assert!(batch.has_failures());

        match batch.into_result() {
            Err(Error::Retrieval(failures)) => {
                let items: Vec<&str> = failures.iter().map(|f| f.item.as_str()).collect();
                assert_eq!(items, vec!["a", "c"]);
            }
            _ => panic!("expected a retrieval error"),
        }
    }

    #[test]
    fn test_raise_nothing() {
        assert!(raise(vec![]).is_ok());
    }
}
