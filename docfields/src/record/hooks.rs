//! Pre/post hooks around the public field setter.
//!
//! Hooks run around [`Record::set`](crate::record::Record::set). A pre-hook may
//! rewrite the incoming value or reject it; the cast and document sync that
//! follow always run, so a hook cannot leave a field and its document key out
//! of step.

use std::fmt;

use crate::error::DocResult;
use crate::types::TypedValue;

pub trait SetterHook: Send + Sync {
    /// Called before casting; may replace `value` or abort the assignment
    fn before_set(&self, _accessor: &str, _value: &mut TypedValue) -> DocResult<()> {
        Ok(())
    }

    /// Called with the canonical value once the document holds it
    fn after_set(&self, _accessor: &str, _value: &TypedValue) {}
}

/// Pre-hook built from a closure, optionally limited to one accessor
pub struct BeforeSet<F> {
    accessor: Option<String>,
    f: F,
}

impl<F> BeforeSet<F>
where
    F: Fn(&mut TypedValue) -> DocResult<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { accessor: None, f }
    }

    pub fn for_accessor(accessor: impl Into<String>, f: F) -> Self {
        Self {
            accessor: Some(accessor.into()),
            f,
        }
    }
}

impl<F> SetterHook for BeforeSet<F>
where
    F: Fn(&mut TypedValue) -> DocResult<()> + Send + Sync,
{
    fn before_set(&self, accessor: &str, value: &mut TypedValue) -> DocResult<()> {
        match &self.accessor {
            Some(only) if only != accessor => Ok(()),
            _ => (self.f)(value),
        }
    }
}

impl<F> fmt::Debug for BeforeSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeSet")
            .field("accessor", &self.accessor)
            .finish()
    }
}

/// Post-hook built from a closure
pub struct AfterSet<F> {
    f: F,
}

impl<F> AfterSet<F>
where
    F: Fn(&str, &TypedValue) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> SetterHook for AfterSet<F>
where
    F: Fn(&str, &TypedValue) + Send + Sync,
{
    fn after_set(&self, accessor: &str, value: &TypedValue) {
        (self.f)(accessor, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_before_set_scoped_to_accessor() {
        let hook = BeforeSet::for_accessor("title", |value: &mut TypedValue| {
            if let TypedValue::String(s) = value {
                *s = s.to_uppercase();
            }
            Ok(())
        });

        let mut title = TypedValue::from("abc");
        hook.before_set("title", &mut title).unwrap();
        assert_eq!(title, TypedValue::from("ABC"));

        let mut other = TypedValue::from("abc");
        hook.before_set("other", &mut other).unwrap();
        assert_eq!(other, TypedValue::from("abc"));
    }

    #[test]
    fn test_after_set_observes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = AfterSet::new(move |accessor: &str, value: &TypedValue| {
            sink.lock().unwrap().push(format!("{}={}", accessor, value));
        });
        hook.after_set("rank", &TypedValue::Integer(3));
        assert_eq!(*seen.lock().unwrap(), vec!["rank=3".to_string()]);
    }
}
