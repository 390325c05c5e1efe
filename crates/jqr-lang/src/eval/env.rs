use std::rc::Rc;

use crate::Value;
use crate::ast::IdentName;

#[derive(Debug)]
struct Binding {
    name: IdentName,
    value: Value,
    parent: Env,
}

/// Variable bindings visible to one evaluation.
///
/// Bindings form a persistent linked list, so a branch that binds `$x`
/// shares every outer binding with its siblings and never observes theirs.
#[derive(Debug, Clone, Default)]
pub struct Env(Option<Rc<Binding>>);

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: IdentName, value: Value) -> Self {
        Env(Some(Rc::new(Binding {
            name,
            value,
            parent: self.clone(),
        })))
    }

    /// Resolves `name`, innermost binding first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut current = self.0.as_deref();

        while let Some(binding) = current {
            if binding.name == name {
                return Some(&binding.value);
            }
            current = binding.parent.0.as_deref();
        }

        None
    }
}

impl FromIterator<(IdentName, Value)> for Env {
    fn from_iter<T: IntoIterator<Item = (IdentName, Value)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Env::new(), |env, (name, value)| env.bind(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use smol_str::SmolStr;

    #[rstest]
    #[case::missing(&[], "x", None)]
    #[case::found(&[("x", 1)], "x", Some(1))]
    #[case::shadowed(&[("x", 1), ("x", 2)], "x", Some(2))]
    #[case::outer(&[("x", 1), ("y", 2)], "x", Some(1))]
    fn test_get(#[case] bindings: &[(&str, i64)], #[case] name: &str, #[case] expected: Option<i64>) {
        let env: Env = bindings
            .iter()
            .map(|(name, value)| (SmolStr::new(name), Value::from(*value)))
            .collect();

        assert_eq!(env.get(name).cloned(), expected.map(Value::from));
    }

    #[test]
    fn test_bind_does_not_leak_into_parent() {
        let parent = Env::new().bind(SmolStr::new("x"), Value::from(1));
        let child = parent.bind(SmolStr::new("y"), Value::from(2));

        assert_eq!(child.get("y"), Some(&Value::from(2)));
        assert_eq!(parent.get("y"), None);
    }
}
