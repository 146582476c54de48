use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::Error;

/// Ordered name to value mapping used to configure the solvers.
///
/// Values are kept in text form and parsed on read, so a set can be
/// assembled from user input without committing to the value types up
/// front. Insertion order is preserved and defines the printable form.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    props: IndexMap<String, String>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a property, builder style.
    pub fn set(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.props.insert(name.to_owned(), value.to_string());
        self
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// Parses the named property into `T`.
    pub fn get_as<T: FromStr>(&self, name: &str) -> Result<T, Error> {
        let raw = self
            .props
            .get(name)
            .ok_or_else(|| Error::MissingProperty(name.to_owned()))?;
        raw.parse().map_err(|_| Error::BadProperty {
            name: name.to_owned(),
            value: raw.clone(),
        })
    }

    /// Parses the named property, falling back to `default` when absent.
    pub fn get_or<T: FromStr>(&self, name: &str, default: T) -> Result<T, Error> {
        if self.has_property(name) {
            self.get_as(name)
        } else {
            Ok(default)
        }
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.props
                .iter()
                .format_with(",", |(k, v), g| g(&format_args!("{}={}", k, v)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads() {
        let ps = PropertySet::new()
            .set("tol", 1e-9)
            .set("maxiter", 100)
            .set("logdomain", false);
        assert!(ps.has_property("tol"));
        assert_eq!(ps.get_as::<f64>("tol").unwrap(), 1e-9);
        assert_eq!(ps.get_as::<usize>("maxiter").unwrap(), 100);
        assert!(!ps.get_as::<bool>("logdomain").unwrap());
        assert!(ps.get_as::<f64>("missing").is_err());
        assert!(ps.get_as::<usize>("tol").is_err());
        assert_eq!(ps.get_or("verbose", 3usize).unwrap(), 3);
    }

    #[test]
    fn printable_form_keeps_insertion_order() {
        let ps = PropertySet::new().set("b", 1).set("a", 2);
        assert_eq!(format!("{}", ps), "[b=1,a=2]");
    }
}
