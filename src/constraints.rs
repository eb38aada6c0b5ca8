//! # Constraint framework
//!
//! Typed predicates evaluated by codecs before wire emission, after value
//! materialisation, or both. Constraints compose into ordered groups that
//! short-circuit on the first failure, and groups may be registered under a
//! case-folded name for reference from `constraint:NAME` annotations.

use std::any::Any;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::registry::VersionedRegistry;

/// When a codec evaluates its constraint group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Before wire emission only.
    Encoding,
    /// After value materialisation only.
    Decoding,
    /// Both directions.
    #[default]
    Both,
}

impl Phase {
    /// Whether the phase selects the given direction.
    pub fn applies(self, encoding: bool) -> bool {
        match self {
            Self::Encoding => encoding,
            Self::Decoding => !encoding,
            Self::Both => true,
        }
    }
}

type Predicate = Arc<dyn Fn(&dyn Any) -> Result<()> + Send + Sync>;

/// A named predicate over a typed value.
///
/// The predicate sees values through `&dyn Any`; the typed constructors
/// downcast and pass values of other types through untouched, so a group
/// may mix constraints aimed at different component types.
#[derive(Clone)]
pub struct Constraint {
    name: Arc<str>,
    check: Predicate,
}

impl Constraint {
    /// A constraint from a typed predicate.
    pub fn new<T, F>(name: &str, predicate: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: crate::error::intern(name),
            check: Arc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
                Some(typed) => predicate(typed),
                None => Ok(()),
            }),
        }
    }

    fn from_predicate(name: &str, check: Predicate) -> Self {
        Self {
            name: crate::error::intern(name),
            check,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, value: &dyn Any) -> Result<()> {
        (self.check)(value)
    }

    fn violation(&self, msg: impl AsRef<str>) -> Error {
        Error::constraint_violation(&*self.name, msg)
    }
}

impl core::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .finish()
    }
}

/// An ordered list of constraints; evaluation short-circuits on the first
/// failure.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGroup {
    constraints: Vec<Constraint>,
}

impl ConstraintGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn extend(&mut self, other: &ConstraintGroup) {
        self.constraints.extend(other.constraints.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Evaluates every constraint in order, stopping at the first failure.
    pub fn check(&self, value: &dyn Any) -> Result<()> {
        for constraint in &self.constraints {
            constraint.check(value)?;
        }
        Ok(())
    }
}

impl FromIterator<Constraint> for ConstraintGroup {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

/// Anything with a length, for [`size`] constraints.
pub trait Measured {
    fn measure(&self) -> usize;
}

impl Measured for String {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<T> Measured for Vec<T> {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl Measured for crate::types::BitString {
    fn measure(&self) -> usize {
        self.len()
    }
}

macro_rules! measured_strings {
    ($($name:ty),+ $(,)?) => {
        $(
            impl Measured for $name {
                fn measure(&self) -> usize {
                    self.as_bytes().len()
                }
            }
        )+
    }
}

measured_strings!(
    crate::types::NumericString,
    crate::types::PrintableString,
    crate::types::Ia5String,
    crate::types::VisibleString,
    crate::types::TeletexString,
    crate::types::GraphicString,
    crate::types::GeneralString,
);

/// Passes when the value equals `expected`.
pub fn equality<T>(name: &str, expected: T) -> Constraint
where
    T: Any + PartialEq + core::fmt::Debug + Send + Sync,
{
    let label = crate::error::intern(name);
    Constraint::new::<T, _>(name, move |value| {
        if *value == expected {
            Ok(())
        } else {
            Err(Error::constraint_violation(
                &*label,
                format!("value does not equal {expected:?}"),
            ))
        }
    })
}

/// Passes when the value lies within the ordered bounds (both inclusive).
pub fn range<T>(name: &str, min: Option<T>, max: Option<T>) -> Constraint
where
    T: Any + PartialOrd + Copy + core::fmt::Display + Send + Sync,
{
    let label = crate::error::intern(name);
    Constraint::new::<T, _>(name, move |value| {
        if min.map_or(true, |min| *value >= min) && max.map_or(true, |max| *value <= max) {
            Ok(())
        } else {
            Err(Error::constraint_violation(
                &*label,
                format!("value {value} outside the permitted range"),
            ))
        }
    })
}

/// Passes when the value's length lies within the bounds (both inclusive).
pub fn size<T>(name: &str, min: Option<usize>, max: Option<usize>) -> Constraint
where
    T: Any + Measured,
{
    let label = crate::error::intern(name);
    Constraint::new::<T, _>(name, move |value| {
        let length = value.measure();
        if min.map_or(true, |min| length >= min) && max.map_or(true, |max| length <= max) {
            Ok(())
        } else {
            Err(Error::constraint_violation(
                &*label,
                format!("length {length} outside the permitted size"),
            ))
        }
    })
}

/// Passes when every character of the value belongs to `alphabet` (a FROM
/// constraint).
pub fn from_characters<T>(name: &str, alphabet: &'static str) -> Constraint
where
    T: Any + AsRef<str>,
{
    let label = crate::error::intern(name);
    Constraint::new::<T, _>(name, move |value| {
        match value
            .as_ref()
            .chars()
            .find(|ch| !alphabet.contains(*ch))
        {
            None => Ok(()),
            Some(ch) => Err(Error::constraint_violation(
                &*label,
                format!("character {ch:?} not in the permitted alphabet"),
            )),
        }
    })
}

/// Passes when the ordered sequence begins with `prefix` (an ancestry
/// constraint).
pub fn ancestor<T>(name: &str, prefix: Vec<T>) -> Constraint
where
    T: Any + PartialEq + Send + Sync,
{
    let label = crate::error::intern(name);
    Constraint::new::<Vec<T>, _>(name, move |value| {
        if value.len() >= prefix.len() && value.iter().zip(&prefix).all(|(a, b)| a == b) {
            Ok(())
        } else {
            Err(Error::constraint_violation(
                &*label,
                "sequence does not descend from the required prefix",
            ))
        }
    })
}

/// A free-form property predicate; an alias for [`Constraint::new`].
pub fn property<T, F>(name: &str, predicate: F) -> Constraint
where
    T: Any,
    F: Fn(&T) -> Result<()> + Send + Sync + 'static,
{
    Constraint::new::<T, _>(name, predicate)
}

/// Passes when at least one member passes.
pub fn union(name: &str, members: Vec<Constraint>) -> Constraint {
    let label = crate::error::intern(name);
    Constraint::from_predicate(
        name,
        Arc::new(move |value: &dyn Any| {
            if members.is_empty() || members.iter().any(|member| member.check(value).is_ok()) {
                Ok(())
            } else {
                Err(Error::constraint_violation(
                    &*label,
                    "no union member accepted the value",
                ))
            }
        }),
    )
}

/// Passes when every member passes; short-circuits like a group.
pub fn intersection(name: &str, members: Vec<Constraint>) -> Constraint {
    Constraint::from_predicate(
        name,
        Arc::new(move |value: &dyn Any| {
            for member in &members {
                member.check(value)?;
            }
            Ok(())
        }),
    )
}

static GROUPS: Lazy<VersionedRegistry<String, ConstraintGroup>> =
    Lazy::new(VersionedRegistry::new);

/// Registers a named constraint group for `constraint:NAME` annotations.
/// Names are case-folded.
pub fn register_constraint_group(name: &str, group: ConstraintGroup) {
    GROUPS.insert(name.to_ascii_lowercase(), group);
}

/// Removes a named constraint group.
pub fn unregister_constraint_group(name: &str) {
    GROUPS.remove(&name.to_ascii_lowercase());
}

pub(crate) fn constraint_group(name: &str) -> Option<ConstraintGroup> {
    GROUPS.get(&name.to_ascii_lowercase())
}

/// Evaluates every named group from a `constraint:NAME` annotation list
/// against `value`.
pub(crate) fn check_named(names: &[String], value: &dyn Any) -> Result<()> {
    for name in names {
        let group = constraint_group(name).ok_or_else(|| {
            Error::custom(format!("no constraint group registered under `{name}`"))
        })?;
        group.check(value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn phases_select_directions() {
        assert!(Phase::Both.applies(true));
        assert!(Phase::Both.applies(false));
        assert!(Phase::Encoding.applies(true));
        assert!(!Phase::Encoding.applies(false));
        assert!(!Phase::Decoding.applies(true));
        assert!(Phase::Decoding.applies(false));
    }

    #[test]
    fn range_and_size() {
        let bounded = range::<i64>("bounded", Some(0), Some(10));
        assert!(bounded.check(&5i64).is_ok());
        assert!(bounded.check(&11i64).is_err());

        let sized = size::<String>("sized", Some(1), Some(3));
        assert!(sized.check(&String::from("ab")).is_ok());
        assert!(sized.check(&String::from("")).is_err());
    }

    #[test]
    fn charset_membership() {
        let hex = from_characters::<String>("hex", "0123456789abcdef");
        assert!(hex.check(&String::from("c0ffee")).is_ok());
        assert!(hex.check(&String::from("tea")).is_err());
    }

    #[test]
    fn ancestry() {
        let under_enterprises = ancestor::<u32>("under-enterprises", vec![1, 3, 6, 1, 4, 1]);
        assert!(under_enterprises
            .check(&vec![1u32, 3, 6, 1, 4, 1, 56521])
            .is_ok());
        assert!(under_enterprises.check(&vec![1u32, 3, 6, 2]).is_err());
    }

    #[test]
    fn union_and_intersection() {
        let low = range::<i64>("low", Some(0), Some(4));
        let high = range::<i64>("high", Some(10), Some(14));
        let either = union("either", vec![low.clone(), high.clone()]);
        assert!(either.check(&2i64).is_ok());
        assert!(either.check(&12i64).is_ok());
        assert!(either.check(&7i64).is_err());

        let both = intersection("both", vec![low, range::<i64>("even", Some(2), None)]);
        assert!(both.check(&3i64).is_ok());
        assert!(both.check(&1i64).is_err());
    }

    #[test]
    fn group_short_circuits() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let counting_fail = property::<i64, _>("counting-fail", |_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(Error::constraint_violation("counting-fail", "always fails"))
        });
        let counting_pass = property::<i64, _>("counting-pass", |_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let group: ConstraintGroup =
            vec![counting_pass, counting_fail.clone(), counting_fail].into_iter().collect();
        assert!(group.check(&1i64).is_err());
        assert_eq!(2, CALLS.load(Ordering::SeqCst));
    }

    #[test]
    fn other_types_pass_through() {
        let bounded = range::<i64>("bounded", Some(0), Some(1));
        assert!(bounded.check(&String::from("not an integer")).is_ok());
    }

    #[test]
    fn named_groups() {
        let group: ConstraintGroup =
            vec![range::<i64>("small", None, Some(100))].into_iter().collect();
        register_constraint_group("Small-Int", group);
        let fetched = constraint_group("small-int").unwrap();
        assert!(fetched.check(&5i64).is_ok());
        assert!(fetched.check(&500i64).is_err());
        unregister_constraint_group("small-int");
        assert!(constraint_group("small-int").is_none());
    }
}
