//! Row → typed object mapping.
//!
//! A target type describes itself once with a [`Mutators`] registry: a list
//! of named mutators, each with the parameter kind it expects. For every
//! column the mapper looks for the mutator called `set<column>` (ASCII and
//! Unicode case ignored), converts the column value to that mutator's kind
//! and invokes it. Columns without a mutator and NULL values are skipped, so
//! partially populated objects are normal.
//!
//! ```rust
//! use rowkit::{Mappable, Mutators};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i64,
//!     name: Option<String>,
//! }
//!
//! impl Mappable for Person {
//!     fn mutators() -> Mutators<Self> {
//!         Mutators::new()
//!             .integer("Id", |p: &mut Self, v| p.id = v)
//!             .text("Name", |p: &mut Self, v| p.name = Some(v))
//!     }
//! }
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rusqlite::{Row, Statement};

use crate::error::{Error, Result};
use crate::value::Value;

/// Outcome of invoking a mutator; the error text ends up in
/// [`Error::Mapping`].
pub type MutatorResult<T = ()> = std::result::Result<T, String>;

/// A type that can be populated from a result row.
pub trait Mappable: Default {
    /// Builds the mutator registry for this type.
    ///
    /// Called once per query, not once per row.
    fn mutators() -> Mutators<Self>;

    /// Creates the blank instance a row is applied to.
    ///
    /// # Errors
    ///
    /// An error message fails the whole query with [`Error::Mapping`].
    fn instantiate() -> std::result::Result<Self, String> {
        Ok(Self::default())
    }
}

/// Parameter kind a mutator declares, which drives value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `i64`: integers, truncated reals and numeric text.
    Integer,
    /// `f32`: integers, reals and numeric text.
    Float,
    /// `f64`: integers, reals and numeric text.
    Double,
    /// `bool`: non-zero numbers and `true`/`false`/`1`/`0` text.
    Boolean,
    /// The column's own [`Value`], unconverted.
    Native,
}

type Setter<T, V> = Box<dyn Fn(&mut T, V) -> MutatorResult + Send + Sync>;

enum Apply<T> {
    Integer(Setter<T, i64>),
    Float(Setter<T, f32>),
    Double(Setter<T, f64>),
    Boolean(Setter<T, bool>),
    Native(Setter<T, Value>),
}

/// A named mutator of `T`.
pub struct Mutator<T> {
    name: String,
    key: String,
    apply: Apply<T>,
}

impl<T> Mutator<T> {
    /// Mutator name, `set` followed by the property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter kind.
    pub const fn coercion(&self) -> Coercion {
        match self.apply {
            Apply::Integer(_) => Coercion::Integer,
            Apply::Float(_) => Coercion::Float,
            Apply::Double(_) => Coercion::Double,
            Apply::Boolean(_) => Coercion::Boolean,
            Apply::Native(_) => Coercion::Native,
        }
    }

    fn invoke(&self, target: &mut T, raw: ValueRef<'_>) -> MutatorResult {
        match &self.apply {
            Apply::Integer(set) => set(target, coerce_integer(raw)?),
            #[allow(clippy::cast_possible_truncation)]
            Apply::Float(set) => set(target, coerce_double(raw)? as f32),
            Apply::Double(set) => set(target, coerce_double(raw)?),
            Apply::Boolean(set) => set(target, coerce_boolean(raw)?),
            Apply::Native(set) => set(target, Value::from(raw)),
        }
    }
}

impl<T> fmt::Debug for Mutator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("name", &self.name)
            .field("coercion", &self.coercion())
            .finish_non_exhaustive()
    }
}

/// Registry of the mutators of `T`, in registration order.
///
/// When two mutators match the same column the one registered first wins.
pub struct Mutators<T> {
    entries: Vec<Mutator<T>>,
}

impl<T> Default for Mutators<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Mutators<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

impl<T: 'static> Mutators<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered mutators, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Mutator<T>> {
        self.entries.iter()
    }

    /// Finds the first mutator named `set<column>`, ignoring case.
    pub fn for_column(&self, column: &str) -> Option<&Mutator<T>> {
        let key = format!("set{column}").to_lowercase();
        self.entries.iter().find(|mutator| mutator.key == key)
    }

    fn push(mut self, property: &str, apply: Apply<T>) -> Self {
        let name = format!("set{property}");
        self.entries.push(Mutator {
            key: name.to_lowercase(),
            name,
            apply,
        });
        self
    }

    /// Registers `set<property>` taking an integer.
    #[must_use]
    pub fn integer(self, property: &str, set: impl Fn(&mut T, i64) + Send + Sync + 'static) -> Self {
        self.push(
            property,
            Apply::Integer(Box::new(move |t: &mut T, v: i64| {
                set(t, v);
                Ok(())
            })),
        )
    }

    /// Registers `set<property>` taking a single-precision float.
    #[must_use]
    pub fn float(self, property: &str, set: impl Fn(&mut T, f32) + Send + Sync + 'static) -> Self {
        self.push(
            property,
            Apply::Float(Box::new(move |t: &mut T, v: f32| {
                set(t, v);
                Ok(())
            })),
        )
    }

    /// Registers `set<property>` taking a double-precision float.
    #[must_use]
    pub fn double(self, property: &str, set: impl Fn(&mut T, f64) + Send + Sync + 'static) -> Self {
        self.push(
            property,
            Apply::Double(Box::new(move |t: &mut T, v: f64| {
                set(t, v);
                Ok(())
            })),
        )
    }

    /// Registers `set<property>` taking a boolean.
    #[must_use]
    pub fn boolean(self, property: &str, set: impl Fn(&mut T, bool) + Send + Sync + 'static) -> Self {
        self.push(
            property,
            Apply::Boolean(Box::new(move |t: &mut T, v: bool| {
                set(t, v);
                Ok(())
            })),
        )
    }

    /// Registers `set<property>` taking the column's native value.
    ///
    /// The mutator may reject the value; the message is reported as
    /// [`Error::Mapping`].
    #[must_use]
    pub fn native(
        self,
        property: &str,
        set: impl Fn(&mut T, Value) -> MutatorResult + Send + Sync + 'static,
    ) -> Self {
        self.push(property, Apply::Native(Box::new(set)))
    }

    /// Registers `set<property>` taking text. Other native kinds are
    /// rejected.
    #[must_use]
    pub fn text(self, property: &str, set: impl Fn(&mut T, String) + Send + Sync + 'static) -> Self {
        self.native(property, move |t, value| match value {
            Value::Text(v) => {
                set(t, v);
                Ok(())
            }
            other => Err(mismatch("text", &other)),
        })
    }

    /// Registers `set<property>` taking bytes. Other native kinds are
    /// rejected.
    #[must_use]
    pub fn blob(self, property: &str, set: impl Fn(&mut T, Vec<u8>) + Send + Sync + 'static) -> Self {
        self.native(property, move |t, value| match value {
            Value::Blob(v) => {
                set(t, v);
                Ok(())
            }
            other => Err(mismatch("blob", &other)),
        })
    }

    /// Registers `set<property>` taking a timestamp parsed from text.
    #[must_use]
    pub fn timestamp(
        self,
        property: &str,
        set: impl Fn(&mut T, NaiveDateTime) + Send + Sync + 'static,
    ) -> Self {
        self.native(property, move |t, value| {
            let ts = value
                .as_timestamp()
                .ok_or_else(|| mismatch("timestamp", &value))?;
            set(t, ts);
            Ok(())
        })
    }
}

fn mismatch(expected: &str, found: &Value) -> String {
    let found = match found {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Timestamp(_) => "timestamp",
        Value::Blob(_) => "blob",
    };
    format!("expected {expected}, found {found}")
}

fn coerce_integer(raw: ValueRef<'_>) -> MutatorResult<i64> {
    match raw {
        ValueRef::Integer(v) => Ok(v),
        ValueRef::Real(v) => truncate(v),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?.trim();
            text.parse::<i64>().or_else(|_| {
                text.parse::<f64>()
                    .map_err(|_| format!("expected integer, found text `{text}`"))
                    .and_then(truncate)
            })
        }
        other => Err(format!("expected integer, found {}", other.data_type())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate(v: f64) -> MutatorResult<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Ok(v.trunc() as i64)
    } else {
        Err(format!("real {v} does not fit an integer"))
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce_double(raw: ValueRef<'_>) -> MutatorResult<f64> {
    match raw {
        ValueRef::Integer(v) => Ok(v as f64),
        ValueRef::Real(v) => Ok(v),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?.trim();
            text.parse::<f64>()
                .map_err(|_| format!("expected real, found text `{text}`"))
        }
        other => Err(format!("expected real, found {}", other.data_type())),
    }
}

fn coerce_boolean(raw: ValueRef<'_>) -> MutatorResult<bool> {
    match raw {
        ValueRef::Integer(v) => Ok(v != 0),
        ValueRef::Real(v) => Ok(v != 0.0),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(format!("expected boolean, found text `{other}`")),
            }
        }
        other => Err(format!("expected boolean, found {}", other.data_type())),
    }
}

/// Column → mutator resolution for one query.
pub(crate) struct MappingPlan<'m, T> {
    slots: Vec<(String, Option<&'m Mutator<T>>)>,
}

impl<'m, T: 'static> MappingPlan<'m, T> {
    /// Resolves every column of `stmt` against `mutators`, from the
    /// statement metadata.
    pub(crate) fn new(stmt: &Statement<'_>, mutators: &'m Mutators<T>) -> Self {
        let slots = stmt
            .column_names()
            .into_iter()
            .map(|column| (column.to_string(), mutators.for_column(column)))
            .collect();
        Self { slots }
    }
}

/// Creates a `T` and applies every non-null column that has a mutator.
pub(crate) fn map_row<T: Mappable + 'static>(row: &Row<'_>, plan: &MappingPlan<'_, T>) -> Result<T> {
    let mut target = T::instantiate()
        .map_err(|message| Error::mapping::<T>(format!("instantiation failed: {message}")))?;
    for (idx, (column, mutator)) in plan.slots.iter().enumerate() {
        let Some(mutator) = mutator else {
            continue;
        };
        let raw = row
            .get_ref(idx)
            .map_err(|err| Error::mapping::<T>(format!("column `{column}`: {err}")))?;
        if raw == ValueRef::Null {
            continue;
        }
        mutator.invoke(&mut target, raw).map_err(|message| {
            Error::mapping::<T>(format!("{} for column `{column}`: {message}", mutator.name))
        })?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use test_case::test_case;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: Option<String>,
        score: f32,
        active: bool,
        photo: Option<Vec<u8>>,
    }

    impl Mappable for Person {
        fn mutators() -> Mutators<Self> {
            Mutators::new()
                .integer("Id", |p: &mut Self, v| p.id = v)
                .text("Name", |p: &mut Self, v| p.name = Some(v))
                .float("Score", |p: &mut Self, v| p.score = v)
                .boolean("Active", |p: &mut Self, v| p.active = v)
                .blob("Photo", |p: &mut Self, v| p.photo = Some(v))
        }
    }

    fn map_all<T: Mappable + 'static>(conn: &Connection, sql: &str) -> Result<Vec<T>> {
        let mutators = T::mutators();
        let mut stmt = conn.prepare(sql).expect("prepare");
        let plan = MappingPlan::new(&stmt, &mutators);
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().expect("step") {
            out.push(map_row(row, &plan)?);
        }
        Ok(out)
    }

    #[test]
    fn test_maps_columns_case_insensitively() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        let people: Vec<Person> = map_all(
            &conn,
            "SELECT 7 AS ID, 'ann' AS name, 1.5 AS SCORE, 'true' AS active, x'01' AS photo",
        )
        .expect("map");
        assert_eq!(
            people,
            vec![Person {
                id: 7,
                name: Some("ann".to_string()),
                score: 1.5,
                active: true,
                photo: Some(vec![1]),
            }]
        );
    }

    #[test]
    fn test_null_and_unknown_columns_are_skipped() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        let people: Vec<Person> =
            map_all(&conn, "SELECT 3 AS id, NULL AS name, 'x' AS nickname").expect("map");
        assert_eq!(
            people,
            vec![Person {
                id: 3,
                ..Person::default()
            }]
        );
    }

    #[test]
    fn test_first_registered_mutator_wins() {
        #[derive(Debug, Default)]
        struct Tagged {
            via: &'static str,
        }

        impl Mappable for Tagged {
            fn mutators() -> Mutators<Self> {
                Mutators::new()
                    .text("TAG", |t: &mut Self, _| t.via = "first")
                    .text("tag", |t: &mut Self, _| t.via = "second")
            }
        }

        let conn = Connection::open_in_memory().expect("open in-memory db");
        let rows: Vec<Tagged> = map_all(&conn, "SELECT 'x' AS Tag").expect("map");
        assert_eq!(rows[0].via, "first");
    }

    #[test]
    fn test_coercion_mismatch_is_mapping_error() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        let err = map_all::<Person>(&conn, "SELECT 'abc' AS id").expect_err("must fail");
        assert!(matches!(err, Error::Mapping { .. }));

        let err = map_all::<Person>(&conn, "SELECT 42 AS name").expect_err("must fail");
        match err {
            Error::Mapping { message, .. } => {
                assert!(message.contains("setName"), "{message}");
                assert!(message.contains("expected text, found integer"), "{message}");
            }
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_instantiation_failure_is_mapping_error() {
        #[derive(Debug, Default)]
        struct Locked;

        impl Mappable for Locked {
            fn mutators() -> Mutators<Self> {
                Mutators::new()
            }

            fn instantiate() -> std::result::Result<Self, String> {
                Err("no blank instance".to_string())
            }
        }

        let conn = Connection::open_in_memory().expect("open in-memory db");
        let err = map_all::<Locked>(&conn, "SELECT 1").expect_err("must fail");
        assert!(matches!(err, Error::Mapping { ref message, .. } if message.contains("no blank instance")));
    }

    #[test_case(ValueRef::Integer(5) => Ok(5))]
    #[test_case(ValueRef::Real(5.9) => Ok(5))]
    #[test_case(ValueRef::Real(-5.9) => Ok(-5))]
    #[test_case(ValueRef::Text(b" 12 ") => Ok(12))]
    #[test_case(ValueRef::Text(b"12.7") => Ok(12))]
    #[test_case(ValueRef::Real(f64::NAN) => Err("real NaN does not fit an integer".to_string()))]
    #[test_case(ValueRef::Blob(b"\x01") => Err("expected integer, found Blob".to_string()))]
    fn test_coerce_integer(raw: ValueRef<'_>) -> MutatorResult<i64> {
        coerce_integer(raw)
    }

    #[test_case(ValueRef::Integer(0) => Ok(false))]
    #[test_case(ValueRef::Integer(-3) => Ok(true))]
    #[test_case(ValueRef::Real(0.5) => Ok(true))]
    #[test_case(ValueRef::Text(b"FALSE") => Ok(false))]
    #[test_case(ValueRef::Text(b"1") => Ok(true))]
    #[test_case(ValueRef::Text(b"maybe") => Err("expected boolean, found text `maybe`".to_string()))]
    fn test_coerce_boolean(raw: ValueRef<'_>) -> MutatorResult<bool> {
        coerce_boolean(raw)
    }

    #[test]
    fn test_coerce_double() {
        assert_eq!(coerce_double(ValueRef::Integer(2)), Ok(2.0));
        assert_eq!(coerce_double(ValueRef::Text(b"2.25")), Ok(2.25));
        assert!(coerce_double(ValueRef::Text(b"two")).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let mutators = Person::mutators();
        let names: Vec<&str> = mutators.iter().map(Mutator::name).collect();
        assert_eq!(names, ["setId", "setName", "setScore", "setActive", "setPhoto"]);
        assert_eq!(
            mutators.for_column("SCORE").map(Mutator::coercion),
            Some(Coercion::Float)
        );
        assert!(mutators.for_column("nickname").is_none());
    }
}
