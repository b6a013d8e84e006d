//! Actions and their validation.
//!
//! An action is a tagged value describing an intended state change. Every
//! action must be a plain record carrying a string discriminant; the store
//! rejects anything else before the reducer runs.
//!
//! The store also dispatches a small set of reserved actions on its own
//! ([`InternalAction`]). Their discriminants carry a random suffix generated
//! once per process so they never match an application-defined type. Reducers
//! must treat them like any other unrecognised action.
//!
//! # Examples
//!
//! ```
//! use unistore_core::action::{Action, ActionError, ValueShape};
//! use serde_json::json;
//!
//! assert_eq!(json!({ "type": "todos/add" }).validate(), Ok("todos/add"));
//! assert_eq!(json!({}).validate(), Err(ActionError::MissingType));
//! assert_eq!(
//!     json!("not-a-record").validate(),
//!     Err(ActionError::NotPlainRecord(ValueShape::String)),
//! );
//! ```

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Name of the discriminant field on JSON actions
pub const TYPE_FIELD: &str = "type";

/// Prefix shared by every reserved discriminant
pub const RESERVED_PREFIX: &str = "@@store/";

static INIT: LazyLock<String> = LazyLock::new(|| reserved("INIT"));
static REPLACE: LazyLock<String> = LazyLock::new(|| reserved("REPLACE"));
static PROBE_UNKNOWN_ACTION: LazyLock<String> =
    LazyLock::new(|| reserved("PROBE_UNKNOWN_ACTION"));

fn reserved(name: &str) -> String {
    format!("{RESERVED_PREFIX}{name}{}", random_suffix())
}

/// Six random lowercase alphanumerics, each preceded by a dot: `.k.3.x.q.9.a`
fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .fold(String::with_capacity(12), |mut suffix, c| {
            suffix.push('.');
            suffix.push(c);
            suffix
        })
}

/// Structural kind of a value, used for validation and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// Absent or null
    Null,
    /// A boolean
    Bool,
    /// A number
    Number,
    /// A string
    String,
    /// A sequence
    Array,
    /// A plain keyed record
    Record,
}

impl ValueShape {
    /// Classify a JSON value
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Record,
        }
    }

    /// Whether this is a plain keyed record
    #[must_use]
    pub const fn is_record(self) -> bool {
        matches!(self, Self::Record)
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Record => "record",
        };
        f.write_str(name)
    }
}

/// Reasons an action is rejected before reaching the reducer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// The action is not a plain keyed record
    #[error("actions must be plain records, but the actual shape was `{0}`")]
    NotPlainRecord(ValueShape),

    /// The action has no discriminant
    #[error("actions may not have an undefined \"type\" field; check that the action type is spelled correctly")]
    MissingType,

    /// The discriminant exists but is not a string
    #[error("action \"type\" must be a string, but the actual shape was `{0}`")]
    TypeNotString(ValueShape),
}

/// Actions the store dispatches on its own
///
/// - `Init`: dispatched once when a store is created
/// - `Replace`: dispatched after the reducer is swapped
/// - `ProbeUnknown`: sent by keyed combination to check that every slice
///   reducer handles unknown actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalAction {
    /// Store initialization
    Init,
    /// Reducer replacement
    Replace,
    /// Unknown-action probe
    ProbeUnknown,
}

impl InternalAction {
    /// The reserved discriminant for this action in the current process
    #[must_use]
    pub fn action_type(self) -> &'static str {
        match self {
            Self::Init => INIT.as_str(),
            Self::Replace => REPLACE.as_str(),
            Self::ProbeUnknown => PROBE_UNKNOWN_ACTION.as_str(),
        }
    }

    /// Recognise a reserved discriminant
    #[must_use]
    pub fn from_action_type(action_type: &str) -> Option<Self> {
        [Self::Init, Self::Replace, Self::ProbeUnknown]
            .into_iter()
            .find(|kind| kind.action_type() == action_type)
    }
}

impl fmt::Display for InternalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_type())
    }
}

/// A tagged value that can be dispatched to a store
///
/// Implemented for `serde_json::Value` (a JSON object with a string `"type"`
/// field). Application enums implement it directly and carry a variant for
/// [`InternalAction`]s.
///
/// # Example
///
/// ```
/// use unistore_core::action::{Action, ActionError, InternalAction};
///
/// enum CounterAction {
///     Increment,
///     Internal(InternalAction),
/// }
///
/// impl Action for CounterAction {
///     fn action_type(&self) -> Result<&str, ActionError> {
///         Ok(match self {
///             Self::Increment => "counter/increment",
///             Self::Internal(kind) => kind.action_type(),
///         })
///     }
///
///     fn internal(kind: InternalAction) -> Self {
///         Self::Internal(kind)
///     }
/// }
/// ```
pub trait Action: Sized {
    /// Structural kind of this value
    ///
    /// Typed actions are always records.
    fn shape(&self) -> ValueShape {
        ValueShape::Record
    }

    /// The discriminant of this action
    ///
    /// # Errors
    ///
    /// [`ActionError::MissingType`] or [`ActionError::TypeNotString`] when the
    /// discriminant is absent or malformed.
    fn action_type(&self) -> Result<&str, ActionError>;

    /// Build one of the store's reserved actions
    fn internal(kind: InternalAction) -> Self;

    /// Check that this action may be dispatched, returning its discriminant
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotPlainRecord`] for anything that is not a
    /// record, then any error from [`Action::action_type`].
    fn validate(&self) -> Result<&str, ActionError> {
        let shape = self.shape();
        if !shape.is_record() {
            return Err(ActionError::NotPlainRecord(shape));
        }
        self.action_type()
    }

    /// Whether this is one of the store's reserved actions
    fn internal_kind(&self) -> Option<InternalAction> {
        self.action_type()
            .ok()
            .and_then(InternalAction::from_action_type)
    }
}

impl Action for Value {
    fn shape(&self) -> ValueShape {
        ValueShape::of(self)
    }

    fn action_type(&self) -> Result<&str, ActionError> {
        match self.get(TYPE_FIELD) {
            None | Some(Value::Null) => Err(ActionError::MissingType),
            Some(Value::String(action_type)) => Ok(action_type.as_str()),
            Some(other) => Err(ActionError::TypeNotString(ValueShape::of(other))),
        }
    }

    fn internal(kind: InternalAction) -> Self {
        json_action(kind.action_type())
    }
}

/// Build a payload-free JSON action: `{ "type": action_type }`
#[must_use]
pub fn json_action(action_type: &str) -> Value {
    let mut record = serde_json::Map::with_capacity(1);
    record.insert(TYPE_FIELD.to_owned(), Value::String(action_type.to_owned()));
    Value::Object(record)
}
