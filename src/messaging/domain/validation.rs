//! Registration-time validation of payload types.

use super::{Shape, TypeDescriptor};
use std::fmt;
use thiserror::Error;

/// Reason a payload type was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeValidationErrorKind {
    /// The type encodes as a bare scalar, including unit-only enums.
    ScalarType,
    /// The type is a top-level sequence, tuple, or byte array.
    ArrayType,
    /// The decoder has nothing it could construct the type from.
    MissingDefaultConstructor,
    /// The type's concrete shape is only resolved per message.
    UnresolvableGeneric,
    /// The type's `Deserialize` impl failed during introspection.
    CodecIntrospectionFailure,
}

impl TypeValidationErrorKind {
    /// Returns the canonical name of the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScalarType => "scalar_type",
            Self::ArrayType => "array_type",
            Self::MissingDefaultConstructor => "missing_default_constructor",
            Self::UnresolvableGeneric => "unresolvable_generic",
            Self::CodecIntrospectionFailure => "codec_introspection_failure",
        }
    }
}

impl fmt::Display for TypeValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when a rejected type is used to build a message type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("type `{type_name}` cannot be used as a message payload ({kind}): {message}")]
pub struct TypeValidationError {
    /// Fully qualified name of the rejected type.
    pub type_name: String,
    /// Why the type was rejected.
    pub kind: TypeValidationErrorKind,
    /// Actionable explanation including a wrapper-type example.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rejection {
    kind: TypeValidationErrorKind,
    message: String,
}

/// Outcome of validating a [`TypeDescriptor`].
///
/// The error kind and message are present exactly when the result is
/// invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeValidationResult {
    type_name: String,
    rejection: Option<Rejection>,
}

impl TypeValidationResult {
    fn accepted(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            rejection: None,
        }
    }

    fn rejected(type_name: &str, kind: TypeValidationErrorKind, message: String) -> Self {
        Self {
            type_name: type_name.to_owned(),
            rejection: Some(Rejection { kind, message }),
        }
    }

    /// Returns `true` when the type can be used as a payload.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }

    /// Returns the fully qualified name of the validated type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the rejection kind for invalid types.
    #[must_use]
    pub fn error_kind(&self) -> Option<TypeValidationErrorKind> {
        self.rejection.as_ref().map(|rejection| rejection.kind)
    }

    /// Returns the rejection message for invalid types.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.rejection
            .as_ref()
            .map(|rejection| rejection.message.as_str())
    }

    /// Converts the result into a `Result`, failing for rejected types.
    ///
    /// # Errors
    ///
    /// Returns [`TypeValidationError`] when the type was rejected.
    pub fn into_result(self) -> Result<(), TypeValidationError> {
        match self.rejection {
            None => Ok(()),
            Some(Rejection { kind, message }) => Err(TypeValidationError {
                type_name: self.type_name,
                kind,
                message,
            }),
        }
    }
}

/// Classifies payload types as usable or rejected.
///
/// Validation is a pure function of the descriptor: the same descriptor
/// always yields the same result.
///
/// # Examples
///
/// ```
/// use courier::messaging::domain::{TypeDescriptor, TypeValidationErrorKind, TypeValidator};
///
/// let result = TypeValidator::new().validate(&TypeDescriptor::of::<u64>());
/// assert_eq!(result.error_kind(), Some(TypeValidationErrorKind::ScalarType));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeValidator;

impl TypeValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a structural type descriptor.
    #[must_use]
    pub fn validate(&self, descriptor: &TypeDescriptor) -> TypeValidationResult {
        let type_name = descriptor.type_name();
        let short = descriptor.short_name();
        match descriptor.shape() {
            Shape::Enum { variants, .. } if variants.is_empty() => {
                uninhabited_enum(type_name, &short)
            }
            Shape::Struct { .. } | Shape::Enum { .. } | Shape::TaggedEnum { .. } | Shape::Map => {
                TypeValidationResult::accepted(type_name)
            }
            Shape::UnitEnum { .. } => TypeValidationResult::rejected(
                type_name,
                TypeValidationErrorKind::ScalarType,
                format!(
                    "`{short}` has only unit variants and encodes as a bare string; \
                     wrap it in a single-field struct, e.g. \
                     `#[derive(Serialize, Deserialize)] struct Wrapped {{ value: {short} }}`"
                ),
            ),
            Shape::Scalar(kind) => TypeValidationResult::rejected(
                type_name,
                TypeValidationErrorKind::ScalarType,
                format!(
                    "`{short}` is a bare {kind} scalar and has no fields to introspect; \
                     wrap it in a single-field struct, e.g. \
                     `#[derive(Serialize, Deserialize)] struct Wrapped {{ value: {short} }}`"
                ),
            ),
            Shape::Sequence | Shape::Tuple { .. } | Shape::TupleStruct { .. } | Shape::Bytes => {
                TypeValidationResult::rejected(
                    type_name,
                    TypeValidationErrorKind::ArrayType,
                    format!(
                        "`{short}` encodes as a top-level array; \
                         wrap it in a single-field struct, e.g. \
                         `#[derive(Serialize, Deserialize)] struct Wrapped {{ items: {short} }}`"
                    ),
                )
            }
            Shape::Unit | Shape::UnitStruct { .. } => TypeValidationResult::rejected(
                type_name,
                TypeValidationErrorKind::MissingDefaultConstructor,
                format!(
                    "`{short}` carries no fields, so the decoder has nothing to construct it from; \
                     give it at least one field, e.g. \
                     `#[derive(Serialize, Deserialize)] struct Wrapped {{ sent_at: String }}`"
                ),
            ),
            Shape::SelfDescribing { expecting } => TypeValidationResult::rejected(
                type_name,
                TypeValidationErrorKind::UnresolvableGeneric,
                format!(
                    "`{short}` only resolves its shape from each message (expects {expecting}); \
                     bind the payload to a concrete struct, e.g. \
                     `#[derive(Serialize, Deserialize)] struct Wrapped {{ id: String, amount: u64 }}`"
                ),
            ),
            Shape::Opaque { reason } => TypeValidationResult::rejected(
                type_name,
                TypeValidationErrorKind::CodecIntrospectionFailure,
                reason.clone(),
            ),
        }
    }

    /// Describes and validates `T` in one step.
    #[must_use]
    pub fn validate_type<T: serde::de::DeserializeOwned>(&self) -> TypeValidationResult {
        self.validate(&TypeDescriptor::of::<T>())
    }
}

fn uninhabited_enum(type_name: &str, short: &str) -> TypeValidationResult {
    TypeValidationResult::rejected(
        type_name,
        TypeValidationErrorKind::MissingDefaultConstructor,
        format!(
            "`{short}` is an enum without variants, so no value of it can ever be constructed; \
             add a variant or use a struct, e.g. \
             `#[derive(Serialize, Deserialize)] struct Wrapped {{ value: String }}`"
        ),
    )
}
