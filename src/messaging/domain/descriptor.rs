//! Structural type descriptors for message payloads.
//!
//! A [`TypeDescriptor`] records the wire shape a payload type asks the
//! decoder for. It is derived by driving the type's `Deserialize` impl
//! against a shape-recording deserializer that aborts on the first
//! structural request, so a value of the type is never constructed during
//! introspection.

use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, Visitor,
};
use std::fmt;
use std::marker::PhantomData;

/// Scalar categories recognised by the shape tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`.
    Bool,
    /// Signed integers (`i8` through `i128`).
    SignedInteger,
    /// Unsigned integers (`u8` through `u128`).
    UnsignedInteger,
    /// Floating point numbers.
    Float,
    /// A single `char`.
    Char,
    /// Strings and string identifiers.
    String,
}

impl ScalarKind {
    /// Returns a short lowercase label for the scalar category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::SignedInteger => "signed integer",
            Self::UnsignedInteger => "unsigned integer",
            Self::Float => "float",
            Self::Char => "char",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape requested by a payload type's `Deserialize` impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A struct with named fields.
    Struct {
        /// Serde name of the struct.
        name: &'static str,
        /// Field names in declaration order.
        fields: &'static [&'static str],
    },
    /// An externally tagged enum with at least one data-carrying variant,
    /// or no variants at all.
    Enum {
        /// Serde name of the enum.
        name: &'static str,
        /// Variant names in declaration order.
        variants: &'static [&'static str],
    },
    /// An externally tagged enum whose variants all carry no data; each
    /// value encodes as a bare string.
    UnitEnum {
        /// Serde name of the enum.
        name: &'static str,
        /// Variant names in declaration order.
        variants: &'static [&'static str],
    },
    /// An internally tagged enum (`#[serde(tag = "...")]`); each value
    /// encodes as an object carrying its tag field.
    TaggedEnum {
        /// Name of the enum as reported by its visitor.
        name: String,
    },
    /// A key/value map.
    Map,
    /// A variable-length sequence.
    Sequence,
    /// A fixed-length tuple.
    Tuple {
        /// Number of tuple elements.
        len: usize,
    },
    /// A tuple struct with more than one field.
    TupleStruct {
        /// Serde name of the tuple struct.
        name: &'static str,
        /// Number of tuple elements.
        len: usize,
    },
    /// A raw byte array.
    Bytes,
    /// A primitive scalar.
    Scalar(ScalarKind),
    /// The unit type `()`.
    Unit,
    /// A struct without fields.
    UnitStruct {
        /// Serde name of the unit struct.
        name: &'static str,
    },
    /// A value whose shape is decided by each input (`deserialize_any`).
    SelfDescribing {
        /// What the type's visitor reports it expects.
        expecting: String,
    },
    /// Introspection failed before any shape was requested.
    Opaque {
        /// Error reported by the type's `Deserialize` impl.
        reason: String,
    },
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Struct { name, fields } => {
                write!(f, "struct {name} with {} field(s)", fields.len())
            }
            Self::Enum { name, variants } => {
                write!(f, "enum {name} with {} variant(s)", variants.len())
            }
            Self::UnitEnum { name, variants } => {
                write!(f, "unit-only enum {name} with {} variant(s)", variants.len())
            }
            Self::TaggedEnum { name } => write!(f, "internally tagged enum {name}"),
            Self::Map => f.write_str("map"),
            Self::Sequence => f.write_str("sequence"),
            Self::Tuple { len } => write!(f, "tuple of {len}"),
            Self::TupleStruct { name, len } => write!(f, "tuple struct {name} of {len}"),
            Self::Bytes => f.write_str("byte array"),
            Self::Scalar(kind) => write!(f, "scalar {kind}"),
            Self::Unit => f.write_str("unit"),
            Self::UnitStruct { name } => write!(f, "unit struct {name}"),
            Self::SelfDescribing { expecting } => write!(f, "self-describing value ({expecting})"),
            Self::Opaque { reason } => write!(f, "opaque ({reason})"),
        }
    }
}

/// Structural description of a payload type, computed once per type.
///
/// # Examples
///
/// ```
/// use courier::messaging::domain::{Shape, TypeDescriptor};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct OrderData {
///     id: String,
///     amount: u64,
/// }
///
/// let descriptor = TypeDescriptor::of::<OrderData>();
/// assert!(matches!(descriptor.shape(), Shape::Struct { fields, .. } if fields.len() == 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_name: &'static str,
    shape: Shape,
    nullable: bool,
    wrappers: Vec<&'static str>,
}

impl TypeDescriptor {
    /// Describes `T` without constructing a value of it.
    #[must_use]
    pub fn of<T: DeserializeOwned>() -> Self {
        let mut state = TraceState::default();
        let outcome = T::deserialize(ShapeTracer { state: &mut state });
        let shape = match (state.shape, outcome) {
            (Some(Shape::Enum { name, variants }), _)
                if !variants.is_empty() && all_unit_variants::<T>(variants.len()) =>
            {
                Shape::UnitEnum { name, variants }
            }
            (Some(shape), _) => shape,
            (None, Err(err)) => Shape::Opaque { reason: err.0 },
            (None, Ok(_)) => Shape::Opaque {
                reason: "Deserialize impl produced a value without reading any input".to_owned(),
            },
        };
        Self {
            type_name: std::any::type_name::<T>(),
            shape,
            nullable: state.nullable,
            wrappers: state.wrappers,
        }
    }

    /// Returns the fully qualified Rust type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name with module paths stripped, including inside
    /// generic arguments (`alloc::vec::Vec<u8>` becomes `Vec<u8>`).
    #[must_use]
    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }

    /// Returns the recorded wire shape.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns `true` when the payload is wrapped in `Option`.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the newtype wrappers looked through, outermost first.
    #[must_use]
    pub fn wrappers(&self) -> &[&'static str] {
        &self.wrappers
    }
}

/// Replays `T`'s `Deserialize` impl once per variant index and reports
/// whether every variant asked for unit content.
fn all_unit_variants<T: DeserializeOwned>(count: usize) -> bool {
    (0..count).all(|position| {
        let Ok(index) = u32::try_from(position) else {
            return false;
        };
        let mut state = TraceState {
            probe_variant: Some(index),
            ..TraceState::default()
        };
        let traced = T::deserialize(ShapeTracer { state: &mut state });
        traced.is_err() && state.unit_variant
    })
}

fn short_type_name(full: &str) -> String {
    let mut short = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            short.push_str(&segment);
            segment.clear();
            short.push(c);
        }
    }
    short.push_str(&segment);
    short
}

#[derive(Debug, Default)]
struct TraceState {
    shape: Option<Shape>,
    nullable: bool,
    wrappers: Vec<&'static str>,
    probe_variant: Option<u32>,
    unit_variant: bool,
}

/// Error raised by the tracer; also carries the sentinel used to stop
/// deserialization once a shape has been recorded.
#[derive(Debug)]
struct TraceError(String);

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TraceError {}

impl de::Error for TraceError {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        Self(msg.to_string())
    }
}

struct ShapeTracer<'a> {
    state: &'a mut TraceState,
}

impl ShapeTracer<'_> {
    fn record<R>(self, shape: Shape) -> Result<R, TraceError> {
        if self.state.shape.is_none() {
            self.state.shape = Some(shape);
        }
        Err(TraceError("shape recorded".to_owned()))
    }
}

/// Renders a visitor's `expecting` message.
struct Expecting<'a, 'de, V: Visitor<'de>>(&'a V, PhantomData<&'de ()>);

impl<'de, V: Visitor<'de>> fmt::Display for Expecting<'_, 'de, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.expecting(f)
    }
}

const INTERNALLY_TAGGED_PREFIX: &str = "internally tagged enum ";

fn self_describing<'de, V: Visitor<'de>>(visitor: &V) -> Shape {
    let expecting = Expecting(visitor, PhantomData).to_string();
    match expecting.strip_prefix(INTERNALLY_TAGGED_PREFIX) {
        Some(name) => Shape::TaggedEnum {
            name: name.to_owned(),
        },
        None => Shape::SelfDescribing { expecting },
    }
}

/// Selects one variant of an enum and records whether it carries data.
struct VariantProbe<'a> {
    index: u32,
    state: &'a mut TraceState,
}

fn variant_recorded<R>() -> Result<R, TraceError> {
    Err(TraceError("variant recorded".to_owned()))
}

impl<'de> de::EnumAccess<'de> for VariantProbe<'_> {
    type Error = TraceError;
    type Variant = Self;

    fn variant_seed<S: DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, Self), TraceError> {
        let index: de::value::U32Deserializer<TraceError> = self.index.into_deserializer();
        let variant = seed.deserialize(index)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for VariantProbe<'_> {
    type Error = TraceError;

    fn unit_variant(self) -> Result<(), TraceError> {
        self.state.unit_variant = true;
        variant_recorded()
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(
        self,
        _seed: S,
    ) -> Result<S::Value, TraceError> {
        variant_recorded()
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, TraceError> {
        variant_recorded()
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, TraceError> {
        variant_recorded()
    }
}

macro_rules! trace_scalars {
    ($($method:ident => $kind:expr),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
                self.record(Shape::Scalar($kind))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ShapeTracer<'_> {
    type Error = TraceError;

    trace_scalars! {
        deserialize_bool => ScalarKind::Bool,
        deserialize_i8 => ScalarKind::SignedInteger,
        deserialize_i16 => ScalarKind::SignedInteger,
        deserialize_i32 => ScalarKind::SignedInteger,
        deserialize_i64 => ScalarKind::SignedInteger,
        deserialize_i128 => ScalarKind::SignedInteger,
        deserialize_u8 => ScalarKind::UnsignedInteger,
        deserialize_u16 => ScalarKind::UnsignedInteger,
        deserialize_u32 => ScalarKind::UnsignedInteger,
        deserialize_u64 => ScalarKind::UnsignedInteger,
        deserialize_u128 => ScalarKind::UnsignedInteger,
        deserialize_f32 => ScalarKind::Float,
        deserialize_f64 => ScalarKind::Float,
        deserialize_char => ScalarKind::Char,
        deserialize_str => ScalarKind::String,
        deserialize_string => ScalarKind::String,
        deserialize_identifier => ScalarKind::String,
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.record(self_describing(&visitor))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.record(self_describing(&visitor))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.record(Shape::Bytes)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.record(Shape::Bytes)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.state.nullable = true;
        visitor.visit_some(ShapeTracer { state: self.state })
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.record(Shape::Unit)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.record(Shape::UnitStruct { name })
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.state.wrappers.push(name);
        visitor.visit_newtype_struct(ShapeTracer { state: self.state })
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.record(Shape::Sequence)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.record(Shape::Tuple { len })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.record(Shape::TupleStruct { name, len })
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.record(Shape::Map)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.record(Shape::Struct { name, fields })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.state.probe_variant {
            Some(index) => visitor.visit_enum(VariantProbe {
                index,
                state: self.state,
            }),
            None => self.record(Shape::Enum { name, variants }),
        }
    }

    fn is_human_readable(&self) -> bool {
        true
    }
}
