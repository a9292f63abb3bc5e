//! Typed parameter values and enum metadata.

use std::fmt;

use arrayvec::ArrayString;

/// Base type of a controllable parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Bool,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
    Enum,
}

impl ParamType {
    /// Name written in the first field of a serialized column.
    ///
    /// Enum parameters use the name of their [`EnumSpec`] instead.
    pub const fn type_name(self) -> &'static str {
        match self {
            ParamType::Bool => "gboolean",
            ParamType::Int => "gint",
            ParamType::UInt => "guint",
            ParamType::Int64 => "gint64",
            ParamType::UInt64 => "guint64",
            ParamType::Float => "gfloat",
            ParamType::Double => "gdouble",
            ParamType::Enum => "genum",
        }
    }

    /// Parse the textual form of a non-enum value.
    pub fn parse(self, text: &str) -> Option<Value> {
        let text = text.trim();
        match self {
            ParamType::Bool => match text {
                "1" | "true" | "TRUE" => Some(Value::Bool(true)),
                "0" | "false" | "FALSE" => Some(Value::Bool(false)),
                _ => None,
            },
            ParamType::Int => text.parse().ok().map(Value::Int),
            ParamType::UInt => text.parse().ok().map(Value::UInt),
            ParamType::Int64 => text.parse().ok().map(Value::Int64),
            ParamType::UInt64 => text.parse().ok().map(Value::UInt64),
            ParamType::Float => text
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float),
            ParamType::Double => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Double),
            ParamType::Enum => text.parse().ok().map(Value::Enum),
        }
    }

    /// Build a value of this type from a number, rounding integers.
    ///
    /// Used by the numeric column transforms. Enum values are raw integers
    /// here; ordinal mapping happens in [`EnumSpec`].
    pub fn from_f64(self, v: f64) -> Value {
        match self {
            ParamType::Bool => Value::Bool(v >= 0.5),
            ParamType::Int => Value::Int(v.round() as i32),
            ParamType::UInt => Value::UInt(v.round().max(0.0) as u32),
            ParamType::Int64 => Value::Int64(v.round() as i64),
            ParamType::UInt64 => Value::UInt64(v.round().max(0.0) as u64),
            ParamType::Float => Value::Float(v as f32),
            ParamType::Double => Value::Double(v),
            ParamType::Enum => Value::Enum(v.round() as i32),
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            ParamType::Int | ParamType::UInt | ParamType::Int64 | ParamType::UInt64
        )
    }
}

/// A single parameter value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// Raw (possibly sparse) enum value, not its ordinal.
    Enum(i32),
}

impl Value {
    pub const fn param_type(&self) -> ParamType {
        match self {
            Value::Bool(_) => ParamType::Bool,
            Value::Int(_) => ParamType::Int,
            Value::UInt(_) => ParamType::UInt,
            Value::Int64(_) => ParamType::Int64,
            Value::UInt64(_) => ParamType::UInt64,
            Value::Float(_) => ParamType::Float,
            Value::Double(_) => ParamType::Double,
            Value::Enum(_) => ParamType::Enum,
        }
    }

    /// Numeric view; booleans are 0/1.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(v) => v as f64,
            Value::UInt(v) => v as f64,
            Value::Int64(v) => v as f64,
            Value::UInt64(v) => v as f64,
            Value::Float(v) => v as f64,
            Value::Double(v) => v,
            Value::Enum(v) => v as f64,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match *self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", u8::from(*b)),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Enum(v) => write!(f, "{v}"),
        }
    }
}

/// One declared member of an enum parameter type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub value: i32,
    pub nick: ArrayString<16>,
}

/// Declared value list of an enum parameter.
///
/// Values may be sparse (e.g. notes), so editing transforms work on the
/// ordinal position in `values`, never on the raw integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumSpec {
    name: ArrayString<32>,
    values: Vec<EnumValue>,
    is_note: bool,
}

const NOTE_NAMES: [&str; 12] = [
    "c-", "c#", "d-", "d#", "e-", "f-", "f#", "g-", "g#", "a-", "a#", "b-",
];

/// Raw value of the note-off event.
pub const NOTE_OFF: i32 = 255;
/// Raw value of the empty note slot.
pub const NOTE_NONE: i32 = 0;

impl EnumSpec {
    /// Build an enum from `(value, nick)` pairs in declaration order.
    pub fn new(name: &str, values: &[(i32, &str)]) -> Self {
        let mut spec = Self {
            name: short_str(name),
            values: Vec::with_capacity(values.len()),
            is_note: false,
        };
        for &(value, nick) in values {
            spec.values.push(EnumValue {
                value,
                nick: short_str(nick),
            });
        }
        spec
    }

    /// Musical note enum: `c-0` .. `b-9`, then `off`, then the empty slot.
    ///
    /// Raw values are `(octave << 4) + semitone + 1`.
    pub fn note() -> Self {
        let mut spec = Self {
            name: short_str("BtNote"),
            values: Vec::with_capacity(10 * 12 + 2),
            is_note: true,
        };
        for octave in 0..10 {
            for (semitone, name) in NOTE_NAMES.iter().enumerate() {
                let mut nick = ArrayString::new();
                nick.push_str(name);
                nick.push(char::from(b'0' + octave as u8));
                spec.values.push(EnumValue {
                    value: note_value(octave, semitone as i32),
                    nick,
                });
            }
        }
        spec.values.push(EnumValue {
            value: NOTE_OFF,
            nick: short_str("off"),
        });
        spec.values.push(EnumValue {
            value: NOTE_NONE,
            nick: ArrayString::new(),
        });
        spec
    }

    /// Trigger switch enum: `0`, `1`, then the empty slot.
    pub fn trigger_switch() -> Self {
        Self::new("BtTriggerSwitch", &[(0, "0"), (1, "1"), (255, "")])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_note(&self) -> bool {
        self.is_note
    }

    /// Position of a raw value in the declaration list.
    pub fn ordinal_of(&self, value: i32) -> Option<usize> {
        self.values.iter().position(|v| v.value == value)
    }

    /// Raw value at a declaration position.
    pub fn value_at(&self, ordinal: usize) -> Option<i32> {
        self.values.get(ordinal).map(|v| v.value)
    }

    pub fn contains(&self, value: i32) -> bool {
        self.ordinal_of(value).is_some()
    }

    pub fn nick_of(&self, value: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.nick.as_str())
    }

    /// Parse a raw integer or a declared nick (case-insensitive).
    ///
    /// Returns the raw integer even when it is not a declared value, so the
    /// caller can keep it as a pending entry.
    pub fn parse_raw(&self, text: &str) -> Option<i32> {
        let text = text.trim();
        if let Ok(v) = text.parse::<i32>() {
            return Some(v);
        }
        if text.is_empty() {
            return None;
        }
        self.values
            .iter()
            .find(|v| v.nick.eq_ignore_ascii_case(text))
            .map(|v| v.value)
    }

    /// Parse into a declared value.
    pub fn parse(&self, text: &str) -> Option<i32> {
        self.parse_raw(text).filter(|&v| self.contains(v))
    }
}

/// Raw note value for an octave (0-9) and semitone (0-11).
pub const fn note_value(octave: i32, semitone: i32) -> i32 {
    (octave << 4) + semitone + 1
}

fn short_str<const N: usize>(s: &str) -> ArrayString<N> {
    let mut out = ArrayString::new();
    for c in s.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}
