//! Parameter metadata for machines and wires.

use std::sync::Arc;

use arrayvec::ArrayString;
use rand::Rng;

use crate::error::{check_index, EditError, EditResult};
use crate::value::{EnumSpec, ParamType, Value, NOTE_NONE};

/// Description of one controllable parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescriptor {
    name: ArrayString<32>,
    ty: ParamType,
    enum_spec: Option<Arc<EnumSpec>>,
    min: Value,
    max: Value,
    default: Value,
    no_value: Option<Value>,
    trigger: bool,
}

impl ParameterDescriptor {
    fn with_range(name: &str, min: Value, max: Value, default: Value) -> Self {
        let mut n = ArrayString::new();
        for c in name.chars() {
            if n.try_push(c).is_err() {
                break;
            }
        }
        Self {
            name: n,
            ty: default.param_type(),
            enum_spec: None,
            min,
            max,
            default,
            no_value: None,
            trigger: false,
        }
    }

    pub fn bool(name: &str, default: bool) -> Self {
        Self::with_range(name, Value::Bool(false), Value::Bool(true), Value::Bool(default))
    }

    pub fn int(name: &str, min: i32, max: i32, default: i32) -> Self {
        Self::with_range(name, Value::Int(min), Value::Int(max), Value::Int(default))
    }

    pub fn uint(name: &str, min: u32, max: u32, default: u32) -> Self {
        Self::with_range(name, Value::UInt(min), Value::UInt(max), Value::UInt(default))
    }

    pub fn int64(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self::with_range(name, Value::Int64(min), Value::Int64(max), Value::Int64(default))
    }

    pub fn uint64(name: &str, min: u64, max: u64, default: u64) -> Self {
        Self::with_range(name, Value::UInt64(min), Value::UInt64(max), Value::UInt64(default))
    }

    pub fn float(name: &str, min: f32, max: f32, default: f32) -> Self {
        Self::with_range(name, Value::Float(min), Value::Float(max), Value::Float(default))
    }

    pub fn double(name: &str, min: f64, max: f64, default: f64) -> Self {
        Self::with_range(name, Value::Double(min), Value::Double(max), Value::Double(default))
    }

    /// Enum parameter; `default` is a raw declared value.
    pub fn enumeration(name: &str, spec: Arc<EnumSpec>, default: i32) -> Self {
        let first = spec.value_at(0).unwrap_or(default);
        let last = spec.value_at(spec.len().saturating_sub(1)).unwrap_or(default);
        let mut desc = Self::with_range(name, Value::Enum(first), Value::Enum(last), Value::Enum(default));
        desc.enum_spec = Some(spec);
        desc
    }

    /// Note trigger whose empty slot is the no-value.
    pub fn note(name: &str) -> Self {
        Self::enumeration(name, Arc::new(EnumSpec::note()), NOTE_NONE)
            .trigger()
            .with_no_value(Value::Enum(NOTE_NONE))
    }

    /// On/off trigger switch whose empty slot is the no-value.
    pub fn switch(name: &str) -> Self {
        Self::enumeration(name, Arc::new(EnumSpec::trigger_switch()), 255)
            .trigger()
            .with_no_value(Value::Enum(255))
    }

    /// Mark as a trigger: absence at a tick means "nothing happened".
    pub fn trigger(mut self) -> Self {
        self.trigger = true;
        self
    }

    pub fn with_no_value(mut self, no_value: Value) -> Self {
        self.no_value = Some(no_value);
        self
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    pub fn enum_spec(&self) -> Option<&EnumSpec> {
        self.enum_spec.as_deref()
    }

    pub fn min(&self) -> Value {
        self.min
    }

    pub fn max(&self) -> Value {
        self.max
    }

    pub fn default_value(&self) -> Value {
        self.default
    }

    pub fn is_trigger(&self) -> bool {
        self.trigger
    }

    /// Sentinel meaning "absent". Triggers without an explicit one use
    /// their declared default.
    pub fn no_value(&self) -> Option<Value> {
        match self.no_value {
            Some(v) => Some(v),
            None if self.trigger => Some(self.default),
            None => None,
        }
    }

    pub fn is_no_value(&self, value: &Value) -> bool {
        self.no_value().is_some_and(|nv| nv == *value)
    }

    /// Name used in serialized columns.
    pub fn type_name(&self) -> &str {
        match &self.enum_spec {
            Some(spec) => spec.name(),
            None => self.ty.type_name(),
        }
    }

    // --- Text conversion ---

    /// Parse into a valid value of this parameter's type.
    pub fn parse(&self, text: &str) -> Option<Value> {
        match &self.enum_spec {
            Some(spec) => spec.parse(text).map(Value::Enum),
            None => self.ty.parse(text),
        }
    }

    /// Parse into the plain (shadow) representation. For enums this accepts
    /// any integer, declared or not.
    pub fn parse_plain(&self, text: &str) -> Option<Value> {
        match &self.enum_spec {
            Some(spec) => spec.parse_raw(text).map(Value::Enum),
            None => self.ty.parse(text),
        }
    }

    /// Whether a value has this parameter's type (and is declared, for enums).
    pub fn accepts(&self, value: &Value) -> bool {
        if value.param_type() != self.ty {
            return false;
        }
        match (&self.enum_spec, value) {
            (Some(spec), Value::Enum(v)) => spec.contains(*v),
            _ => true,
        }
    }

    /// Human-readable form, e.g. note names.
    pub fn describe(&self, value: &Value) -> String {
        match (&self.enum_spec, value) {
            (Some(spec), Value::Enum(v)) => match spec.nick_of(*v) {
                Some(nick) => nick.to_string(),
                None => value.to_string(),
            },
            _ => value.to_string(),
        }
    }

    /// Uniform random value over the declared range.
    ///
    /// Enums draw an ordinal from all but the last declared slot, which is
    /// reserved for the empty value.
    pub fn random_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match (&self.enum_spec, self.ty) {
            (Some(spec), _) => {
                let slots = spec.len().saturating_sub(1).max(1);
                let ordinal = rng.gen_range(0..slots);
                Value::Enum(spec.value_at(ordinal).unwrap_or(0))
            }
            (None, ParamType::Bool) => Value::Bool(rng.gen_bool(0.5)),
            (None, ty) if ty.is_integral() => {
                let (lo, hi) = (self.min.as_f64(), self.max.as_f64());
                if hi <= lo {
                    return self.min;
                }
                ty.from_f64(rng.gen_range(lo..=hi))
            }
            (None, ty) => {
                let (lo, hi) = (self.min.as_f64(), self.max.as_f64());
                ty.from_f64(lo + (hi - lo) * rng.gen::<f64>())
            }
        }
    }
}

/// Ordered, immutable list of parameter descriptors.
///
/// Group identity matters: patterns map a group back to their own store by
/// pointer, so each voice of a machine gets its own `Arc<ParameterGroup>`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterGroup {
    params: Vec<ParameterDescriptor>,
}

impl ParameterGroup {
    pub fn new(params: Vec<ParameterDescriptor>) -> Self {
        Self { params }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name() == name)
    }

    pub fn spec(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.params.get(index)
    }

    pub fn is_trigger(&self, index: usize) -> bool {
        self.params.get(index).is_some_and(|p| p.is_trigger())
    }

    pub fn no_value(&self, index: usize) -> Option<Value> {
        self.params.get(index).and_then(|p| p.no_value())
    }

    pub fn is_no_value(&self, index: usize, value: &Value) -> bool {
        self.params.get(index).is_some_and(|p| p.is_no_value(value))
    }

    pub fn default_value(&self, index: usize) -> Option<Value> {
        self.params.get(index).map(|p| p.default_value())
    }

    pub fn describe(&self, index: usize, value: &Value) -> Option<String> {
        self.params.get(index).map(|p| p.describe(value))
    }

    pub fn random_value<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<Value> {
        self.params.get(index).map(|p| p.random_value(rng))
    }
}

/// Machine-owned "current default" layer over a group's declared defaults.
#[derive(Clone, Debug)]
pub struct ParamDefaults {
    group: Arc<ParameterGroup>,
    overrides: Vec<Option<Value>>,
}

impl ParamDefaults {
    pub fn new(group: Arc<ParameterGroup>) -> Self {
        let overrides = vec![None; group.len()];
        Self { group, overrides }
    }

    pub fn group(&self) -> &Arc<ParameterGroup> {
        &self.group
    }

    /// Current default: the override if present, else the declared default.
    pub fn get(&self, index: usize) -> Option<Value> {
        match self.overrides.get(index) {
            Some(Some(v)) => Some(*v),
            Some(None) => self.group.default_value(index),
            None => None,
        }
    }

    pub fn set_default(&mut self, index: usize, value: Value) -> EditResult<()> {
        check_index("param", index, self.overrides.len())?;
        let desc = &self.group.params[index];
        if !desc.accepts(&value) {
            return Err(EditError::type_mismatch(desc.type_name(), &value.to_string()));
        }
        self.overrides[index] = Some(value);
        Ok(())
    }

    /// Set every default at once. Nothing changes if any value is rejected.
    pub fn set_defaults(&mut self, values: &[Value]) -> EditResult<()> {
        if values.len() != self.overrides.len() {
            return Err(EditError::range("param", values.len(), self.overrides.len()));
        }
        for (desc, value) in self.group.params.iter().zip(values) {
            if !desc.accepts(value) {
                return Err(EditError::type_mismatch(desc.type_name(), &value.to_string()));
            }
        }
        for (slot, value) in self.overrides.iter_mut().zip(values) {
            *slot = Some(*value);
        }
        Ok(())
    }

    pub fn clear_default(&mut self, index: usize) -> EditResult<()> {
        check_index("param", index, self.overrides.len())?;
        self.overrides[index] = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.overrides.iter_mut().for_each(|o| *o = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn synth_group() -> ParameterGroup {
        ParameterGroup::new(vec![
            ParameterDescriptor::note("note"),
            ParameterDescriptor::float("cutoff", 0.0, 1.0, 0.5),
            ParameterDescriptor::uint("volume", 0, 128, 100).trigger(),
        ])
    }

    #[test]
    fn lookup_by_name() {
        let group = synth_group();
        assert_eq!(group.index_of("cutoff"), Some(1));
        assert_eq!(group.index_of("resonance"), None);
        assert_eq!(group.spec(1).map(|p| p.name()), Some("cutoff"));
    }

    #[test]
    fn trigger_always_has_no_value() {
        let group = synth_group();
        assert!(group.is_trigger(0));
        assert_eq!(group.no_value(0), Some(Value::Enum(NOTE_NONE)));
        // no explicit sentinel: falls back to the default
        assert_eq!(group.no_value(2), Some(Value::UInt(100)));
        assert!(!group.is_trigger(1));
        assert_eq!(group.no_value(1), None);
    }

    #[test]
    fn enum_type_name_is_enum_name() {
        let group = synth_group();
        assert_eq!(group.params()[0].type_name(), "BtNote");
        assert_eq!(group.params()[1].type_name(), "gfloat");
    }

    #[test]
    fn describe_note() {
        let group = synth_group();
        assert_eq!(group.describe(0, &Value::Enum(crate::note_value(4, 0))).as_deref(), Some("c-4"));
        assert_eq!(group.describe(1, &Value::Float(0.25)).as_deref(), Some("0.25"));
    }

    #[test]
    fn random_enum_skips_empty_slot() {
        let desc = ParameterDescriptor::switch("trig");
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..200 {
            let v = desc.random_value(&mut rng);
            assert!(v == Value::Enum(0) || v == Value::Enum(1));
        }
    }

    #[test]
    fn random_numeric_within_range() {
        let desc = ParameterDescriptor::int("detune", -10, 10, 0);
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..200 {
            let v = desc.random_value(&mut rng).as_f64();
            assert!((-10.0..=10.0).contains(&v));
        }
    }

    #[test]
    fn defaults_override_and_reset() {
        let mut defaults = ParamDefaults::new(Arc::new(synth_group()));
        assert_eq!(defaults.get(1), Some(Value::Float(0.5)));
        defaults.set_default(1, Value::Float(0.8)).unwrap();
        assert_eq!(defaults.get(1), Some(Value::Float(0.8)));
        assert!(defaults.set_default(1, Value::Int(1)).is_err());
        assert!(defaults.set_default(9, Value::Float(0.1)).is_err());
        defaults.reset();
        assert_eq!(defaults.get(1), Some(Value::Float(0.5)));
    }

    #[test]
    fn set_defaults_is_all_or_nothing() {
        let mut defaults = ParamDefaults::new(Arc::new(synth_group()));
        let bad = [Value::Enum(1), Value::Float(0.1), Value::Int(3)];
        assert!(defaults.set_defaults(&bad).is_err());
        assert_eq!(defaults.get(0), Some(Value::Enum(NOTE_NONE)));
        let good = [Value::Enum(1), Value::Float(0.1), Value::UInt(3)];
        defaults.set_defaults(&good).unwrap();
        assert_eq!(defaults.get(2), Some(Value::UInt(3)));
    }
}
