//! Sparse tick × parameter grid of optional values.
//!
//! Each parameter owns two columns: the validated value, which playback
//! reads, and a shadow column holding a pending plain entry for enum
//! parameters while it is not (yet) a declared value. Cells are stored
//! row-major: `cells[tick * columns + column]`.

use std::fmt::Write as _;
use std::sync::Arc;

use rand::Rng;

use crate::error::{check_index, EditError, EditResult};
use crate::parameter_group::{ParameterDescriptor, ParameterGroup};
use crate::value::{ParamType, Value};

/// Column transforms applied over an inclusive tick range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueStoreOp {
    Clear,
    Blend,
    Flip,
    Randomize,
    RangeRandomize,
    TransposeFineUp,
    TransposeFineDown,
    TransposeCoarseUp,
    TransposeCoarseDown,
}

/// Change notice queued by a [`ValueStore`] until its owner drains it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    ParamChanged { tick: usize, param: usize },
    /// `intermediate` is true while a multi-cell edit is still in progress.
    GroupChanged { intermediate: bool },
}

/// Value grid for one parameter group within one pattern.
#[derive(Clone, Debug)]
pub struct ValueStore {
    group: Arc<ParameterGroup>,
    length: usize,
    params: usize,
    cells: Vec<Option<Value>>,
    events: Vec<StoreEvent>,
}

impl ValueStore {
    pub fn new(group: Arc<ParameterGroup>, length: usize) -> Self {
        let params = group.len();
        Self {
            group,
            length,
            params,
            cells: vec![None; length * params * 2],
            events: Vec::new(),
        }
    }

    pub fn group(&self) -> &Arc<ParameterGroup> {
        &self.group
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn params(&self) -> usize {
        self.params
    }

    fn columns(&self) -> usize {
        self.params * 2
    }

    fn at(&self, tick: usize, column: usize) -> usize {
        tick * self.columns() + column
    }

    fn check(&self, tick: usize, param: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        check_index("param", param, self.params)
    }

    fn check_range(&self, start: usize, end: usize) -> EditResult<()> {
        check_index("tick", start, self.length)?;
        check_index("tick", end, self.length)?;
        if start > end {
            return Err(EditError::PreconditionViolation("range start after range end"));
        }
        Ok(())
    }

    fn desc(&self, param: usize) -> &ParameterDescriptor {
        &self.group.params()[param]
    }

    /// Drain queued change notices.
    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    // --- Reads ---

    /// Validated value at `(tick, param)`.
    pub fn get(&self, tick: usize, param: usize) -> EditResult<Option<Value>> {
        self.check(tick, param)?;
        Ok(self.cells[self.at(tick, param)])
    }

    /// Validated value, or `None` when absent or out of range.
    #[inline]
    pub fn value_at(&self, tick: usize, param: usize) -> Option<Value> {
        if tick >= self.length || param >= self.params {
            return None;
        }
        self.cells[tick * self.params * 2 + param]
    }

    /// Textual cell content: the validated value, else the pending entry.
    pub fn get_event(&self, tick: usize, param: usize) -> EditResult<Option<String>> {
        self.check(tick, param)?;
        let validated = self.cells[self.at(tick, param)];
        let shadow = self.cells[self.at(tick, self.params + param)];
        Ok(validated.or(shadow).map(|v| v.to_string()))
    }

    pub fn test(&self, tick: usize, param: usize) -> bool {
        self.value_at(tick, param).is_some()
    }

    /// Whether any parameter has a value at `tick`.
    pub fn test_tick(&self, tick: usize) -> bool {
        if tick >= self.length {
            return false;
        }
        let row = self.at(tick, 0);
        self.cells[row..row + self.params].iter().any(Option::is_some)
    }

    // --- Writes ---

    /// Set a cell from text; `None` (or blank text) clears it.
    ///
    /// A value equal to the parameter's no-value is stored as absent. On a
    /// parse failure the validated cell is cleared; enum parameters keep an
    /// integer entry in the shadow column as pending input.
    pub fn set(&mut self, tick: usize, param: usize, text: Option<&str>) -> EditResult<()> {
        self.check(tick, param)?;
        let text = text.filter(|t| !t.trim().is_empty());
        let desc = self.desc(param);
        let (validated, shadow, result) = match text {
            None => (None, None, Ok(())),
            Some(text) => match desc.parse(text) {
                Some(v) if desc.is_no_value(&v) => (None, None, Ok(())),
                Some(v) => (Some(v), None, Ok(())),
                None => {
                    let pending = match desc.param_type() {
                        ParamType::Enum => desc.parse_plain(text),
                        _ => None,
                    };
                    (None, pending, Err(EditError::type_mismatch(desc.type_name(), text)))
                }
            },
        };
        self.write(tick, param, validated, shadow);
        result
    }

    /// Set a cell from a typed value.
    pub fn set_value(&mut self, tick: usize, param: usize, value: Option<Value>) -> EditResult<()> {
        self.check(tick, param)?;
        let desc = self.desc(param);
        let value = match value {
            Some(v) if !desc.accepts(&v) => {
                return Err(EditError::type_mismatch(desc.type_name(), &v.to_string()));
            }
            Some(v) if desc.is_no_value(&v) => None,
            other => other,
        };
        self.write(tick, param, value, None);
        Ok(())
    }

    fn write(&mut self, tick: usize, param: usize, validated: Option<Value>, shadow: Option<Value>) {
        let (vi, si) = (self.at(tick, param), self.at(tick, self.params + param));
        if self.cells[vi] != validated || self.cells[si] != shadow {
            self.cells[vi] = validated;
            self.cells[si] = shadow;
            self.events.push(StoreEvent::ParamChanged { tick, param });
        }
    }

    /// Change the number of ticks, keeping rows that still fit.
    pub fn resize(&mut self, length: usize) {
        if length == self.length {
            return;
        }
        let columns = self.columns();
        self.cells.resize(length * columns, None);
        self.length = length;
    }

    // --- Row edits ---

    fn shift_down(&mut self, tick: usize, column: usize) {
        let columns = self.columns();
        for t in (tick + 1..self.length).rev() {
            self.cells[t * columns + column] = self.cells[(t - 1) * columns + column];
        }
        self.cells[tick * columns + column] = None;
    }

    fn shift_up(&mut self, tick: usize, column: usize) {
        let columns = self.columns();
        for t in tick..self.length - 1 {
            self.cells[t * columns + column] = self.cells[(t + 1) * columns + column];
        }
        self.cells[(self.length - 1) * columns + column] = None;
    }

    /// Insert an empty cell at `tick` for one parameter; the last row drops off.
    pub fn insert_row(&mut self, tick: usize, param: usize) -> EditResult<()> {
        self.check(tick, param)?;
        self.bracketed(|store| {
            store.shift_down(tick, param);
            store.shift_down(tick, store.params + param);
        });
        Ok(())
    }

    /// Insert an empty row at `tick` for every parameter.
    pub fn insert_full_row(&mut self, tick: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        self.bracketed(|store| {
            for column in 0..store.columns() {
                store.shift_down(tick, column);
            }
        });
        Ok(())
    }

    /// Remove the cell at `tick` for one parameter; the last row becomes empty.
    pub fn delete_row(&mut self, tick: usize, param: usize) -> EditResult<()> {
        self.check(tick, param)?;
        self.bracketed(|store| {
            store.shift_up(tick, param);
            store.shift_up(tick, store.params + param);
        });
        Ok(())
    }

    pub fn delete_full_row(&mut self, tick: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        self.bracketed(|store| {
            for column in 0..store.columns() {
                store.shift_up(tick, column);
            }
        });
        Ok(())
    }

    fn bracketed(&mut self, edit: impl FnOnce(&mut Self)) {
        self.events.push(StoreEvent::GroupChanged { intermediate: true });
        edit(self);
        self.events.push(StoreEvent::GroupChanged { intermediate: false });
    }

    /// Clear `[start, end]` of one parameter.
    pub fn clear_column(&mut self, start: usize, end: usize, param: usize) -> EditResult<()> {
        self.check_range(start, end)?;
        check_index("param", param, self.params)?;
        self.bracketed(|store| store.clear_range(start, end, param));
        Ok(())
    }

    pub fn clear_columns(&mut self, start: usize, end: usize) -> EditResult<()> {
        self.check_range(start, end)?;
        self.bracketed(|store| {
            for param in 0..store.params {
                store.clear_range(start, end, param);
            }
        });
        Ok(())
    }

    // --- Column transforms ---

    /// Apply `op` to `[start, end]` of one parameter.
    pub fn transform_column<R: Rng + ?Sized>(
        &mut self,
        op: ValueStoreOp,
        start: usize,
        end: usize,
        param: usize,
        rng: &mut R,
    ) -> EditResult<()> {
        self.check_range(start, end)?;
        check_index("param", param, self.params)?;
        if op == ValueStoreOp::Clear {
            self.events.push(StoreEvent::GroupChanged { intermediate: true });
        }
        self.apply(op, start, end, param, rng);
        self.events.push(StoreEvent::GroupChanged { intermediate: false });
        Ok(())
    }

    /// Apply `op` to `[start, end]` of every parameter.
    pub fn transform_columns<R: Rng + ?Sized>(
        &mut self,
        op: ValueStoreOp,
        start: usize,
        end: usize,
        rng: &mut R,
    ) -> EditResult<()> {
        self.check_range(start, end)?;
        if op == ValueStoreOp::Clear {
            self.events.push(StoreEvent::GroupChanged { intermediate: true });
        }
        for param in 0..self.params {
            self.apply(op, start, end, param, rng);
        }
        self.events.push(StoreEvent::GroupChanged { intermediate: false });
        Ok(())
    }

    fn apply<R: Rng + ?Sized>(&mut self, op: ValueStoreOp, start: usize, end: usize, param: usize, rng: &mut R) {
        match op {
            ValueStoreOp::Clear => self.clear_range(start, end, param),
            ValueStoreOp::Blend => self.blend(start, end, param),
            ValueStoreOp::Flip => self.flip(start, end, param),
            ValueStoreOp::Randomize => self.randomize(start, end, param, rng),
            ValueStoreOp::RangeRandomize => self.range_randomize(start, end, param, rng),
            ValueStoreOp::TransposeFineUp => self.transpose(start, end, param, 1.0, true),
            ValueStoreOp::TransposeFineDown => self.transpose(start, end, param, -1.0, true),
            ValueStoreOp::TransposeCoarseUp => self.transpose(start, end, param, 1.0, false),
            ValueStoreOp::TransposeCoarseDown => self.transpose(start, end, param, -1.0, false),
        }
    }

    /// Store a transform result, honoring the no-value normalization.
    fn put(&mut self, tick: usize, param: usize, value: Option<Value>) {
        let value = value.filter(|v| !self.desc(param).is_no_value(v));
        let (vi, si) = (self.at(tick, param), self.at(tick, self.params + param));
        self.cells[vi] = value;
        self.cells[si] = None;
    }

    fn clear_range(&mut self, start: usize, end: usize, param: usize) {
        for tick in start..=end {
            self.put(tick, param, None);
        }
    }

    /// Linear ramp from the start value towards the end value; the end cell
    /// itself is left as is. Both ends must be set.
    fn blend(&mut self, start: usize, end: usize, param: usize) {
        let (Some(first), Some(last)) = (self.value_at(start, param), self.value_at(end, param)) else {
            log::debug!(target: "pattern", "blend needs values at both ends");
            return;
        };
        let ticks = end - start;
        if ticks == 0 {
            return;
        }
        let desc = self.desc(param).clone();
        if let Some(spec) = desc.enum_spec() {
            let (Some(a), Some(b)) = (
                first.as_enum().and_then(|v| spec.ordinal_of(v)),
                last.as_enum().and_then(|v| spec.ordinal_of(v)),
            ) else {
                return;
            };
            let step = (b as f64 - a as f64) / ticks as f64;
            for i in 0..ticks {
                let ordinal = (a as f64 + step * i as f64) as usize;
                let value = spec.value_at(ordinal).map(Value::Enum);
                self.put(start + i, param, value);
            }
            return;
        }
        let ty = desc.param_type();
        let mut val = first.as_f64();
        let step = (last.as_f64() - val) / ticks as f64;
        if ty == ParamType::Bool {
            val += 0.5;
        }
        for i in 0..ticks {
            let v = val + step * i as f64;
            let v = if ty.is_integral() || ty == ParamType::Bool { v.trunc() } else { v };
            self.put(start + i, param, Some(ty.from_f64(v)));
        }
    }

    /// Reverse the cells of `[start, end]`, empty cells included.
    fn flip(&mut self, start: usize, end: usize, param: usize) {
        let (mut lo, mut hi) = (start, end);
        while lo < hi {
            for column in [param, self.params + param] {
                let (a, b) = (self.at(lo, column), self.at(hi, column));
                self.cells.swap(a, b);
            }
            lo += 1;
            hi -= 1;
        }
    }

    fn randomize<R: Rng + ?Sized>(&mut self, start: usize, end: usize, param: usize, rng: &mut R) {
        let desc = self.desc(param).clone();
        for tick in start..=end {
            let value = desc.random_value(rng);
            self.put(tick, param, Some(value));
        }
    }

    /// Random values between the two end values (in either order).
    fn range_randomize<R: Rng + ?Sized>(&mut self, start: usize, end: usize, param: usize, rng: &mut R) {
        let (Some(first), Some(last)) = (self.value_at(start, param), self.value_at(end, param)) else {
            log::debug!(target: "pattern", "range randomize needs values at both ends");
            return;
        };
        let desc = self.desc(param).clone();
        if let Some(spec) = desc.enum_spec() {
            let (Some(a), Some(b)) = (
                first.as_enum().and_then(|v| spec.ordinal_of(v)),
                last.as_enum().and_then(|v| spec.ordinal_of(v)),
            ) else {
                return;
            };
            let (lo, hi) = (a.min(b), a.max(b));
            for tick in start..=end {
                let value = spec.value_at(rng.gen_range(lo..=hi)).map(Value::Enum);
                self.put(tick, param, value);
            }
            return;
        }
        let ty = desc.param_type();
        let (a, b) = (first.as_f64(), last.as_f64());
        let (lo, hi) = (a.min(b), a.max(b));
        for tick in start..=end {
            let value = match ty {
                ParamType::Bool => Value::Bool(rng.gen_bool(0.5)),
                ty if ty.is_integral() => ty.from_f64(rng.gen_range(lo..=hi).trunc()),
                ty => ty.from_f64(lo + (hi - lo) * rng.gen::<f64>()),
            };
            self.put(tick, param, Some(value));
        }
    }

    /// Step set cells up or down, skipping cells that would leave the range.
    fn transpose(&mut self, start: usize, end: usize, param: usize, dir: f64, fine: bool) {
        let desc = self.desc(param).clone();
        let ty = desc.param_type();
        let (min, max) = (desc.min().as_f64(), desc.max().as_f64());
        let step = match (desc.enum_spec(), ty) {
            (Some(spec), _) => {
                let d = spec.len().saturating_sub(1) as f64;
                let step = if fine {
                    1.0
                } else if spec.is_note() {
                    12.0
                } else {
                    (0.5 + d / 16.0).trunc()
                };
                dir * step
            }
            (None, ty) if ty.is_integral() => dir * if fine { 1.0 } else { ((max - min) / 16.0).trunc().max(1.0) },
            (None, ParamType::Bool) => dir,
            (None, _) => dir * (max - min) / if fine { 65535.0 } else { 16.0 },
        };
        for tick in start..=end {
            let Some(current) = self.value_at(tick, param) else {
                continue;
            };
            let next = match (desc.enum_spec(), current) {
                (Some(spec), Value::Enum(raw)) => {
                    let last = spec.len().saturating_sub(1) as i64;
                    let Some(ordinal) = spec.ordinal_of(raw) else {
                        continue;
                    };
                    let ordinal = ordinal as i64 + step as i64;
                    if ordinal < 0 || ordinal >= last {
                        continue;
                    }
                    spec.value_at(ordinal as usize).map(Value::Enum)
                }
                (_, Value::Bool(_)) => Some(Value::Bool(dir > 0.0)),
                (_, v) => {
                    let v = v.as_f64();
                    let fits = if step < 0.0 { v >= min - step } else { v <= max - step };
                    if !fits {
                        continue;
                    }
                    Some(ty.from_f64(v + step))
                }
            };
            self.put(tick, param, next);
        }
    }

    // --- Text interchange ---

    /// Serialize `[start, end]` of one parameter as `type,v0,v1,...\n`.
    /// Empty cells are written as a single space.
    pub fn serialize_column(&self, start: usize, end: usize, param: usize) -> EditResult<String> {
        self.check_range(start, end)?;
        check_index("param", param, self.params)?;
        let mut out = String::new();
        self.write_column(start, end, param, &mut out);
        Ok(out)
    }

    /// Serialize every parameter, one line each.
    pub fn serialize_columns(&self, start: usize, end: usize) -> EditResult<String> {
        self.check_range(start, end)?;
        let mut out = String::new();
        for param in 0..self.params {
            self.write_column(start, end, param, &mut out);
        }
        Ok(out)
    }

    fn write_column(&self, start: usize, end: usize, param: usize, out: &mut String) {
        out.push_str(self.desc(param).type_name());
        for tick in start..=end {
            match self.value_at(tick, param) {
                Some(v) => {
                    let _ = write!(out, ",{v}");
                }
                None => out.push_str(", "),
            }
        }
        out.push('\n');
    }

    /// Parse one serialized line against `param` without writing anything.
    fn parse_column(&self, start: usize, end: usize, param: usize, line: &str) -> EditResult<Vec<Option<Value>>> {
        let desc = self.desc(param);
        let mut fields = line.trim_end_matches(['\n', '\r']).split(',');
        let type_name = fields.next().unwrap_or_default();
        if type_name != desc.type_name() {
            return Err(EditError::type_mismatch(desc.type_name(), type_name));
        }
        let mut values = Vec::with_capacity(end + 1 - start);
        for field in fields.take(end + 1 - start) {
            if field.trim().is_empty() {
                values.push(None);
                continue;
            }
            let value = desc
                .parse(field)
                .ok_or_else(|| EditError::type_mismatch(desc.type_name(), field))?;
            values.push(Some(value));
        }
        Ok(values)
    }

    /// Load one serialized column into `[start, end]` of `param`.
    ///
    /// Fails without writing when the type name does not match the
    /// parameter's type or a field does not parse.
    pub fn deserialize_column(&mut self, start: usize, end: usize, param: usize, data: &str) -> EditResult<()> {
        self.check_range(start, end)?;
        check_index("param", param, self.params)?;
        let values = self.parse_column(start, end, param, data)?;
        for (i, value) in values.into_iter().enumerate() {
            self.put(start + i, param, value);
        }
        self.events.push(StoreEvent::GroupChanged { intermediate: false });
        Ok(())
    }

    /// Load one line per parameter, in parameter order.
    pub fn deserialize_columns(&mut self, start: usize, end: usize, data: &str) -> EditResult<()> {
        self.check_range(start, end)?;
        let lines: Vec<&str> = data.lines().filter(|l| !l.is_empty()).collect();
        if lines.len() > self.params {
            return Err(EditError::range("param", lines.len() - 1, self.params));
        }
        let mut parsed = Vec::with_capacity(lines.len());
        for (param, line) in lines.iter().enumerate() {
            parsed.push(self.parse_column(start, end, param, line)?);
        }
        for (param, values) in parsed.into_iter().enumerate() {
            for (i, value) in values.into_iter().enumerate() {
                self.put(start + i, param, value);
            }
        }
        self.events.push(StoreEvent::GroupChanged { intermediate: false });
        Ok(())
    }
}
