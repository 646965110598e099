use std::fmt;

use crate::error::TarnError;

/// Identifier of a heap allocation. Issued from a per-context counter
/// starting at 1; never reused. Zero is reserved for "never issued".
pub type AllocId = i64;

/// A tagged runtime value: either a plain integer or a handle naming a
/// heap cell. Handles are persistent names, not addresses; resolving one
/// requires the owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Handle(AllocId),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Handle(id) => write!(f, "<handle {id}>"),
        }
    }
}

impl Value {
    pub fn is_int(self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_handle(self) -> bool {
        matches!(self, Value::Handle(_))
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            Value::Handle(_) => None,
        }
    }

    pub fn as_handle(self) -> Option<AllocId> {
        match self {
            Value::Handle(id) => Some(id),
            Value::Int(_) => None,
        }
    }

    /// The raw 64-bit payload, regardless of tag.
    pub fn payload(self) -> i64 {
        match self {
            Value::Int(n) => n,
            Value::Handle(id) => id,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Handle(_) => "handle",
        }
    }

    /// Reinterpret the payload as an integer without consulting any heap.
    pub fn to_integer(self) -> Value {
        Value::Int(self.payload())
    }

    fn int_operands(self, other: Value, op: &'static str) -> Result<(i64, i64), TarnError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok((a, b)),
            _ => Err(TarnError::type_mismatch(
                op,
                format!("{} and {}", self.type_name(), other.type_name()),
            )),
        }
    }

    fn int_operand(self, op: &'static str) -> Result<i64, TarnError> {
        self.as_int()
            .ok_or_else(|| TarnError::type_mismatch(op, self.type_name()))
    }

    // ── Arithmetic ────────────────────────────────────────────────────

    pub fn add(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "+")?;
        Ok(Value::Int(a.wrapping_add(b)))
    }

    pub fn sub(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "-")?;
        Ok(Value::Int(a.wrapping_sub(b)))
    }

    pub fn mul(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "*")?;
        Ok(Value::Int(a.wrapping_mul(b)))
    }

    pub fn div(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "/")?;
        if b == 0 {
            return Err(TarnError::DivisionByZero);
        }
        Ok(Value::Int(a.wrapping_div(b)))
    }

    pub fn rem(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "%")?;
        if b == 0 {
            return Err(TarnError::DivisionByZero);
        }
        Ok(Value::Int(a.wrapping_rem(b)))
    }

    // ── Bitwise ───────────────────────────────────────────────────────

    pub fn bit_and(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "&")?;
        Ok(Value::Int(a & b))
    }

    pub fn bit_or(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "|")?;
        Ok(Value::Int(a | b))
    }

    pub fn bit_xor(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "^")?;
        Ok(Value::Int(a ^ b))
    }

    pub fn bit_not(self) -> Result<Value, TarnError> {
        let a = self.int_operand("~")?;
        Ok(Value::Int(!a))
    }

    // ── Logical ───────────────────────────────────────────────────────
    //
    // Logical and relational operations reduce to Int(0) or Int(1).

    pub fn logical_and(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "&&")?;
        Ok(Value::Int(i64::from(a != 0 && b != 0)))
    }

    pub fn logical_or(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "||")?;
        Ok(Value::Int(i64::from(a != 0 || b != 0)))
    }

    pub fn logical_not(self) -> Result<Value, TarnError> {
        let a = self.int_operand("!")?;
        Ok(Value::Int(i64::from(a == 0)))
    }

    // ── Relational ────────────────────────────────────────────────────

    pub fn lt(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "<")?;
        Ok(Value::Int(i64::from(a < b)))
    }

    pub fn gt(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, ">")?;
        Ok(Value::Int(i64::from(a > b)))
    }

    pub fn le(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "<=")?;
        Ok(Value::Int(i64::from(a <= b)))
    }

    pub fn ge(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, ">=")?;
        Ok(Value::Int(i64::from(a >= b)))
    }

    pub fn num_eq(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "==")?;
        Ok(Value::Int(i64::from(a == b)))
    }

    pub fn num_ne(self, other: Value) -> Result<Value, TarnError> {
        let (a, b) = self.int_operands(other, "!=")?;
        Ok(Value::Int(i64::from(a != b)))
    }
}
