//! Typed argument marshaller.
//!
//! Converts textual tokens into native argument values matching a
//! handler's declared parameter signature. This is the bridge between
//! the tokenizer's raw slices and a signature-typed handler's arguments:
//! the dispatcher walks the declared [`ParamType`] sequence and calls
//! [`parse`] once per remaining token.
//!
//! # Conversion rules
//!
//! - **Char** — a token starting with `'` is decoded through the escape
//!   table (`\b`, `\r`, `\n`, `\t`, `\0`, anything else literal);
//!   otherwise the first byte is taken.
//! - **Str** — a token bounded by `"` has its interior escape-decoded;
//!   unquoted tokens pass through unchanged.
//! - **Numeric** — leading `-` for sign; radix from the prefix
//!   (`0x`/`0X` hex, `0b`/`0B` binary, a bare leading `0` octal,
//!   decimal otherwise); a `.` followed by another character marks the
//!   value as floating. Floats are accumulated digit by digit and then
//!   divided by ten to the power of the fraction-digit count, and their
//!   bit pattern is transferred raw into the result slot — an integer
//!   literal bound to a float parameter reinterprets the integer's bits.
//!   This matches the wire-compatible behavior of existing deployments
//!   and is covered by tests.
//! - **`$name`** — resolved through the registry as a variable and read.
//! - **Array** — bracket-delimited, comma-separated; each element is
//!   recursively parsed with the inner scalar type and packed
//!   little-endian at that type's byte width. Any element failure fails
//!   the whole array with nothing retained.
//!
//! With no declared type ([`parse_auto`]), a token is classified in
//! priority order: character literal, number, variable reference, then
//! string. Numeric-looking tokens therefore never fall through to
//! string handling.

use heapless::{String, Vec};

use crate::error::Error;
use crate::registry::{Payload, Registry, VarRef};

/// Capacity of a decoded string argument.
pub const MAX_STRING_LENGTH: usize = 256;

/// Capacity of a packed array argument, in bytes.
pub const MAX_ARRAY_BYTES: usize = 128;

/// Element type of an array parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// 1-byte unsigned.
    U8,
    /// 1-byte signed.
    I8,
    /// 2-byte unsigned.
    U16,
    /// 2-byte signed.
    I16,
    /// 4-byte unsigned.
    U32,
    /// 4-byte signed.
    I32,
    /// 8-byte unsigned.
    U64,
    /// 8-byte signed.
    I64,
    /// 4-byte IEEE-754 single.
    Float,
    /// Pointer-width unsigned.
    Ptr,
}

impl ScalarType {
    /// Packed width of one element.
    pub fn byte_width(self) -> usize {
        match self {
            ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::U16 | ScalarType::I16 => 2,
            ScalarType::U32 | ScalarType::I32 | ScalarType::Float => 4,
            ScalarType::U64 | ScalarType::I64 => 8,
            ScalarType::Ptr => core::mem::size_of::<usize>(),
        }
    }

    fn param_type(self) -> ParamType {
        match self {
            ScalarType::U8 => ParamType::U8,
            ScalarType::I8 => ParamType::I8,
            ScalarType::U16 => ParamType::U16,
            ScalarType::I16 => ParamType::I16,
            ScalarType::U32 => ParamType::U32,
            ScalarType::I32 => ParamType::I32,
            ScalarType::U64 | ScalarType::Ptr => ParamType::U64,
            ScalarType::I64 => ParamType::I64,
            ScalarType::Float => ParamType::Float,
        }
    }
}

/// Declared type of one handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// IEEE-754 single precision.
    Float,
    /// IEEE-754 double precision.
    Double,
    /// Single character.
    Char,
    /// Escape-decoded string.
    Str,
    /// Packed array with the given element type.
    Array(ScalarType),
}

/// A packed array argument: element count, element byte width, and the
/// elements packed little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayArg {
    elem: ScalarType,
    len: usize,
    data: Vec<u8, MAX_ARRAY_BYTES>,
}

impl ArrayArg {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type.
    pub fn elem_type(&self) -> ScalarType {
        self.elem
    }

    /// Packed width of one element.
    pub fn elem_bytes(&self) -> usize {
        self.elem.byte_width()
    }

    /// The packed element bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Read one element back as a zero-extended machine word.
    pub fn word(&self, index: usize) -> Option<u64> {
        let width = self.elem_bytes();
        let start = index.checked_mul(width)?;
        let chunk = self.data.get(start..start + width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(chunk);
        Some(u64::from_le_bytes(buf))
    }
}

/// A transient typed value produced during one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// IEEE-754 single precision.
    Float(f32),
    /// IEEE-754 double precision.
    Double(f64),
    /// Single character.
    Char(u8),
    /// Escape-decoded string.
    Str(String<MAX_STRING_LENGTH>),
    /// Packed array.
    Array(ArrayArg),
}

impl ArgValue {
    /// The value as one machine word, for scalar variants.
    ///
    /// Signed values sign-extend and floats transfer their raw bits.
    /// Strings and arrays have no word form.
    pub fn as_word(&self) -> Option<u64> {
        match self {
            ArgValue::Str(_) | ArgValue::Array(_) => None,
            _ => Some(scalar_word(self)),
        }
    }
}

/// Parse one token against a declared parameter type.
///
/// `$name` tokens resolve through `registry` regardless of the declared
/// type; the variable's current value is coerced to the type, and an
/// unresolved or type-incompatible reference is [`Error::Parse`].
pub fn parse(token: &str, ty: ParamType, registry: &Registry) -> Result<ArgValue, Error> {
    if let Some(name) = token.strip_prefix('$') {
        if !name.is_empty() {
            return resolve_var(name, ty, registry);
        }
    }
    match ty {
        ParamType::Char => Ok(ArgValue::Char(parse_char(token))),
        ParamType::Str => Ok(ArgValue::Str(parse_string(token))),
        ParamType::Array(elem) => parse_array(token, elem, registry),
        _ => {
            let number = parse_number(token)?;
            Ok(number_to_value(ty, &number))
        }
    }
}

/// Classify and parse one token with no declared type.
///
/// Priority order: character literal, number, variable reference,
/// string. Integers come back as [`ArgValue::I64`] and float literals as
/// [`ArgValue::Float`].
pub fn parse_auto(token: &str, registry: &Registry) -> Result<ArgValue, Error> {
    let bytes = token.as_bytes();
    match bytes {
        [] => Err(Error::Parse),
        [b'\'', _, ..] => Ok(ArgValue::Char(parse_char(token))),
        [b, ..] if *b == b'-' || b.is_ascii_digit() => match parse_number(token)? {
            Number::Int(word) => Ok(ArgValue::I64(word as i64)),
            real => Ok(ArgValue::Float(real.as_f32())),
        },
        [b'$', _, ..] => {
            let descriptor = registry.lookup(&token[1..], 0).ok_or(Error::Parse)?;
            match &descriptor.payload {
                Payload::Variable(var) => match var {
                    VarRef::Str(s) => Ok(ArgValue::Str(copy_str(s))),
                    _ => Ok(ArgValue::I64(var.word().unwrap_or(0) as i64)),
                },
                _ => Err(Error::Parse),
            }
        }
        _ => Ok(ArgValue::Str(parse_string(token))),
    }
}

/// Decode one character token.
fn parse_char(token: &str) -> u8 {
    let bytes = token.as_bytes();
    let inner = match bytes.first() {
        Some(b'\'') => &bytes[1..],
        _ => bytes,
    };
    match inner {
        [b'\\', escaped, ..] => unescape(*escaped),
        [byte, ..] => *byte,
        [] => 0,
    }
}

fn unescape(code: u8) -> u8 {
    match code {
        b'b' => 0x08,
        b'r' => b'\r',
        b'n' => b'\n',
        b't' => b'\t',
        b'0' => 0,
        other => other,
    }
}

/// Decode one string token: strip the bounding `"`, decode escapes.
fn parse_string(token: &str) -> String<MAX_STRING_LENGTH> {
    let bytes = token.as_bytes();
    let inner = match bytes.first() {
        Some(b'"') => &bytes[1..],
        _ => bytes,
    };

    let mut out = String::new();
    let mut i = 0;
    while i < inner.len() {
        match inner[i] {
            b'\\' if i + 1 < inner.len() => {
                let _ = out.push(unescape(inner[i + 1]) as char);
                i += 2;
            }
            b'"' => break,
            byte => {
                let _ = out.push(byte as char);
                i += 1;
            }
        }
    }
    out
}

fn copy_str(s: &str) -> String<MAX_STRING_LENGTH> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

/// Outcome of the numeric literal scan.
enum Number {
    /// Sign-applied integer word.
    Int(u64),
    /// Floating literal kept as its accumulation parts so that both
    /// single and double precision can be derived from the same
    /// digit-by-digit arithmetic.
    Real {
        mantissa: u64,
        divisor: u64,
        negative: bool,
    },
}

impl Number {
    /// The value as a raw machine word. Floating literals contribute
    /// their single-precision bit pattern.
    fn word(&self) -> u64 {
        match *self {
            Number::Int(word) => word,
            Number::Real { .. } => self.as_f32().to_bits() as u64,
        }
    }

    fn as_f32(&self) -> f32 {
        match *self {
            Number::Int(word) => f32::from_bits(word as u32),
            Number::Real {
                mantissa,
                divisor,
                negative,
            } => {
                let sign = if negative { -1.0 } else { 1.0 };
                mantissa as f32 / divisor as f32 * sign
            }
        }
    }

    fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(word) => f64::from_bits(word),
            Number::Real {
                mantissa,
                divisor,
                negative,
            } => {
                let sign = if negative { -1.0 } else { 1.0 };
                mantissa as f64 / divisor as f64 * sign
            }
        }
    }
}

/// Scan a numeric literal.
///
/// A byte that is not a valid digit for the detected radix fails the
/// parse; this is deliberately stricter than silently mapping bad
/// digits to zero, so a malformed array element aborts the whole array.
fn parse_number(token: &str) -> Result<Number, Error> {
    let bytes = token.as_bytes();
    if bytes.is_empty() {
        return Err(Error::Parse);
    }
    let negative = bytes[0] == b'-';
    let digits = &bytes[usize::from(negative)..];
    if digits.is_empty() {
        return Err(Error::Parse);
    }

    // A '.' followed by at least one more byte marks a float; the scan
    // starts at the second byte so a lone leading '.' never counts.
    let is_float = digits
        .iter()
        .enumerate()
        .skip(1)
        .any(|(i, &b)| b == b'.' && i + 1 < digits.len());

    // The float flag overrides any radix prefix, so a malformed
    // literal like "0x1.2" scans as decimal and fails on the 'x'.
    let (radix, offset): (u64, usize) = match digits {
        [b'0', b'x' | b'X', ..] if !is_float => (16, 2),
        [b'0', b'b' | b'B', ..] if !is_float => (2, 2),
        [b'0', ..] if !is_float => (8, 1),
        _ => (10, 0),
    };

    let mut value: u64 = 0;
    let mut divisor: u64 = 0;
    for &byte in &digits[offset..] {
        if byte == b'.' {
            divisor = 1;
            continue;
        }
        let digit = digit_value(byte, radix).ok_or(Error::Parse)?;
        value = value.wrapping_mul(radix).wrapping_add(u64::from(digit));
        divisor = divisor.wrapping_mul(10);
    }

    if is_float && divisor != 0 {
        Ok(Number::Real {
            mantissa: value,
            divisor,
            negative,
        })
    } else {
        let word = if negative {
            (value as i64).wrapping_neg() as u64
        } else {
            value
        };
        Ok(Number::Int(word))
    }
}

fn digit_value(byte: u8, radix: u64) -> Option<u8> {
    let value = match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => return None,
    };
    (u64::from(value) < radix).then_some(value)
}

fn number_to_value(ty: ParamType, number: &Number) -> ArgValue {
    match ty {
        ParamType::U8 => ArgValue::U8(number.word() as u8),
        ParamType::U16 => ArgValue::U16(number.word() as u16),
        ParamType::U32 => ArgValue::U32(number.word() as u32),
        ParamType::U64 => ArgValue::U64(number.word()),
        ParamType::I8 => ArgValue::I8(number.word() as i8),
        ParamType::I16 => ArgValue::I16(number.word() as i16),
        ParamType::I32 => ArgValue::I32(number.word() as i32),
        ParamType::I64 => ArgValue::I64(number.word() as i64),
        ParamType::Float => ArgValue::Float(number.as_f32()),
        ParamType::Double => ArgValue::Double(number.as_f64()),
        // A `$var` bound to a Char parameter arrives as its word.
        ParamType::Char => ArgValue::Char(number.word() as u8),
        // Str/Array never reach here.
        ParamType::Str | ParamType::Array(_) => ArgValue::U64(number.word()),
    }
}

/// Resolve a `$name` reference against a declared type.
fn resolve_var(name: &str, ty: ParamType, registry: &Registry) -> Result<ArgValue, Error> {
    let descriptor = registry.lookup(name, 0).ok_or(Error::Parse)?;
    let var = match &descriptor.payload {
        Payload::Variable(var) => var,
        _ => return Err(Error::Parse),
    };
    match ty {
        ParamType::Str => var.as_str().map(copy_str).map(ArgValue::Str).ok_or(Error::Parse),
        ParamType::Array(_) => Err(Error::Parse),
        _ => {
            let word = var.word().ok_or(Error::Parse)? as u64;
            Ok(number_to_value(ty, &Number::Int(word)))
        }
    }
}

/// Parse a bracket-delimited, comma-separated array token.
///
/// The element count is estimated as commas + 1 before any element is
/// parsed; an estimate that exceeds the packing capacity is
/// [`Error::Allocation`] without parsing anything. The first failing
/// element aborts the whole array.
fn parse_array(token: &str, elem: ScalarType, registry: &Registry) -> Result<ArgValue, Error> {
    let mut inner = token;
    if let Some(stripped) = inner.strip_suffix(']') {
        inner = stripped;
    }
    if let Some(stripped) = inner.strip_prefix('[') {
        inner = stripped;
    }

    let width = elem.byte_width();
    let estimated = inner.split(',').count();
    if estimated * width > MAX_ARRAY_BYTES {
        return Err(Error::Allocation);
    }

    let mut data: Vec<u8, MAX_ARRAY_BYTES> = Vec::new();
    let mut len = 0;
    for part in inner.split(',') {
        let value = parse(part, elem.param_type(), registry)?;
        let word = scalar_word(&value);
        data.extend_from_slice(&word.to_le_bytes()[..width])
            .map_err(|_| Error::Allocation)?;
        len += 1;
    }

    Ok(ArgValue::Array(ArrayArg { elem, len, data }))
}

fn scalar_word(value: &ArgValue) -> u64 {
    match value {
        ArgValue::U8(v) => u64::from(*v),
        ArgValue::U16(v) => u64::from(*v),
        ArgValue::U32(v) => u64::from(*v),
        ArgValue::U64(v) => *v,
        ArgValue::I8(v) => *v as i64 as u64,
        ArgValue::I16(v) => *v as i64 as u64,
        ArgValue::I32(v) => *v as i64 as u64,
        ArgValue::I64(v) => *v as u64,
        ArgValue::Float(v) => u64::from(v.to_bits()),
        ArgValue::Double(v) => v.to_bits(),
        ArgValue::Char(v) => u64::from(*v),
        ArgValue::Str(_) | ArgValue::Array(_) => 0,
    }
}
