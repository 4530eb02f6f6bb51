//! Numeric helpers shared by updates (`$inc`) and aggregation expressions.
//!
//! Integer operands stay integers (widening from int32 to int64 on overflow); any double operand
//! makes the result a double.
use bson::Bson;

#[must_use]
pub const fn is_numeric(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[must_use]
pub const fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Narrows to int32 when both inputs were int32 and the value fits.
fn int_result(value: i64, both_i32: bool) -> Bson {
    match i32::try_from(value) {
        Ok(v) if both_i32 => Bson::Int32(v),
        _ => Bson::Int64(value),
    }
}

fn both_i32(a: &Bson, b: &Bson) -> bool {
    matches!((a, b), (Bson::Int32(_), Bson::Int32(_)))
}

/// Applies an integer op when both sides are integers, otherwise the float op.
fn arith(
    a: &Bson,
    b: &Bson,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Option<Bson> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b))
        && let Some(v) = int_op(x, y)
    {
        return Some(int_result(v, both_i32(a, b)));
    }
    Some(Bson::Double(float_op(as_f64(a)?, as_f64(b)?)))
}

#[must_use]
pub fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    arith(a, b, i64::checked_add, |x, y| x + y)
}

#[must_use]
pub fn subtract(a: &Bson, b: &Bson) -> Option<Bson> {
    arith(a, b, i64::checked_sub, |x, y| x - y)
}

#[must_use]
pub fn multiply(a: &Bson, b: &Bson) -> Option<Bson> {
    arith(a, b, i64::checked_mul, |x, y| x * y)
}

/// Remainder with the sign of the dividend. `None` on a zero divisor or non-numeric input.
#[must_use]
pub fn modulo(a: &Bson, b: &Bson) -> Option<Bson> {
    if as_f64(b)? == 0.0 {
        return None;
    }
    arith(a, b, i64::checked_rem, |x, y| x % y)
}

/// Division always yields a double. `None` on a zero divisor or non-numeric input.
#[must_use]
pub fn divide(a: &Bson, b: &Bson) -> Option<Bson> {
    let d = as_f64(b)?;
    if d == 0.0 {
        return None;
    }
    Some(Bson::Double(as_f64(a)? / d))
}

/// Floor keeps integers untouched and rounds doubles down.
#[must_use]
pub fn floor(a: &Bson) -> Option<Bson> {
    match a {
        Bson::Int32(_) | Bson::Int64(_) => Some(a.clone()),
        Bson::Double(f) => Some(Bson::Double(f.floor())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(add(&Bson::Int32(1), &Bson::Int32(2)), Some(Bson::Int32(3)));
        assert_eq!(subtract(&Bson::Int32(1984), &Bson::Int32(4)), Some(Bson::Int32(1980)));
        assert_eq!(modulo(&Bson::Int32(1988), &Bson::Int32(10)), Some(Bson::Int32(8)));
        assert_eq!(add(&Bson::Int64(1), &Bson::Int32(2)), Some(Bson::Int64(3)));
    }

    #[test]
    fn overflow_widens_to_int64() {
        assert_eq!(
            add(&Bson::Int32(i32::MAX), &Bson::Int32(1)),
            Some(Bson::Int64(i64::from(i32::MAX) + 1))
        );
    }

    #[test]
    fn doubles_propagate() {
        assert_eq!(add(&Bson::Double(1.5), &Bson::Int32(1)), Some(Bson::Double(2.5)));
        assert_eq!(divide(&Bson::Int32(1984), &Bson::Int32(10)), Some(Bson::Double(198.4)));
        assert_eq!(floor(&Bson::Double(198.4)), Some(Bson::Double(198.0)));
    }

    #[test]
    fn zero_divisor_and_non_numeric() {
        assert_eq!(divide(&Bson::Int32(1), &Bson::Int32(0)), None);
        assert_eq!(modulo(&Bson::Int32(1), &Bson::Int32(0)), None);
        assert_eq!(add(&Bson::String("a".into()), &Bson::Int32(1)), None);
    }
}
