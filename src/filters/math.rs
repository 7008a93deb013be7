//! Math filters
//!
//! The left value and arguments are coerced to numbers, with anything that
//! is not numeric counting as zero. Integer inputs give integer results.

use crate::value::Value;

use super::{FilterArgs, FilterError, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(value: &Value) -> Number {
        match value.as_number() {
            Some(Value::Int(i)) => Number::Int(i),
            Some(Value::Float(f)) => Number::Float(f),
            _ => Number::Int(0),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

fn number_arg(args: &FilterArgs, name: &str) -> Result<Number, FilterError> {
    args.expect_at_most(1)?;
    args.required(0, name).map(Number::from_value)
}

/// Digits after the decimal point in the shortest representation of `f`
fn decimal_places(f: f64) -> i32 {
    let repr = format!("{:?}", f);
    match repr.split_once('.') {
        Some((_, fraction)) if !fraction.contains('e') => fraction.trim_end_matches('0').len() as i32,
        _ => 0,
    }
}

/// Round to `places` decimal places, removing binary floating point noise
fn round_to(f: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places.min(15));
    (f * scale).round() / scale
}

/// Apply an integer or float operation, keeping as many decimal places as
/// the operands call for
fn arithmetic(
    left: Number,
    right: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    places: fn(i32, i32) -> i32,
) -> Number {
    if let (Number::Int(a), Number::Int(b)) = (left, right) {
        if let Some(result) = int_op(a, b) {
            return Number::Int(result);
        }
    }
    let (a, b) = (left.as_f64(), right.as_f64());
    let result = float_op(a, b);
    Number::Float(round_to(result, places(decimal_places(a), decimal_places(b))))
}

pub fn abs(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(match Number::from_value(left) {
        Number::Int(i) => Value::Int(i.saturating_abs()),
        Number::Float(f) => Value::Float(f.abs()),
    })
}

pub fn at_least(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    Ok(if right.as_f64() > left.as_f64() { right } else { left }.into_value())
}

pub fn at_most(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    Ok(if right.as_f64() < left.as_f64() { right } else { left }.into_value())
}

pub fn ceil(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(Value::Int(Number::from_value(left).as_f64().ceil() as i64))
}

pub fn floor(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(Value::Int(Number::from_value(left).as_f64().floor() as i64))
}

pub fn plus(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    Ok(arithmetic(left, right, i64::checked_add, |a, b| a + b, i32::max).into_value())
}

pub fn minus(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    Ok(arithmetic(left, right, i64::checked_sub, |a, b| a - b, i32::max).into_value())
}

pub fn times(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    Ok(arithmetic(left, right, i64::checked_mul, |a, b| a * b, |a, b| a + b).into_value())
}

/// Integer division rounds towards negative infinity
pub fn divided_by(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    if right.as_f64() == 0.0 {
        return Err(FilterError::argument(format!(
            "can't divide by {}",
            right.into_value()
        )));
    }

    Ok(match (left, right) {
        (Number::Int(a), Number::Int(b)) => match (a.checked_div(b), a.checked_rem(b)) {
            (Some(quotient), Some(rem)) if rem != 0 && (rem < 0) != (b < 0) => {
                Value::Int(quotient - 1)
            }
            (Some(quotient), Some(_)) => Value::Int(quotient),
            // i64::MIN / -1 doesn't fit
            _ => Value::Float(left.as_f64() / right.as_f64()),
        },
        _ => Value::Float(left.as_f64() / right.as_f64()),
    })
}

/// The remainder takes the sign of the divisor for integers
pub fn modulo(left: &Value, args: &FilterArgs) -> FilterResult {
    let (left, right) = (Number::from_value(left), number_arg(args, "number")?);
    if right.as_f64() == 0.0 {
        return Err(FilterError::argument(format!(
            "can't divide by {}",
            right.into_value()
        )));
    }

    Ok(match (left, right) {
        (Number::Int(a), Number::Int(b)) => {
            // Only i64::MIN % -1 overflows, and it divides exactly
            let rem = a.checked_rem(b).unwrap_or(0);
            if rem != 0 && (rem < 0) != (b < 0) {
                Value::Int(rem + b)
            } else {
                Value::Int(rem)
            }
        }
        _ => {
            let (a, b) = (left.as_f64(), right.as_f64());
            let places = decimal_places(a).max(decimal_places(b));
            Value::Float(round_to(a % b, places))
        }
    })
}

/// Round to an integer, or to a number of decimal places
pub fn round(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let number = Number::from_value(left).as_f64();

    let digits = match args.get(0).and_then(Value::as_int) {
        Some(digits) => digits,
        None => return Ok(Value::Int(number.round() as i64)),
    };

    Ok(match digits {
        d if d < 0 => Value::Int(0),
        0 => Value::Int(number.round() as i64),
        d => Value::Float(round_to(number, d as i32)),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, no_args};
    use super::*;

    fn one(value: impl Into<Value>) -> FilterArgs {
        args(vec![value.into()])
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(plus(&Value::Int(4), &one(2)).unwrap(), Value::Int(6));
        assert_eq!(plus(&Value::Float(0.1), &one(0.2)).unwrap(), Value::Float(0.3));
        assert_eq!(minus(&Value::from("16"), &one(4)).unwrap(), Value::Int(12));
        assert_eq!(times(&Value::Float(1.1), &one(3)).unwrap(), Value::Float(3.3));
        assert_eq!(plus(&Value::from("x"), &one(1)).unwrap(), Value::Int(1));
        assert!(plus(&Value::Int(1), &no_args()).is_err());
    }

    #[test]
    fn test_divided_by() {
        assert_eq!(divided_by(&Value::Int(16), &one(4)).unwrap(), Value::Int(4));
        assert_eq!(divided_by(&Value::Int(5), &one(3)).unwrap(), Value::Int(1));
        assert_eq!(divided_by(&Value::Int(-7), &one(2)).unwrap(), Value::Int(-4));
        assert_eq!(divided_by(&Value::Int(20), &one(7.0)).unwrap(), Value::Float(20.0 / 7.0));
        let err = divided_by(&Value::Int(1), &one(0)).unwrap_err();
        assert_eq!(err.to_string(), "can't divide by 0");
    }

    #[test]
    fn test_divided_by_extremes() {
        assert_eq!(
            divided_by(&Value::Int(i64::MIN), &one(-1)).unwrap(),
            Value::Float(9223372036854775808.0)
        );
        assert_eq!(divided_by(&Value::Int(i64::MIN), &one(2)).unwrap(), Value::Int(i64::MIN / 2));
        assert_eq!(divided_by(&Value::Int(i64::MIN), &one(i64::MAX)).unwrap(), Value::Int(-2));
        assert_eq!(divided_by(&Value::Int(-1), &one(i64::MAX)).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_modulo() {
        assert_eq!(modulo(&Value::Int(3), &one(2)).unwrap(), Value::Int(1));
        assert_eq!(modulo(&Value::Int(-7), &one(3)).unwrap(), Value::Int(2));
        assert_eq!(modulo(&Value::Float(183.357), &one(12)).unwrap(), Value::Float(3.357));
        assert!(modulo(&Value::Int(1), &one(0)).is_err());
    }

    #[test]
    fn test_modulo_extremes() {
        assert_eq!(modulo(&Value::Int(5), &one(i64::MAX)).unwrap(), Value::Int(5));
        assert_eq!(modulo(&Value::Int(-5), &one(i64::MAX)).unwrap(), Value::Int(i64::MAX - 5));
        assert_eq!(modulo(&Value::Int(5), &one(i64::MIN)).unwrap(), Value::Int(i64::MIN + 5));
        assert_eq!(modulo(&Value::Int(i64::MIN), &one(-1)).unwrap(), Value::Int(0));
        assert_eq!(modulo(&Value::Int(i64::MAX), &one(i64::MIN)).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(ceil(&Value::Float(1.2), &no_args()).unwrap(), Value::Int(2));
        assert_eq!(floor(&Value::from("3.7"), &no_args()).unwrap(), Value::Int(3));
        assert_eq!(round(&Value::Float(2.7), &no_args()).unwrap(), Value::Int(3));
        assert_eq!(round(&Value::Float(183.357), &one(2)).unwrap(), Value::Float(183.36));
        assert_eq!(round(&Value::Float(1.5), &one(-1)).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(abs(&Value::Int(-3), &no_args()).unwrap(), Value::Int(3));
        assert_eq!(abs(&Value::from("-1.5"), &no_args()).unwrap(), Value::Float(1.5));
        assert_eq!(at_least(&Value::Int(4), &one(5)).unwrap(), Value::Int(5));
        assert_eq!(at_most(&Value::Int(4), &one(5)).unwrap(), Value::Int(4));
    }
}
