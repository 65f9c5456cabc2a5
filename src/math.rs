// Fixed mathematical namespace reachable as `Math.<name>` in expressions
//
// Resolved by the compiler, never against the record. Only deterministic
// members exist: there is no `Math.random`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::value::Value;

/// Numeric function exposed as `Math.<name>(...)`.
///
/// Arguments are already coerced to numbers; missing arguments are NaN.
pub type MathFn = fn(&[f64]) -> f64;

static CONSTANTS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    use std::f64::consts;
    HashMap::from([
        ("E", consts::E),
        ("LN2", consts::LN_2),
        ("LN10", consts::LN_10),
        ("LOG2E", consts::LOG2_E),
        ("LOG10E", consts::LOG10_E),
        ("PI", consts::PI),
        ("SQRT1_2", consts::FRAC_1_SQRT_2),
        ("SQRT2", consts::SQRT_2),
    ])
});

static FUNCTIONS: Lazy<HashMap<&'static str, MathFn>> = Lazy::new(|| {
    let table: [(&'static str, MathFn); 34] = [
        ("abs", |a| arg(a, 0).abs()),
        ("acos", |a| arg(a, 0).acos()),
        ("acosh", |a| arg(a, 0).acosh()),
        ("asin", |a| arg(a, 0).asin()),
        ("asinh", |a| arg(a, 0).asinh()),
        ("atan", |a| arg(a, 0).atan()),
        ("atanh", |a| arg(a, 0).atanh()),
        ("atan2", |a| arg(a, 0).atan2(arg(a, 1))),
        ("cbrt", |a| arg(a, 0).cbrt()),
        ("ceil", |a| arg(a, 0).ceil()),
        ("clz32", |a| clz32(arg(a, 0))),
        ("cos", |a| arg(a, 0).cos()),
        ("cosh", |a| arg(a, 0).cosh()),
        ("exp", |a| arg(a, 0).exp()),
        ("expm1", |a| arg(a, 0).exp_m1()),
        ("floor", |a| arg(a, 0).floor()),
        ("fround", |a| arg(a, 0) as f32 as f64),
        ("hypot", |a| a.iter().map(|x| x * x).sum::<f64>().sqrt()),
        ("log", |a| arg(a, 0).ln()),
        ("log1p", |a| arg(a, 0).ln_1p()),
        ("log2", |a| arg(a, 0).log2()),
        ("log10", |a| arg(a, 0).log10()),
        ("max", max),
        ("min", min),
        ("pow", |a| pow(arg(a, 0), arg(a, 1))),
        ("round", |a| round(arg(a, 0))),
        ("sign", |a| sign(arg(a, 0))),
        ("sin", |a| arg(a, 0).sin()),
        ("sinh", |a| arg(a, 0).sinh()),
        ("sqrt", |a| arg(a, 0).sqrt()),
        ("tan", |a| arg(a, 0).tan()),
        ("tanh", |a| arg(a, 0).tanh()),
        ("trunc", |a| arg(a, 0).trunc()),
        ("imul", |a| imul(arg(a, 0), arg(a, 1))),
    ];
    table.into_iter().collect()
});

/// Look up a constant such as `PI`.
pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS.get(name).copied()
}

/// Look up a function such as `floor`.
pub fn function(name: &str) -> Option<MathFn> {
    FUNCTIONS.get(name).copied()
}

/// Like [`function`], also returning the interned name.
pub fn function_entry(name: &str) -> Option<(&'static str, MathFn)> {
    FUNCTIONS.get_key_value(name).map(|(k, f)| (*k, *f))
}

fn arg(args: &[f64], i: usize) -> f64 {
    args.get(i).copied().unwrap_or(f64::NAN)
}

fn max(args: &[f64]) -> f64 {
    args.iter().try_fold(f64::NEG_INFINITY, |acc, &x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.max(x))
        }
    })
    .unwrap_or(f64::NAN)
}

fn min(args: &[f64]) -> f64 {
    args.iter().try_fold(f64::INFINITY, |acc, &x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.min(x))
        }
    })
    .unwrap_or(f64::NAN)
}

/// Power with the expression language's edge cases: `x ** NaN` is NaN even
/// for `x == 1`, and `(±1) ** ±Infinity` is NaN.
pub fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Round half up (towards +∞), unlike `f64::round` which rounds half away
/// from zero.
fn round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    (x + 0.5).floor()
}

fn sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn to_u32(x: f64) -> u32 {
    Value::Number(x).to_uint32()
}

fn clz32(x: f64) -> f64 {
    to_u32(x).leading_zeros() as f64
}

fn imul(a: f64, b: f64) -> f64 {
    (to_u32(a) as i32).wrapping_mul(to_u32(b) as i32) as f64
}
