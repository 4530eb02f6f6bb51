use crate::errors::StoreError;
use crate::num;
use crate::query::get_path;
use bson::{Bson, Document};

/// Operators usable inside aggregation expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Floor,
    ToString,
    Concat,
}

impl ExprOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$add" => Self::Add,
            "$subtract" => Self::Subtract,
            "$multiply" => Self::Multiply,
            "$divide" => Self::Divide,
            "$mod" => Self::Mod,
            "$floor" => Self::Floor,
            "$toString" => Self::ToString,
            "$concat" => Self::Concat,
            _ => return None,
        })
    }

    /// Required argument count, `None` for variadic operators.
    const fn arity(self) -> Option<usize> {
        match self {
            Self::Subtract | Self::Divide | Self::Mod => Some(2),
            Self::Floor | Self::ToString => Some(1),
            Self::Add | Self::Multiply | Self::Concat => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `"$a.b"`: value at a dotted path of the current document.
    Field(String),
    Literal(Bson),
    Op(ExprOp, Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
}

/// Parses an expression value.
///
/// # Errors
/// Returns `StoreError::Query` for unknown operators or a wrong argument count.
pub fn parse_expr(v: &Bson) -> Result<Expr, StoreError> {
    match v {
        Bson::String(s) if s.starts_with('$') => {
            let path = &s[1..];
            if path.is_empty() || path.starts_with('$') {
                return Err(StoreError::query(format!("invalid field path {s}")));
            }
            Ok(Expr::Field(path.to_string()))
        }
        Bson::Array(items) => Ok(Expr::Array(items.iter().map(parse_expr).collect::<Result<_, _>>()?)),
        Bson::Document(d) => parse_object(d),
        other => Ok(Expr::Literal(other.clone())),
    }
}

fn parse_object(d: &Document) -> Result<Expr, StoreError> {
    let mut keys = d.keys();
    if let (Some(first), None) = (keys.next(), keys.next())
        && first.starts_with('$')
    {
        let arg = d.get(first).cloned().unwrap_or(Bson::Null);
        if first == "$literal" {
            return Ok(Expr::Literal(arg));
        }
        let op = ExprOp::from_name(first)
            .ok_or_else(|| StoreError::query(format!("unknown expression operator {first}")))?;
        let args = match &arg {
            Bson::Array(items) => items.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?,
            single => vec![parse_expr(single)?],
        };
        if let Some(n) = op.arity()
            && args.len() != n
        {
            return Err(StoreError::query(format!("{first} takes {n} argument(s), got {}", args.len())));
        }
        return Ok(Expr::Op(op, args));
    }
    let fields = d
        .iter()
        .map(|(k, v)| {
            if k.starts_with('$') {
                return Err(StoreError::query(format!("unexpected operator {k} in object expression")));
            }
            Ok((k.clone(), parse_expr(v)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::Object(fields))
}

const fn is_nullish(v: &Bson) -> bool {
    matches!(v, Bson::Null | Bson::Undefined)
}

fn numeric_arg(op: &str, v: &Bson) -> Result<(), StoreError> {
    if num::is_numeric(v) {
        Ok(())
    } else {
        Err(StoreError::query(format!("{op} only supports numeric types, got {v}")))
    }
}

/// Integral doubles print without a fraction, matching the server's `$toString`.
#[allow(clippy::cast_possible_truncation)]
fn double_to_string(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

fn to_string(v: &Bson) -> Result<Bson, StoreError> {
    Ok(Bson::String(match v {
        Bson::String(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => double_to_string(*f),
        Bson::Boolean(b) => b.to_string(),
        Bson::ObjectId(o) => o.to_hex(),
        Bson::DateTime(d) => d.try_to_rfc3339_string().map_err(|e| StoreError::query(e.to_string()))?,
        other => return Err(StoreError::query(format!("$toString unsupported for {other}"))),
    }))
}

fn apply_op(op: ExprOp, args: &[Bson]) -> Result<Bson, StoreError> {
    // Null or missing operands make the whole expression null.
    if args.iter().any(is_nullish) {
        return Ok(Bson::Null);
    }
    match op {
        ExprOp::Add | ExprOp::Multiply => {
            let name = if op == ExprOp::Add { "$add" } else { "$multiply" };
            let mut acc = if op == ExprOp::Add { Bson::Int32(0) } else { Bson::Int32(1) };
            for a in args {
                numeric_arg(name, a)?;
                acc = if op == ExprOp::Add { num::add(&acc, a) } else { num::multiply(&acc, a) }
                    .ok_or_else(|| StoreError::query(format!("{name} failed")))?;
            }
            Ok(acc)
        }
        ExprOp::Subtract | ExprOp::Divide | ExprOp::Mod => {
            let (name, f): (&str, fn(&Bson, &Bson) -> Option<Bson>) = match op {
                ExprOp::Subtract => ("$subtract", num::subtract),
                ExprOp::Divide => ("$divide", num::divide),
                _ => ("$mod", num::modulo),
            };
            numeric_arg(name, &args[0])?;
            numeric_arg(name, &args[1])?;
            f(&args[0], &args[1]).ok_or_else(|| StoreError::query(format!("{name} by zero")))
        }
        ExprOp::Floor => {
            numeric_arg("$floor", &args[0])?;
            num::floor(&args[0]).ok_or_else(|| StoreError::query("$floor failed"))
        }
        ExprOp::ToString => to_string(&args[0]),
        ExprOp::Concat => {
            let mut out = String::new();
            for a in args {
                match a {
                    Bson::String(s) => out.push_str(s),
                    other => return Err(StoreError::query(format!("$concat only supports strings, got {other}"))),
                }
            }
            Ok(Bson::String(out))
        }
    }
}

/// Evaluates `expr` against `doc`. Missing fields evaluate to `null`.
///
/// # Errors
/// Returns `StoreError::Query` on type errors and division by zero.
pub fn eval(expr: &Expr, doc: &Document) -> Result<Bson, StoreError> {
    match expr {
        Expr::Field(path) => Ok(get_path(doc, path).cloned().unwrap_or(Bson::Null)),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Array(items) => Ok(Bson::Array(items.iter().map(|e| eval(e, doc)).collect::<Result<_, _>>()?)),
        Expr::Object(fields) => {
            let mut out = Document::new();
            for (k, e) in fields {
                out.insert(k.clone(), eval(e, doc)?);
            }
            Ok(Bson::Document(out))
        }
        Expr::Op(op, args) => {
            let vals = args.iter().map(|a| eval(a, doc)).collect::<Result<Vec<_>, _>>()?;
            apply_op(*op, &vals)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn run(expr: Bson, d: &Document) -> Result<Bson, StoreError> {
        eval(&parse_expr(&expr)?, d)
    }

    #[test]
    fn decade_label() {
        let e = Bson::Document(doc! {
            "$concat": [
                {"$toString": {"$subtract": ["$published_year", {"$mod": ["$published_year", 10]}]}},
                "s"
            ]
        });
        assert_eq!(run(e.clone(), &doc! {"published_year": 1988}).unwrap(), Bson::String("1980s".into()));
        assert_eq!(run(e.clone(), &doc! {"published_year": 2021}).unwrap(), Bson::String("2020s".into()));
        assert_eq!(run(e.clone(), &doc! {"published_year": 2016.0}).unwrap(), Bson::String("2010s".into()));
        assert_eq!(run(e, &doc! {}).unwrap(), Bson::Null);
    }

    #[test]
    fn arithmetic_and_errors() {
        let d = doc! {"a": 7, "b": 2.5};
        assert_eq!(run(Bson::Document(doc! {"$add": ["$a", 1, "$b"]}), &d).unwrap(), Bson::Double(10.5));
        assert_eq!(run(Bson::Document(doc! {"$floor": "$b"}), &d).unwrap(), Bson::Double(2.0));
        assert!(run(Bson::Document(doc! {"$divide": ["$a", 0]}), &d).is_err());
        assert!(run(Bson::Document(doc! {"$add": ["$a", "x"]}), &d).is_err());
        assert!(run(Bson::Document(doc! {"$subtract": ["$a"]}), &d).is_err());
        assert!(parse_expr(&Bson::Document(doc! {"$pow": [2, 3]})).is_err());
    }

    #[test]
    fn literals_objects_and_to_string() {
        let d = doc! {"t": "Dune", "ok": true};
        assert_eq!(run(Bson::Document(doc! {"$literal": "$t"}), &d).unwrap(), Bson::String("$t".into()));
        assert_eq!(
            run(Bson::Document(doc! {"name": "$t", "n": 1}), &d).unwrap(),
            Bson::Document(doc! {"name": "Dune", "n": 1})
        );
        assert_eq!(run(Bson::Document(doc! {"$toString": "$ok"}), &d).unwrap(), Bson::String("true".into()));
        assert_eq!(double_to_string(13.99), "13.99");
    }
}
