use crate::ast::{BinOp, Expr, Literal};
use crate::error::{Error, Result};
use crate::value::Collection;
use serde_json::Value as Json;

/// Evaluates a parsed FHIRPath subset expression against a resource, starting from
/// `$this = resource`.
pub fn evaluate(expr: &Expr, resource: &Json) -> Result<Collection> {
    eval(expr, &Collection::single(resource.clone()))
}

fn eval(expr: &Expr, this: &Collection) -> Result<Collection> {
    match expr {
        Expr::This => Ok(this.clone()),
        Expr::Literal(Literal::String(s)) => Ok(Collection::single(Json::String(s.clone()))),
        Expr::Literal(Literal::Number(n)) => Ok(Collection::single(
            serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
        )),
        Expr::Literal(Literal::Bool(b)) => Ok(Collection::from_bool(*b)),
        Expr::Path(subject, name) => {
            let subject = eval(subject, this)?;
            Ok(navigate(&subject, name))
        }
        Expr::Call(subject, name, args) => {
            let subject = eval(subject, this)?;
            call_function(name, &subject, args, this)
        }
        Expr::Binary(lhs, op, rhs) => eval_binary(lhs, *op, rhs, this),
    }
}

/// Navigate one field across every item in `subject`, flattening arrays — the
/// collection-valued semantics path navigation needs (`name.family` over a
/// repeating `name` yields every family across every name entry).
fn navigate(subject: &Collection, field: &str) -> Collection {
    let mut out = Vec::new();
    for item in &subject.0 {
        if let Json::Object(map) = item {
            if let Some(found) = map.get(field) {
                match found {
                    Json::Array(items) => out.extend(items.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
        }
    }
    Collection(out)
}

fn call_function(
    name: &str,
    subject: &Collection,
    args: &[Expr],
    this: &Collection,
) -> Result<Collection> {
    match name {
        "exists" => {
            if args.is_empty() {
                Ok(Collection::from_bool(!subject.is_empty()))
            } else {
                // exists(criteria): true if any item satisfies the predicate, with
                // that item bound as $this while the criteria is evaluated.
                for item in &subject.0 {
                    let bound = Collection::single(item.clone());
                    if eval(&args[0], &bound)?.as_bool3() == Some(true) {
                        return Ok(Collection::from_bool(true));
                    }
                }
                Ok(Collection::from_bool(false))
            }
        }
        "empty" => Ok(Collection::from_bool(subject.is_empty())),
        "not" => Ok(Collection::from_bool3(subject.as_bool3().map(|b| !b))),
        "count" => Ok(Collection::single(Json::Number(subject.0.len().into()))),
        "hasValue" => Ok(Collection::from_bool(
            subject.0.iter().any(|v| !v.is_null()),
        )),
        "all" => {
            if args.is_empty() {
                return Err(Error::UnknownFunction("all() requires a criteria argument".into()));
            }
            for item in &subject.0 {
                let bound = Collection::single(item.clone());
                if eval(&args[0], &bound)?.as_bool3() != Some(true) {
                    return Ok(Collection::from_bool(false));
                }
            }
            Ok(Collection::from_bool(true))
        }
        other => {
            let _ = this;
            Err(Error::UnknownFunction(other.to_string()))
        }
    }
}

fn eval_binary(lhs: &Expr, op: BinOp, rhs: &Expr, this: &Collection) -> Result<Collection> {
    match op {
        BinOp::And => {
            let l = eval(lhs, this)?.as_bool3();
            let r = eval(rhs, this)?.as_bool3();
            Ok(Collection::from_bool3(and3(l, r)))
        }
        BinOp::Or => {
            let l = eval(lhs, this)?.as_bool3();
            let r = eval(rhs, this)?.as_bool3();
            Ok(Collection::from_bool3(or3(l, r)))
        }
        BinOp::Implies => {
            let l = eval(lhs, this)?.as_bool3();
            let r = eval(rhs, this)?.as_bool3();
            Ok(Collection::from_bool3(implies3(l, r)))
        }
        BinOp::Eq | BinOp::Neq => {
            let l = eval(lhs, this)?;
            let r = eval(rhs, this)?;
            if l.is_empty() || r.is_empty() {
                return Ok(Collection::empty());
            }
            let equal = l.0 == r.0;
            Ok(Collection::from_bool(if op == BinOp::Eq { equal } else { !equal }))
        }
    }
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn implies3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match l {
        Some(false) => Some(true),
        Some(true) => r,
        None => {
            if r == Some(true) {
                Some(true)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn run(expr_src: &str, resource: &Json) -> Collection {
        let expr = parse(expr_src).unwrap();
        evaluate(&expr, resource).unwrap()
    }

    #[test]
    fn pat_1_passes_when_name_present() {
        let patient = json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});
        let result = run("name.exists() or identifier.exists()", &patient);
        assert_eq!(result.as_bool3(), Some(true));
    }

    #[test]
    fn pat_1_fails_when_neither_present() {
        let patient = json!({"resourceType": "Patient"});
        let result = run("name.exists() or identifier.exists()", &patient);
        assert_eq!(result.as_bool3(), Some(false));
    }

    #[test]
    fn obs_6_implication_holds_when_value_absent() {
        let observation = json!({"resourceType": "Observation", "dataAbsentReason": {"coding": []}});
        let result = run("value.exists() implies dataAbsentReason.empty()", &observation);
        // value is absent -> antecedent false -> implication true regardless of consequent
        assert_eq!(result.as_bool3(), Some(true));
    }

    #[test]
    fn obs_6_implication_fails_when_both_present() {
        let observation =
            json!({"resourceType": "Observation", "value": "120", "dataAbsentReason": {"text": "masked"}});
        let result = run("value.exists() implies dataAbsentReason.empty()", &observation);
        assert_eq!(result.as_bool3(), Some(false));
    }

    #[test]
    fn equality_of_scalar_path() {
        let observation = json!({"resourceType": "Observation", "status": "final"});
        let result = run("status = 'final'", &observation);
        assert_eq!(result.as_bool3(), Some(true));
    }

    #[test]
    fn count_and_not_compose() {
        let patient = json!({"name": [{"family": "A"}, {"family": "B"}]});
        let result = run("name.count()", &patient);
        assert_eq!(result.0, vec![json!(2)]);
    }
}
