use kernel_connectors_common::{FilterExpr, RecordDefinition};
use qdrant_client::qdrant::{Condition, Filter, Range};
use serde_json::Value;

/// Translates a [`FilterExpr`] into a Qdrant filter.
///
/// Every referenced field has to be a storage name of the definition.
/// Errors are returned as plain messages; callers wrap them with the
/// operation they belong to.
pub fn build_filter(definition: &RecordDefinition, expr: &FilterExpr) -> Result<Filter, String> {
    let storage_names = definition.storage_names();
    for field in expr.field_names() {
        if !storage_names.contains(&field) {
            return Err(format!(
                "field '{}' is not in the data model (storage names are used)",
                field
            ));
        }
    }

    match expr {
        FilterExpr::And(children) => Ok(Filter::must(
            children.iter().map(condition).collect::<Result<Vec<_>, _>>()?,
        )),
        other => Ok(Filter::must([condition(other)?])),
    }
}

fn condition(expr: &FilterExpr) -> Result<Condition, String> {
    match expr {
        FilterExpr::Eq { field, value } => equals(field, value),
        FilterExpr::NotEq { field, value } => Ok(Filter::must_not([equals(field, value)?]).into()),
        FilterExpr::Gt { field, value } => Ok(Condition::range(
            field.as_str(),
            Range {
                gt: Some(number(field, value)?),
                ..Default::default()
            },
        )),
        FilterExpr::Gte { field, value } => Ok(Condition::range(
            field.as_str(),
            Range {
                gte: Some(number(field, value)?),
                ..Default::default()
            },
        )),
        FilterExpr::Lt { field, value } => Ok(Condition::range(
            field.as_str(),
            Range {
                lt: Some(number(field, value)?),
                ..Default::default()
            },
        )),
        FilterExpr::Lte { field, value } => Ok(Condition::range(
            field.as_str(),
            Range {
                lte: Some(number(field, value)?),
                ..Default::default()
            },
        )),
        FilterExpr::In { field, values } => any_of(field, values),
        FilterExpr::NotIn { field, values } => Ok(Filter::must_not([any_of(field, values)?]).into()),
        FilterExpr::AnyTagEqualTo { field, value } => equals(field, value),
        FilterExpr::And(children) => Ok(Filter::must(
            children.iter().map(condition).collect::<Result<Vec<_>, _>>()?,
        )
        .into()),
        FilterExpr::Or(children) => Ok(Filter::should(
            children.iter().map(condition).collect::<Result<Vec<_>, _>>()?,
        )
        .into()),
        FilterExpr::Not(inner) => Ok(Filter::must_not([condition(inner)?]).into()),
    }
}

fn equals(field: &str, value: &Value) -> Result<Condition, String> {
    match value {
        Value::String(s) => Ok(Condition::matches(field, s.clone())),
        Value::Bool(b) => Ok(Condition::matches(field, *b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Condition::matches(field, i)),
            // Qdrant has no float match; an exact value is a closed range.
            None => {
                let f = number(field, value)?;
                Ok(Condition::range(
                    field,
                    Range {
                        gte: Some(f),
                        lte: Some(f),
                        ..Default::default()
                    },
                ))
            }
        },
        other => Err(format!(
            "unsupported value {} for equality on field '{}'",
            other, field
        )),
    }
}

fn any_of(field: &str, values: &[Value]) -> Result<Condition, String> {
    if let Some(keywords) = values
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
    {
        return Ok(Condition::matches(field, keywords));
    }
    if let Some(integers) = values.iter().map(Value::as_i64).collect::<Option<Vec<i64>>>() {
        return Ok(Condition::matches(field, integers));
    }
    Err(format!(
        "values for field '{}' must all be strings or all be integers",
        field
    ))
}

fn number(field: &str, value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("range filter on field '{}' needs a number, got {}", field, value))
}
