use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-neutral filter over record properties, addressed by storage name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    Eq { field: String, value: Value },
    NotEq { field: String, value: Value },
    Gt { field: String, value: Value },
    Gte { field: String, value: Value },
    Lt { field: String, value: Value },
    Lte { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    NotIn { field: String, values: Vec<Value> },
    /// Matches when the list property contains the value.
    AnyTagEqualTo { field: String, value: Value },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::NotEq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Lte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        FilterExpr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        FilterExpr::NotIn {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn any_tag_equal_to(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::AnyTagEqualTo {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction; nested `And`s are flattened.
    pub fn and(self, other: FilterExpr) -> Self {
        match (self, other) {
            (FilterExpr::And(mut left), FilterExpr::And(right)) => {
                left.extend(right);
                FilterExpr::And(left)
            }
            (FilterExpr::And(mut left), other) => {
                left.push(other);
                FilterExpr::And(left)
            }
            (this, other) => FilterExpr::And(vec![this, other]),
        }
    }

    pub fn or(self, other: FilterExpr) -> Self {
        match (self, other) {
            (FilterExpr::Or(mut left), FilterExpr::Or(right)) => {
                left.extend(right);
                FilterExpr::Or(left)
            }
            (FilterExpr::Or(mut left), other) => {
                left.push(other);
                FilterExpr::Or(left)
            }
            (this, other) => FilterExpr::Or(vec![this, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Every field referenced anywhere in the expression.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_field_names(&mut names);
        names
    }

    fn collect_field_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            FilterExpr::Eq { field, .. }
            | FilterExpr::NotEq { field, .. }
            | FilterExpr::Gt { field, .. }
            | FilterExpr::Gte { field, .. }
            | FilterExpr::Lt { field, .. }
            | FilterExpr::Lte { field, .. }
            | FilterExpr::In { field, .. }
            | FilterExpr::NotIn { field, .. }
            | FilterExpr::AnyTagEqualTo { field, .. } => {
                if !names.contains(&field.as_str()) {
                    names.push(field);
                }
            }
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                for child in children {
                    child.collect_field_names(names);
                }
            }
            FilterExpr::Not(inner) => inner.collect_field_names(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combinators_flatten() {
        let filter = FilterExpr::eq("a", 1)
            .and(FilterExpr::gt("b", 2))
            .and(FilterExpr::lt("c", 3));
        match filter {
            FilterExpr::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }

        let filter = FilterExpr::eq("a", 1).or(FilterExpr::eq("a", 2)).or(FilterExpr::eq("a", 3));
        assert!(matches!(filter, FilterExpr::Or(ref c) if c.len() == 3));
    }

    #[test]
    fn test_field_names_deduplicated() {
        let filter = FilterExpr::eq("category", "books")
            .and(FilterExpr::is_in("tags", ["a", "b"]).or(FilterExpr::eq("category", "films")))
            .and(FilterExpr::lte("price", 9.5).not());
        assert_eq!(filter.field_names(), vec!["category", "tags", "price"]);
    }

    #[test]
    fn test_serde_shape() {
        let filter = FilterExpr::any_tag_equal_to("tags", "rust");
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"any_tag_equal_to": {"field": "tags", "value": "rust"}})
        );
    }
}
