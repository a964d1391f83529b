//! Typed read queries.
//!
//! Queries are built as values and rendered to DQL text only at the HTTP
//! boundary; the in-memory backend evaluates the same values directly.
//!
//! ```text
//! { q(func: type(Source), orderasc: name, first: 20) @filter(eq(geographic_scope, "national")) {
//!     uid
//!     name
//!     channel { uid name }
//! } }
//! ```

use crate::error::StoreError;
use inventory_schema::Uid;
use serde_json::Value as JsonValue;

/// Root function selecting the starting node set.
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    Uid(Vec<Uid>),
    Eq { predicate: String, value: JsonValue },
    Type(String),
    Has(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    fn keyword(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ge => "ge",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Lt => "lt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        op: CompareOp,
        predicate: String,
        value: JsonValue,
    },
    Type(String),
    Has(String),
    AnyOfTerms { predicate: String, terms: String },
    Uid(Vec<Uid>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(predicate: &str, value: impl Into<JsonValue>) -> Self {
        Filter::Compare {
            op: CompareOp::Eq,
            predicate: predicate.to_string(),
            value: value.into(),
        }
    }

    pub fn of_type(type_name: &str) -> Self {
        Filter::Type(type_name.to_string())
    }

    pub fn has(predicate: &str) -> Self {
        Filter::Has(predicate.to_string())
    }
}

/// A uid-valued edge followed from (or, with `reverse`, into) the node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Edge {
    pub predicate: String,
    pub reverse: bool,
    pub alias: Option<String>,
    pub filter: Option<Filter>,
    pub facets: bool,
    pub children: Vec<Selection>,
}

impl Edge {
    pub fn new(predicate: &str, children: Vec<Selection>) -> Self {
        Self {
            predicate: predicate.to_string(),
            children,
            ..Self::default()
        }
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_facets(mut self) -> Self {
        self.facets = true;
        self
    }

    /// Key the edge's result appears under.
    pub fn key(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None if self.reverse => format!("~{}", self.predicate),
            None => self.predicate.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field {
        predicate: String,
        alias: Option<String>,
        facets: bool,
    },
    Edge(Edge),
    /// Every predicate of the node, uid edges expanded with `children`.
    ExpandAll { children: Vec<Selection> },
    Count {
        alias: String,
        predicate: String,
        reverse: bool,
        filter: Option<Filter>,
    },
}

impl Selection {
    pub fn field(predicate: &str) -> Self {
        Selection::Field {
            predicate: predicate.to_string(),
            alias: None,
            facets: false,
        }
    }

    pub fn faceted(predicate: &str) -> Self {
        Selection::Field {
            predicate: predicate.to_string(),
            alias: None,
            facets: true,
        }
    }

    pub fn fields(predicates: &[&str]) -> Vec<Self> {
        predicates.iter().map(|p| Self::field(p)).collect()
    }
}

/// One query block.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub block: String,
    pub func: Func,
    pub filter: Option<Filter>,
    pub cascade: bool,
    pub order_asc: Option<String>,
    pub first: Option<usize>,
    pub offset: Option<usize>,
    pub selections: Vec<Selection>,
}

impl Query {
    pub fn new(block: &str, func: Func) -> Self {
        Self {
            block: block.to_string(),
            func,
            filter: None,
            cascade: false,
            order_asc: None,
            first: None,
            offset: None,
            selections: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn order_asc(mut self, predicate: &str) -> Self {
        self.order_asc = Some(predicate.to_string());
        self
    }

    pub fn first(mut self, n: usize) -> Self {
        self.first = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    pub fn select_all(mut self, selections: impl IntoIterator<Item = Selection>) -> Self {
        self.selections.extend(selections);
        self
    }

    /// Renders DQL. Fails on identifiers that could break out of the query.
    pub fn to_dql(&self) -> Result<String, StoreError> {
        check_ident(&self.block)?;
        let mut head = format!("{}(func: {}", self.block, render_func(&self.func)?);
        if let Some(order) = &self.order_asc {
            check_ident(order)?;
            head.push_str(&format!(", orderasc: {order}"));
        }
        if let Some(first) = self.first {
            head.push_str(&format!(", first: {first}"));
        }
        if let Some(offset) = self.offset {
            head.push_str(&format!(", offset: {offset}"));
        }
        head.push(')');
        if let Some(filter) = &self.filter {
            head.push_str(&format!(" @filter({})", render_filter(filter)?));
        }
        if self.cascade {
            head.push_str(" @cascade");
        }
        Ok(format!("{{ {head} {} }}", render_block(&self.selections)?))
    }
}

fn check_ident(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!("bad identifier `{name}`")))
    }
}

/// DQL string or number literal.
pub fn literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_uids(uids: &[Uid]) -> String {
    uids.iter().map(Uid::as_str).collect::<Vec<_>>().join(", ")
}

fn render_func(func: &Func) -> Result<String, StoreError> {
    Ok(match func {
        Func::Uid(uids) => {
            if uids.is_empty() {
                return Err(StoreError::InvalidQuery("uid() needs at least one uid".into()));
            }
            format!("uid({})", render_uids(uids))
        }
        Func::Eq { predicate, value } => {
            check_ident(predicate)?;
            format!("eq({predicate}, {})", literal(value))
        }
        Func::Type(t) => {
            check_ident(t)?;
            format!("type({t})")
        }
        Func::Has(p) => {
            check_ident(p)?;
            format!("has({p})")
        }
    })
}

fn render_filter(filter: &Filter) -> Result<String, StoreError> {
    Ok(match filter {
        Filter::Compare {
            op,
            predicate,
            value,
        } => {
            check_ident(predicate)?;
            format!("{}({predicate}, {})", op.keyword(), literal(value))
        }
        Filter::Type(t) => {
            check_ident(t)?;
            format!("type({t})")
        }
        Filter::Has(p) => {
            check_ident(p.trim_start_matches('~'))?;
            format!("has({p})")
        }
        Filter::AnyOfTerms { predicate, terms } => {
            check_ident(predicate)?;
            format!("anyofterms({predicate}, {})", quote(terms))
        }
        Filter::Uid(uids) => format!("uid({})", render_uids(uids)),
        Filter::And(parts) => join_filters(parts, " AND ")?,
        Filter::Or(parts) => join_filters(parts, " OR ")?,
        Filter::Not(inner) => format!("NOT ({})", render_filter(inner)?),
    })
}

fn join_filters(parts: &[Filter], sep: &str) -> Result<String, StoreError> {
    let rendered = parts
        .iter()
        .map(render_filter)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", rendered.join(sep)))
}

fn render_block(selections: &[Selection]) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(selections.len());
    for selection in selections {
        parts.push(render_selection(selection)?);
    }
    Ok(format!("{{ {} }}", parts.join(" ")))
}

fn render_selection(selection: &Selection) -> Result<String, StoreError> {
    Ok(match selection {
        Selection::Field {
            predicate,
            alias,
            facets,
        } => {
            check_ident(predicate)?;
            let mut s = match alias {
                Some(alias) => {
                    check_ident(alias)?;
                    format!("{alias}: {predicate}")
                }
                None => predicate.clone(),
            };
            if *facets {
                s.push_str(" @facets");
            }
            s
        }
        Selection::Edge(edge) => {
            check_ident(&edge.predicate)?;
            let mut s = String::new();
            if let Some(alias) = &edge.alias {
                check_ident(alias)?;
                s.push_str(alias);
                s.push_str(": ");
            }
            if edge.reverse {
                s.push('~');
            }
            s.push_str(&edge.predicate);
            if edge.facets {
                s.push_str(" @facets");
            }
            if let Some(filter) = &edge.filter {
                s.push_str(&format!(" @filter({})", render_filter(filter)?));
            }
            s.push(' ');
            s.push_str(&render_block(&edge.children)?);
            s
        }
        Selection::ExpandAll { children } => {
            if children.is_empty() {
                "expand(_all_)".to_string()
            } else {
                format!("expand(_all_) {}", render_block(children)?)
            }
        }
        Selection::Count {
            alias,
            predicate,
            reverse,
            filter,
        } => {
            check_ident(alias)?;
            check_ident(predicate)?;
            let tilde = if *reverse { "~" } else { "" };
            match filter {
                Some(f) => format!("{alias}: count({tilde}{predicate} @filter({}))", render_filter(f)?),
                None => format!("{alias}: count({tilde}{predicate})"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_query() {
        let q = Query::new("q", Func::Type("Source".into()))
            .order_asc("name")
            .first(10)
            .filter(Filter::And(vec![
                Filter::eq("geographic_scope", "national"),
                Filter::Not(Box::new(Filter::has("~publishes"))),
            ]))
            .select_all(Selection::fields(&["uid", "name"]))
            .select(Selection::Edge(
                Edge::new("publishes", Selection::fields(&["name"]))
                    .reverse()
                    .alias("published_by")
                    .filter(Filter::of_type("Organization")),
            ))
            .select(Selection::Count {
                alias: "n".into(),
                predicate: "country".into(),
                reverse: false,
                filter: None,
            });
        assert_eq!(
            q.to_dql().unwrap(),
            "{ q(func: type(Source), orderasc: name, first: 10) \
             @filter((eq(geographic_scope, \"national\") AND NOT (has(~publishes)))) \
             { uid name published_by: ~publishes @filter(type(Organization)) { name } n: count(country) } }"
        );
    }

    #[test]
    fn escapes_literals_and_rejects_bad_identifiers() {
        let q = Query::new(
            "q",
            Func::Eq {
                predicate: "unique_name".into(),
                value: json!("a\"b"),
            },
        )
        .select(Selection::field("uid"));
        assert!(q.to_dql().unwrap().contains(r#"eq(unique_name, "a\"b")"#));

        let bad = Query::new("q", Func::Has("name) { x".into()));
        assert!(matches!(bad.to_dql(), Err(StoreError::InvalidQuery(_))));
        assert!(Query::new("q", Func::Uid(vec![])).to_dql().is_err());
    }
}
