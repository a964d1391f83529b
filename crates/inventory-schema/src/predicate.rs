//! Predicate type library.
//!
//! A [`Predicate`] is a declarative field descriptor: its [`PredicateKind`]
//! decides how raw (untrusted JSON) input is coerced, the flags decide when it
//! may be set and by whom. Validation here is pure; anything that needs the
//! store or an external lookup (inline new entities, autocodes) is only
//! *parsed* here and resolved by the sanitizer.

use crate::dates;
use crate::error::ValidationError;
use crate::role::{Operation, Role};
use crate::uid::{is_uid, NodeRef, Uid};
use crate::value::{FieldValue, GeoPoint, Item, Value};
use serde_json::{Map, Value as JsonValue};

// ============================================================================
// Descriptor parts
// ============================================================================

/// Ordered `(key, label)` pairs a choice predicate accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChoiceSet(Vec<(String, String)>);

impl ChoiceSet {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, l)| ((*k).to_string(), (*l).to_string()))
                .collect(),
        )
    }

    /// Choices whose label is the key itself.
    pub fn from_keys(keys: &[&str]) -> Self {
        Self(keys.iter().map(|k| ((*k).to_string(), (*k).to_string())).collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, l)| l.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which entity types a relationship may point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConstraint {
    Any,
    Types(Vec<String>),
}

impl TargetConstraint {
    pub fn one(type_name: &str) -> Self {
        TargetConstraint::Types(vec![type_name.to_string()])
    }

    pub fn many(type_names: &[&str]) -> Self {
        TargetConstraint::Types(type_names.iter().map(|t| (*t).to_string()).collect())
    }

    /// `true` if a node tagged with `types` is an acceptable target.
    pub fn allows<S: AsRef<str>>(&self, types: &[S]) -> bool {
        match self {
            TargetConstraint::Any => true,
            TargetConstraint::Types(allowed) => types
                .iter()
                .any(|t| allowed.iter().any(|a| a == t.as_ref())),
        }
    }

    /// Type used for inline new entities.
    pub fn primary(&self) -> Option<&str> {
        match self {
            TargetConstraint::Any => None,
            TargetConstraint::Types(allowed) => allowed.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
}

/// External lookups an autocode predicate can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// Free-text location → subnational entity (geocoded).
    Subunit,
    /// Postal address → canonical address string and point.
    Address,
    /// Publisher names or uids → `publishes` edges from the publisher.
    Publisher,
    /// Code repository URL → package ids, languages, license.
    Repository,
    /// Social media handle → follower count and verification flag.
    SocialProfile,
}

/// Derived-field population for a predicate.
///
/// With `input == None` the predicate's own submitted value is resolved;
/// otherwise the resolver runs on the named auxiliary field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autocode {
    pub resolver: ResolverKind,
    pub input: Option<String>,
}

impl Autocode {
    pub fn own(resolver: ResolverKind) -> Self {
        Self {
            resolver,
            input: None,
        }
    }

    pub fn from_field(resolver: ResolverKind, input: &str) -> Self {
        Self {
            resolver,
            input: Some(input.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetType {
    String,
    Int,
    Bool,
    DateTime,
}

/// A facet a predicate's values may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSpec {
    pub key: String,
    pub dtype: FacetType,
    pub choices: Option<ChoiceSet>,
    pub queryable: bool,
}

impl FacetSpec {
    pub fn new(key: &str, dtype: FacetType) -> Self {
        Self {
            key: key.to_string(),
            dtype,
            choices: None,
            queryable: false,
        }
    }

    pub fn string(key: &str) -> Self {
        Self::new(key, FacetType::String)
    }

    pub fn with_choices(mut self, choices: ChoiceSet) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn queryable(mut self) -> Self {
        self.queryable = true;
        self
    }

    fn validate(&self, field: &str, raw: &JsonValue) -> Result<Value, ValidationError> {
        let bad = |what: &str| {
            ValidationError::field(field, format!("facet `{}`: {what}", self.key))
        };
        let value = match self.dtype {
            FacetType::String => {
                let text = scalar_text(raw).ok_or_else(|| bad("expected text"))?;
                if let Some(choices) = &self.choices {
                    if !choices.contains(&text) {
                        return Err(bad(&format!("`{text}` is not an allowed choice")));
                    }
                }
                Value::String(text)
            }
            FacetType::Int => Value::Int(parse_int(raw).ok_or_else(|| bad("expected an integer"))?),
            FacetType::Bool => Value::Bool(parse_bool(raw).ok_or_else(|| bad("expected a boolean"))?),
            FacetType::DateTime => {
                let text = scalar_text(raw).ok_or_else(|| bad("expected a date"))?;
                Value::DateTime(dates::parse_permissive(&text).ok_or_else(|| bad("unparseable date"))?)
            }
        };
        Ok(value)
    }
}

/// Value applied when a predicate is absent from a new entry's input.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    Now,
    Generated(fn() -> Value),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Now => Value::DateTime(chrono::Utc::now()),
            DefaultValue::Generated(f) => f(),
        }
    }
}

// ============================================================================
// Kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateKind {
    /// Node identity; never stored as a predicate.
    Uid,
    /// Globally unique slug.
    UniqueName,
    String,
    ListString {
        delimiter: char,
        ordered: bool,
    },
    Integer,
    Boolean,
    DateTime,
    Year,
    /// Years with facets, e.g. audience size per year.
    ListYear,
    SingleChoice {
        choices: ChoiceSet,
        numeric: bool,
    },
    MultipleChoice {
        choices: ChoiceSet,
        numeric: bool,
    },
    Relationship {
        cardinality: Cardinality,
        target: TargetConstraint,
        allow_new: bool,
        mutual: bool,
    },
    /// Read-only projection of `predicate` edges pointing at this node.
    ReverseRelationship {
        predicate: String,
        target: TargetConstraint,
    },
    Geo,
    Password,
}

/// One parsed element of relationship input.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkInput {
    Existing(Uid),
    /// Inline object describing a new entity of the target type.
    Inline(Map<String, JsonValue>),
    /// Free text naming a new entity.
    Text(String),
}

// ============================================================================
// Predicate
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub name: String,
    pub kind: PredicateKind,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    /// Settable when creating an entry.
    pub new: bool,
    /// Settable when editing an entry.
    pub edit: bool,
    pub read_only: bool,
    pub hidden: bool,
    pub queryable: bool,
    pub large_textfield: bool,
    /// On upsert, clear the stored value before writing the new one.
    pub overwrite: bool,
    /// Minimum role needed to supply this predicate.
    pub permission: Role,
    pub default: Option<DefaultValue>,
    pub facets: Vec<FacetSpec>,
    pub directives: Vec<String>,
    pub autocode: Option<Autocode>,
    /// `false` for input-only fields that never reach the store.
    pub stored: bool,
}

fn default_label(name: &str) -> String {
    let mut label = name.replace('_', " ");
    if let Some(first) = label.get(..1) {
        let upper = first.to_uppercase();
        label.replace_range(..1, &upper);
    }
    label
}

impl Predicate {
    pub fn new(name: &str, kind: PredicateKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            label: default_label(name),
            description: None,
            required: false,
            new: true,
            edit: true,
            read_only: false,
            hidden: false,
            queryable: false,
            large_textfield: false,
            overwrite: false,
            permission: Role::Anonymous,
            default: None,
            facets: Vec::new(),
            directives: Vec::new(),
            autocode: None,
            stored: true,
        }
    }

    pub fn uid() -> Self {
        Self::new("uid", PredicateKind::Uid).hidden().fixed()
    }

    pub fn unique_name() -> Self {
        Self::new("unique_name", PredicateKind::UniqueName)
            .hidden()
            .directive("@index(hash, trigram)")
            .directive("@upsert")
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, PredicateKind::String)
    }

    /// Unordered, de-duplicated, comma separated.
    pub fn list_string(name: &str) -> Self {
        Self::new(
            name,
            PredicateKind::ListString {
                delimiter: ',',
                ordered: false,
            },
        )
    }

    /// Keeps input order via a sequence facet on each element.
    pub fn ordered_list(name: &str, delimiter: char) -> Self {
        Self::new(
            name,
            PredicateKind::ListString {
                delimiter,
                ordered: true,
            },
        )
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, PredicateKind::Integer)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, PredicateKind::Boolean)
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, PredicateKind::DateTime)
    }

    pub fn year(name: &str) -> Self {
        Self::new(name, PredicateKind::Year)
    }

    pub fn list_year(name: &str) -> Self {
        Self::new(name, PredicateKind::ListYear)
    }

    pub fn single_choice(name: &str, choices: ChoiceSet) -> Self {
        Self::new(
            name,
            PredicateKind::SingleChoice {
                choices,
                numeric: false,
            },
        )
    }

    pub fn single_choice_int(name: &str, choices: ChoiceSet) -> Self {
        Self::new(
            name,
            PredicateKind::SingleChoice {
                choices,
                numeric: true,
            },
        )
    }

    pub fn multiple_choice(name: &str, choices: ChoiceSet) -> Self {
        Self::new(
            name,
            PredicateKind::MultipleChoice {
                choices,
                numeric: false,
            },
        )
    }

    pub fn multiple_choice_int(name: &str, choices: ChoiceSet) -> Self {
        Self::new(
            name,
            PredicateKind::MultipleChoice {
                choices,
                numeric: true,
            },
        )
    }

    fn relationship(name: &str, cardinality: Cardinality, target: TargetConstraint, mutual: bool) -> Self {
        Self::new(
            name,
            PredicateKind::Relationship {
                cardinality,
                target,
                allow_new: false,
                mutual,
            },
        )
    }

    pub fn single_relationship(name: &str, target: TargetConstraint) -> Self {
        Self::relationship(name, Cardinality::Single, target, false)
    }

    pub fn list_relationship(name: &str, target: TargetConstraint) -> Self {
        Self::relationship(name, Cardinality::List, target, false)
    }

    /// List relationship whose edges are mirrored on the target.
    pub fn mutual_relationship(name: &str, target: TargetConstraint) -> Self {
        Self::relationship(name, Cardinality::List, target, true)
    }

    /// Read-only view of `predicate` edges from `target` nodes.
    pub fn reverse(name: &str, predicate: &str, target: TargetConstraint) -> Self {
        Self::new(
            name,
            PredicateKind::ReverseRelationship {
                predicate: predicate.to_string(),
                target,
            },
        )
        .fixed()
        .read_only()
    }

    pub fn geo(name: &str) -> Self {
        Self::new(name, PredicateKind::Geo)
    }

    pub fn password(name: &str) -> Self {
        Self::new(name, PredicateKind::Password).hidden()
    }

    // ------------------------------------------------------------------------
    // Chained setters
    // ------------------------------------------------------------------------

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_new(mut self) -> Self {
        self.new = false;
        self
    }

    pub fn not_edit(mut self) -> Self {
        self.edit = false;
        self
    }

    /// Neither settable on create nor on edit.
    pub fn fixed(self) -> Self {
        self.not_new().not_edit()
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn queryable(mut self) -> Self {
        self.queryable = true;
        self
    }

    pub fn large(mut self) -> Self {
        self.large_textfield = true;
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn permission(mut self, role: Role) -> Self {
        self.permission = role;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    pub fn default_with(mut self, f: fn() -> Value) -> Self {
        self.default = Some(DefaultValue::Generated(f));
        self
    }

    pub fn facet(mut self, facet: FacetSpec) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn autocode(mut self, autocode: Autocode) -> Self {
        self.autocode = Some(autocode);
        self
    }

    /// Input-only field: validated and resolved, never written as itself.
    pub fn virtual_field(mut self) -> Self {
        self.stored = false;
        self
    }

    /// Relationship accepts inline objects / free text for new targets.
    pub fn allow_new(mut self) -> Self {
        if let PredicateKind::Relationship { allow_new, .. } = &mut self.kind {
            *allow_new = true;
        }
        self
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Whether input for this predicate is accepted in `op`.
    pub fn settable(&self, op: Operation) -> bool {
        if matches!(
            self.kind,
            PredicateKind::Uid | PredicateKind::ReverseRelationship { .. }
        ) {
            return false;
        }
        match op {
            Operation::Create => self.new,
            Operation::Edit => self.edit,
        }
    }

    /// Stored as a list (`[type]`) in the storage schema.
    pub fn is_list(&self) -> bool {
        match &self.kind {
            PredicateKind::ListString { .. }
            | PredicateKind::ListYear
            | PredicateKind::MultipleChoice { .. } => true,
            PredicateKind::Relationship { cardinality, .. } => *cardinality == Cardinality::List,
            _ => false,
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, PredicateKind::Relationship { .. })
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self.kind,
            PredicateKind::DateTime | PredicateKind::Year | PredicateKind::ListYear
        )
    }

    pub fn target(&self) -> Option<&TargetConstraint> {
        match &self.kind {
            PredicateKind::Relationship { target, .. }
            | PredicateKind::ReverseRelationship { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn allows_new(&self) -> bool {
        matches!(self.kind, PredicateKind::Relationship { allow_new: true, .. })
    }

    pub fn is_mutual(&self) -> bool {
        matches!(self.kind, PredicateKind::Relationship { mutual: true, .. })
    }

    fn err(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::field(&self.name, message)
    }

    fn absent(&self) -> Result<Option<FieldValue>, ValidationError> {
        if self.required {
            Err(self.err("a value is required"))
        } else {
            Ok(None)
        }
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validates and coerces raw input.
    ///
    /// `Ok(None)` means "absent": null, blank text or an empty list on an
    /// optional predicate. Relationship input must consist of existing uids
    /// here; inline targets go through [`Predicate::parse_links`].
    pub fn validate(&self, raw: &JsonValue) -> Result<Option<FieldValue>, ValidationError> {
        if raw.is_null() {
            return self.absent();
        }
        match &self.kind {
            PredicateKind::Uid => {
                let text = scalar_text(raw).ok_or_else(|| self.err("expected a node uid"))?;
                let uid = Uid::parse(&text).map_err(|e| self.err(e.to_string()))?;
                Ok(Some(FieldValue::single(Value::Node(NodeRef::Existing(uid)))))
            }
            PredicateKind::UniqueName => match self.text(raw)? {
                Some(text) => Ok(Some(FieldValue::single(Value::String(text.to_lowercase())))),
                None => self.absent(),
            },
            PredicateKind::String => match self.text(raw)? {
                Some(text) => Ok(Some(FieldValue::single(Value::String(text)))),
                None => self.absent(),
            },
            PredicateKind::Password => match self.text(raw)? {
                Some(text) => Ok(Some(FieldValue::single(Value::Password(text)))),
                None => self.absent(),
            },
            PredicateKind::ListString { delimiter, ordered } => {
                self.validate_list_string(raw, *delimiter, *ordered)
            }
            PredicateKind::Integer => match self.text(raw)? {
                Some(_) => {
                    let n = parse_int(raw).ok_or_else(|| self.err("expected an integer"))?;
                    Ok(Some(FieldValue::single(Value::Int(n))))
                }
                None => self.absent(),
            },
            PredicateKind::Boolean => {
                let b = parse_bool(raw).ok_or_else(|| {
                    self.err(format!("`{}` is not a yes/no value", display_raw(raw)))
                })?;
                Ok(Some(FieldValue::single(Value::Bool(b))))
            }
            PredicateKind::DateTime => match self.text(raw)? {
                Some(text) => {
                    let dt = dates::parse_permissive(&text)
                        .ok_or_else(|| self.err(format!("cannot parse `{text}` as a date")))?;
                    Ok(Some(FieldValue::single(Value::DateTime(dt))))
                }
                None => self.absent(),
            },
            PredicateKind::Year => match self.text(raw)? {
                Some(text) => Ok(Some(FieldValue::single(self.year_value(&text)?))),
                None => self.absent(),
            },
            PredicateKind::ListYear => self.validate_list_year(raw),
            PredicateKind::SingleChoice { choices, numeric } => match self.text(raw)? {
                Some(key) => Ok(Some(FieldValue::single(self.choice(choices, *numeric, key)?))),
                None => self.absent(),
            },
            PredicateKind::MultipleChoice { choices, numeric } => {
                let keys = self.text_elements(raw, ',')?;
                if keys.is_empty() {
                    return self.absent();
                }
                let values = keys
                    .into_iter()
                    .map(|key| self.choice(choices, *numeric, key).map(Item::new))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(FieldValue::set(values)))
            }
            PredicateKind::Relationship { cardinality, .. } => {
                let links = self.parse_links(raw)?;
                if links.is_empty() {
                    return self.absent();
                }
                let mut nodes = Vec::with_capacity(links.len());
                for link in links {
                    match link {
                        LinkInput::Existing(uid) => {
                            nodes.push(Item::new(Value::Node(NodeRef::Existing(uid))))
                        }
                        LinkInput::Inline(_) | LinkInput::Text(_) => {
                            return Err(self.err("new targets must be resolved before validation"))
                        }
                    }
                }
                Ok(Some(match cardinality {
                    Cardinality::Single => FieldValue::Single(nodes.remove(0)),
                    Cardinality::List => FieldValue::set(nodes),
                }))
            }
            PredicateKind::ReverseRelationship { .. } => {
                Err(self.err("reverse relationships are read-only"))
            }
            PredicateKind::Geo => {
                let point = parse_geo(raw).ok_or_else(|| {
                    self.err("expected a longitude/latitude pair within range")
                })?;
                Ok(Some(FieldValue::single(Value::Geo(point))))
            }
        }
    }

    /// Splits relationship input into existing uids, inline new objects and
    /// free-text names.
    ///
    /// Inline objects and free text are only accepted when the predicate
    /// allows new targets; anything else fails naming this predicate.
    pub fn parse_links(&self, raw: &JsonValue) -> Result<Vec<LinkInput>, ValidationError> {
        let PredicateKind::Relationship {
            cardinality,
            allow_new,
            ..
        } = &self.kind
        else {
            return Err(self.err("not a relationship"));
        };
        let mut links = Vec::new();
        self.collect_links(raw, *allow_new, &mut links)?;
        if *cardinality == Cardinality::Single && links.len() > 1 {
            return Err(self.err("only one target may be given"));
        }
        Ok(links)
    }

    fn collect_links(
        &self,
        raw: &JsonValue,
        allow_new: bool,
        out: &mut Vec<LinkInput>,
    ) -> Result<(), ValidationError> {
        match raw {
            JsonValue::Null => Ok(()),
            JsonValue::Array(elements) => elements
                .iter()
                .try_for_each(|e| self.collect_links(e, allow_new, out)),
            JsonValue::String(s) => {
                let text = s.trim();
                if text.is_empty() {
                    return Ok(());
                }
                let parts: Vec<&str> = text.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
                if parts.iter().all(|p| is_uid(p)) {
                    for part in parts {
                        let uid = Uid::parse(part).map_err(|e| self.err(e.to_string()))?;
                        out.push(LinkInput::Existing(uid));
                    }
                    Ok(())
                } else if allow_new {
                    out.push(LinkInput::Text(text.to_string()));
                    Ok(())
                } else {
                    Err(self.err(format!("`{text}` is not a node uid")))
                }
            }
            JsonValue::Object(obj) => {
                if let Some(uid) = obj.get("uid").and_then(JsonValue::as_str) {
                    if is_uid(uid.trim()) {
                        let uid = Uid::parse(uid).map_err(|e| self.err(e.to_string()))?;
                        out.push(LinkInput::Existing(uid));
                        return Ok(());
                    }
                }
                if !allow_new {
                    return Err(self.err("expected a node uid, got an object"));
                }
                let has_name = obj
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .is_some_and(|n| !n.trim().is_empty());
                if !has_name {
                    return Err(self.err("a new target needs a `name`"));
                }
                out.push(LinkInput::Inline(obj.clone()));
                Ok(())
            }
            other => Err(self.err(format!("`{other}` is not a node uid"))),
        }
    }

    fn text(&self, raw: &JsonValue) -> Result<Option<String>, ValidationError> {
        match raw {
            JsonValue::Array(_) | JsonValue::Object(_) => {
                Err(self.err("expected a single value"))
            }
            other => Ok(scalar_text(other).filter(|t| !t.is_empty())),
        }
    }

    fn text_elements(&self, raw: &JsonValue, delimiter: char) -> Result<Vec<String>, ValidationError> {
        let mut out = Vec::new();
        match raw {
            JsonValue::Array(elements) => {
                for element in elements {
                    if element.is_null() {
                        continue;
                    }
                    let text = scalar_text(element)
                        .ok_or_else(|| self.err("list elements must be plain values"))?;
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
            }
            JsonValue::Object(_) => return Err(self.err("expected a list of values")),
            other => {
                if let Some(text) = scalar_text(other) {
                    out.extend(
                        text.split(delimiter)
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(str::to_string),
                    );
                }
            }
        }
        Ok(out)
    }

    fn validate_list_string(
        &self,
        raw: &JsonValue,
        delimiter: char,
        ordered: bool,
    ) -> Result<Option<FieldValue>, ValidationError> {
        let elements = self.text_elements(raw, delimiter)?;
        if elements.is_empty() {
            return self.absent();
        }
        if ordered {
            let items = elements
                .into_iter()
                .enumerate()
                .map(|(i, text)| {
                    Item::new(Value::String(text))
                        .with_facet(crate::facets::SEQUENCE_FACET, Value::Int(i as i64))
                })
                .collect();
            Ok(Some(FieldValue::List(items)))
        } else {
            Ok(Some(FieldValue::set(
                elements.into_iter().map(|t| Item::new(Value::String(t))),
            )))
        }
    }

    fn validate_list_year(&self, raw: &JsonValue) -> Result<Option<FieldValue>, ValidationError> {
        let elements: Vec<&JsonValue> = match raw {
            JsonValue::Array(elements) => elements.iter().filter(|e| !e.is_null()).collect(),
            single => vec![single],
        };
        let mut items = Vec::with_capacity(elements.len());
        for element in elements {
            let (year_raw, facets) = match element {
                JsonValue::Object(obj) => {
                    let year = obj
                        .get(crate::facets::VALUE_KEY)
                        .ok_or_else(|| self.err("each element needs a `value`"))?;
                    (year, Some(obj))
                }
                other => (other, None),
            };
            let text = scalar_text(year_raw).ok_or_else(|| self.err("expected a year"))?;
            if text.is_empty() {
                continue;
            }
            let mut item = Item::new(self.year_value(&text)?);
            if let Some(obj) = facets {
                for (key, value) in obj {
                    if key == crate::facets::VALUE_KEY || value.is_null() {
                        continue;
                    }
                    let spec = self
                        .facets
                        .iter()
                        .find(|f| &f.key == key)
                        .ok_or_else(|| self.err(format!("unknown facet `{key}`")))?;
                    item.facets.insert(key.clone(), spec.validate(&self.name, value)?);
                }
            }
            items.push(item);
        }
        if items.is_empty() {
            return self.absent();
        }
        Ok(Some(FieldValue::List(items)))
    }

    fn year_value(&self, text: &str) -> Result<Value, ValidationError> {
        dates::parse_year(text)
            .map(Value::DateTime)
            .ok_or_else(|| self.err(format!("`{text}` is not a year")))
    }

    fn choice(&self, choices: &ChoiceSet, numeric: bool, key: String) -> Result<Value, ValidationError> {
        if !choices.contains(&key) {
            return Err(self.err(format!("`{key}` is not one of the allowed choices")));
        }
        if numeric {
            if let Ok(n) = key.parse::<i64>() {
                return Ok(Value::Int(n));
            }
        }
        Ok(Value::String(key))
    }
}

// ============================================================================
// Raw-input helpers
// ============================================================================

/// Text of a scalar JSON value, trimmed. `None` for arrays and objects.
pub fn scalar_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn display_raw(raw: &JsonValue) -> String {
    scalar_text(raw).unwrap_or_else(|| raw.to_string())
}

fn parse_int(raw: &JsonValue) -> Option<i64> {
    match raw {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().replace([',', '_'], "").parse().ok(),
        _ => None,
    }
}

/// Accepted boolean tokens (case-insensitive).
pub fn parse_bool_token(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" | "t" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "f" | "" => Some(false),
        _ => None,
    }
}

fn parse_bool(raw: &JsonValue) -> Option<bool> {
    match raw {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        JsonValue::String(s) => parse_bool_token(s),
        _ => None,
    }
}

fn in_range(point: GeoPoint) -> Option<GeoPoint> {
    let ok = (-180.0..=180.0).contains(&point.longitude) && (-90.0..=90.0).contains(&point.latitude);
    ok.then_some(point)
}

fn coordinate(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `{longitude, latitude}` (or `lon`/`lng`/`lat`), `[lon, lat]` and
/// GeoJSON points.
pub fn parse_geo(raw: &JsonValue) -> Option<GeoPoint> {
    match raw {
        JsonValue::Array(pair) if pair.len() == 2 => in_range(GeoPoint {
            longitude: coordinate(&pair[0])?,
            latitude: coordinate(&pair[1])?,
        }),
        JsonValue::Object(obj) => {
            if let Some(coords) = obj.get("coordinates") {
                return parse_geo(coords);
            }
            let longitude = ["longitude", "lon", "lng"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(coordinate))?;
            let latitude = ["latitude", "lat"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(coordinate))?;
            in_range(GeoPoint {
                longitude,
                latitude,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(value: &FieldValue) -> Vec<&str> {
        value.items().iter().filter_map(|i| i.value.as_str()).collect()
    }

    #[test]
    fn strings_trim_and_blank_is_absent() {
        let p = Predicate::string("name");
        assert_eq!(
            p.validate(&json!("  Gazette ")).unwrap(),
            Some(FieldValue::single(Value::string("Gazette")))
        );
        assert_eq!(p.validate(&json!("   ")).unwrap(), None);

        let err = p.clone().required().validate(&json!("")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("name"));
    }

    #[test]
    fn unordered_lists_split_and_dedupe() {
        let p = Predicate::list_string("alternate_names");
        let v = p.validate(&json!("Krone, Die Krone,,Krone")).unwrap().unwrap();
        assert_eq!(strings(&v), vec!["Krone", "Die Krone"]);
        assert!(matches!(v, FieldValue::Set(_)));
    }

    #[test]
    fn ordered_lists_carry_sequence() {
        let p = Predicate::ordered_list("authors", ';');
        let v = p.validate(&json!("Roe, J.; Doe, A.")).unwrap().unwrap();
        assert_eq!(strings(&v), vec!["Roe, J.", "Doe, A."]);
        assert_eq!(v.items()[1].facets["sequence"], Value::Int(1));
    }

    #[test]
    fn choices_name_the_bad_value() {
        let p = Predicate::single_choice("payment_model", ChoiceSet::from_keys(&["free", "not free"]));
        assert!(p.validate(&json!("free")).is_ok());
        let err = p.validate(&json!("cheap")).unwrap_err();
        assert!(err.message.contains("cheap"));

        let weekdays = Predicate::multiple_choice_int(
            "publication_cycle_weekday",
            ChoiceSet::from_keys(&["1", "2", "NA"]),
        );
        let v = weekdays.validate(&json!([1, "2", 2])).unwrap().unwrap();
        assert_eq!(v.items().len(), 2);
        assert_eq!(v.items()[0].value, Value::Int(1));
    }

    #[test]
    fn boolean_tokens() {
        let p = Predicate::boolean("contains_ads");
        for (raw, expected) in [
            (json!("Yes"), true),
            (json!("off"), false),
            (json!(1), true),
            (json!(""), false),
            (json!(false), false),
        ] {
            assert_eq!(
                p.validate(&raw).unwrap(),
                Some(FieldValue::single(Value::Bool(expected)))
            );
        }
        assert!(p.validate(&json!("maybe")).is_err());
    }

    #[test]
    fn years_normalize_to_january_first() {
        let p = Predicate::year("date_founded");
        let v = p.validate(&json!(1998)).unwrap().unwrap();
        let again = p.validate(&v.to_raw()).unwrap().unwrap();
        assert_eq!(v, again);
        assert!(p.validate(&json!("someday")).is_err());
    }

    #[test]
    fn list_year_validates_facets() {
        let p = Predicate::list_year("audience_size")
            .facet(FacetSpec::string("unit").with_choices(ChoiceSet::from_keys(&["followers"])))
            .facet(FacetSpec::new("count", FacetType::Int));
        let v = p
            .validate(&json!([{ "value": "2021", "unit": "followers", "count": "1200" }]))
            .unwrap()
            .unwrap();
        assert_eq!(v.items()[0].facets["count"], Value::Int(1200));

        assert!(p.validate(&json!([{ "value": 2021, "unit": "likes" }])).is_err());
        assert!(p.validate(&json!([{ "value": 2021, "colour": "red" }])).is_err());
    }

    #[test]
    fn relationships_accept_uids_only() {
        let p = Predicate::single_relationship("channel", TargetConstraint::one("Channel"));
        assert!(p.validate(&json!("0x1a")).is_ok());
        let err = p.validate(&json!("print")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("channel"));
        assert!(p.validate(&json!(["0x1", "0x2"])).is_err());
    }

    #[test]
    fn allow_new_links_parse_inline_and_text() {
        let p = Predicate::list_relationship("owns", TargetConstraint::one("Organization")).allow_new();
        let links = p
            .parse_links(&json!(["0x2", { "name": "Sub Corp" }, "Other Corp"]))
            .unwrap();
        assert!(matches!(links[0], LinkInput::Existing(_)));
        assert!(matches!(links[1], LinkInput::Inline(_)));
        assert_eq!(links[2], LinkInput::Text("Other Corp".into()));
        assert!(p.parse_links(&json!([{ "title": "nameless" }])).is_err());
        assert!(p.parse_links(&json!(42)).is_err());
    }

    #[test]
    fn geo_shapes() {
        let expected = GeoPoint {
            longitude: 16.37,
            latitude: 48.21,
        };
        assert_eq!(parse_geo(&json!({ "lon": 16.37, "lat": 48.21 })), Some(expected));
        assert_eq!(parse_geo(&json!([16.37, 48.21])), Some(expected));
        assert_eq!(
            parse_geo(&json!({ "type": "Point", "coordinates": [16.37, 48.21] })),
            Some(expected)
        );
        assert_eq!(parse_geo(&json!([200.0, 0.0])), None);
    }

    #[test]
    fn reverse_is_never_settable() {
        let p = Predicate::reverse("published_by", "publishes", TargetConstraint::one("Organization"));
        assert!(!p.settable(Operation::Create));
        assert!(p.validate(&json!("0x1")).is_err());
    }
}
