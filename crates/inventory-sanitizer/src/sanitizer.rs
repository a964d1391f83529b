//! The submission pipeline.
//!
//! One [`Sanitizer`] handles one submission and moves through
//! `Start → Validating → Resolving → Stamping → Naming → Done`, or stops in
//! `Failed` at the first error. Nothing is written while it runs; the result
//! is an [`Entry`] plus the set and delete N-Quads that store it, committed
//! later in a single mutation.

use crate::error::SanitizeError;
use crate::resolvers::Resolvers;
use crate::user::User;
use chrono::{DateTime, Datelike, Utc};
use inventory_schema::catalog::{
    DATE_CREATED, DATE_MODIFIED, EDIT_HISTORY, ENTRY_ADDED, FORMER_TYPES, REJECTED_TYPE,
    REVIEWED_BY, REVIEW_STATUS,
};
use inventory_schema::predicate::{parse_bool_token, scalar_text};
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::slug::slugify;
use inventory_schema::{
    Autocode, BlankId, EntityType, Entry, FieldValue, Item, LinkInput, NodeRef, Operation,
    Predicate, PredicateKind, Registry, ResolverKind, Role, TargetConstraint, Uid, Value,
    BASE_TYPE,
};
use inventory_store::{entry_nquads, GraphClient, Mutation, NQuad, Reader};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Inline new targets may themselves carry new targets, up to this depth.
const MAX_NESTING: usize = 3;

const PUBLISHES: &str = "publishes";
const SUBNATIONAL_TYPE: &str = "Subnational";
const COUNTRY_CODE: &str = "iso_3166_1_2";

/// Shared, read-only collaborators of every submission.
#[derive(Debug, Clone)]
pub struct SanitizerContext {
    pub registry: Arc<Registry>,
    pub client: GraphClient,
    pub resolvers: Resolvers,
}

impl SanitizerContext {
    pub fn new(registry: Arc<Registry>, client: GraphClient) -> Self {
        Self {
            registry,
            client,
            resolvers: Resolvers::none(),
        }
    }

    pub fn with_resolvers(mut self, resolvers: Resolvers) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.client, &self.registry)
    }
}

/// Pipeline position of a submission. `Resolving` covers relationship
/// targets, autocodes and knowledge-base lookups; `Validating` only reads
/// the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Validating,
    Resolving,
    Stamping,
    Naming,
    Done,
    Failed,
}

/// A validated submission, ready to commit.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    operation: Operation,
    type_name: String,
    entry: Entry,
    related: Vec<Entry>,
    extra: Vec<NQuad>,
    delete: Vec<NQuad>,
}

fn gate(user: &User, needed: Role, what: impl FnOnce() -> String) -> Result<(), SanitizeError> {
    if user.has(needed) {
        Ok(())
    } else {
        Err(SanitizeError::Permission(format!(
            "{} requires {needed}, user is {}",
            what(),
            user.role
        )))
    }
}

fn as_object(data: &JsonValue) -> Result<Map<String, JsonValue>, SanitizeError> {
    match data {
        JsonValue::Object(map) => Ok(map.clone()),
        _ => Err(SanitizeError::entry("a submission must be a JSON object")),
    }
}

fn text_of(raw: Option<&JsonValue>) -> Option<String> {
    raw.and_then(scalar_text).filter(|s| !s.is_empty())
}

/// Six hex characters from a random uuid.
fn short_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

fn type_tags(entity: &EntityType) -> FieldValue {
    FieldValue::set(entity.lineage.iter().map(|t| Item::new(Value::string(t.clone()))))
}

/// `fields` overrides `base` by name in place; new names append.
fn effective_fields(base: &[Predicate], extra: &[Predicate]) -> Vec<Predicate> {
    let mut out = base.to_vec();
    for p in extra {
        match out.iter_mut().find(|existing| existing.name == p.name) {
            Some(slot) => *slot = p.clone(),
            None => out.push(p.clone()),
        }
    }
    out
}

fn most_specific<'r>(registry: &'r Registry, types: &[String]) -> Option<&'r EntityType> {
    types
        .iter()
        .filter_map(|t| registry.get_type(t).ok())
        .max_by_key(|t| t.lineage.len())
}

impl Sanitizer {
    /// Validates a new entry of `type_name`.
    pub fn create(
        ctx: &SanitizerContext,
        type_name: &str,
        data: &JsonValue,
        user: &User,
        ip: &str,
    ) -> Result<Self, SanitizeError> {
        Self::create_with_fields(ctx, type_name, data, user, ip, &[])
    }

    /// Like [`Sanitizer::create`], with predicates beyond the type's own.
    pub fn create_with_fields(
        ctx: &SanitizerContext,
        type_name: &str,
        data: &JsonValue,
        user: &User,
        ip: &str,
        fields: &[Predicate],
    ) -> Result<Self, SanitizeError> {
        let entity = ctx
            .registry
            .resolve_type(type_name)
            .ok_or_else(|| SanitizeError::entry(format!("unknown entity type `{type_name}`")))?;
        gate(user, entity.create, || format!("creating a {}", entity.name))?;

        let data = as_object(data)?;
        if data.contains_key("uid") {
            return Err(SanitizeError::field(
                "uid",
                "a new entry cannot carry a uid; submit it as an edit",
            ));
        }
        let node = NodeRef::New(BlankId::fresh("newentry"));
        let build = Build::new(ctx, user, ip, Operation::Create, entity, fields, data, node, 0);
        build.run().map(Build::finish)
    }

    /// Validates an update of the entry named by `data["uid"]`.
    pub fn edit(
        ctx: &SanitizerContext,
        data: &JsonValue,
        user: &User,
        ip: &str,
    ) -> Result<Self, SanitizeError> {
        let base = ctx.registry.get_type(BASE_TYPE)?;
        gate(user, base.edit, || "editing entries".to_string())?;

        let data = as_object(data)?;
        let raw_uid = text_of(data.get("uid"))
            .ok_or_else(|| SanitizeError::field("uid", "an edit needs the uid of its entry"))?;
        let uid = Uid::parse(&raw_uid).map_err(|e| SanitizeError::field("uid", e.to_string()))?;

        let check = ctx
            .reader()
            .check_entry(&uid)?
            .ok_or_else(|| SanitizeError::NotFound(format!("no entry with uid {uid}")))?;
        let entity = most_specific(&ctx.registry, &check.types).ok_or_else(|| {
            SanitizeError::NotFound(format!("{uid} carries no recognized type"))
        })?;
        gate(user, entity.edit, || format!("editing a {}", entity.name))?;
        if !user.has(Role::Reviewer) && check.added_by.as_ref() != Some(&user.uid) {
            return Err(SanitizeError::Permission(format!(
                "only the author or a reviewer may edit {uid}"
            )));
        }

        let build = Build::new(
            ctx,
            user,
            ip,
            Operation::Edit,
            entity,
            &[],
            data,
            NodeRef::Existing(uid),
            0,
        );
        build.run().map(Build::finish)
    }

    /// Archives an entry: it keeps its data but is retyped as rejected.
    pub fn reject(
        ctx: &SanitizerContext,
        uid: &Uid,
        user: &User,
        ip: &str,
    ) -> Result<Self, SanitizeError> {
        gate(user, Role::Reviewer, || "rejecting entries".to_string())?;
        let check = ctx
            .reader()
            .check_entry(uid)?
            .ok_or_else(|| SanitizeError::NotFound(format!("no entry with uid {uid}")))?;
        if check.types.iter().any(|t| t == REJECTED_TYPE) {
            return Err(SanitizeError::entry(format!("{uid} is already rejected")));
        }
        let rejected = ctx.registry.get_type(REJECTED_TYPE)?;
        let node = NodeRef::Existing(uid.clone());
        let now = Utc::now();
        let stamp = stamp_item(user, ip, now);

        let mut entry = Entry::new(node.clone());
        entry.fields.insert(TYPE_PREDICATE, type_tags(rejected));
        entry.fields.insert(
            FORMER_TYPES,
            FieldValue::set(check.types.iter().map(|t| Item::new(Value::string(t.clone())))),
        );
        entry
            .fields
            .insert(REVIEW_STATUS, FieldValue::single(Value::string("rejected")));
        entry.fields.insert(REVIEWED_BY, FieldValue::Single(stamp));
        entry
            .fields
            .insert(DATE_MODIFIED, FieldValue::single(Value::DateTime(now)));

        let delete = [TYPE_PREDICATE, REVIEW_STATUS, REVIEWED_BY]
            .iter()
            .map(|p| NQuad::clear(node.clone(), p))
            .collect();
        tracing::debug!(%uid, former = ?check.types, "entry rejected");
        Ok(Self {
            operation: Operation::Edit,
            type_name: REJECTED_TYPE.to_string(),
            entry,
            related: Vec::new(),
            extra: Vec::new(),
            delete,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_upsert(&self) -> bool {
        self.operation == Operation::Edit
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// New entries created alongside the main one.
    pub fn related(&self) -> &[Entry] {
        &self.related
    }

    pub fn set_quads(&self) -> Vec<NQuad> {
        let mut out = entry_nquads(&self.entry);
        for entry in &self.related {
            out.extend(entry_nquads(entry));
        }
        out.extend(self.extra.iter().cloned());
        out
    }

    pub fn delete_quads(&self) -> &[NQuad] {
        &self.delete
    }

    pub fn set_nquads(&self) -> String {
        self.mutation().set_nquads()
    }

    pub fn delete_nquads(&self) -> String {
        self.mutation().delete_nquads()
    }

    pub fn mutation(&self) -> Mutation {
        Mutation {
            query: None,
            set: self.set_quads(),
            delete: self.delete.clone(),
        }
    }

    /// Commits in one transaction and returns the entry's uid.
    pub fn commit(&self, client: &GraphClient) -> Result<Uid, SanitizeError> {
        let mut txn = client.txn();
        let response = txn.commit(&self.mutation())?;
        let uid = response.resolve(&self.entry.node)?;
        tracing::info!(%uid, entity = %self.type_name, upsert = self.is_upsert(), "entry committed");
        Ok(uid)
    }
}

fn stamp_item(user: &User, ip: &str, now: DateTime<Utc>) -> Item {
    Item::new(Value::Node(NodeRef::Existing(user.uid.clone())))
        .with_facet("ip", Value::string(ip))
        .with_facet("timestamp", Value::DateTime(now))
}

/// Input whose resolution may read the store or call a resolver.
enum Deferred {
    Autocode(ResolverKind, JsonValue),
    Link(JsonValue),
}

/// Working state of one submission (or one inline new target).
struct Build<'c> {
    ctx: &'c SanitizerContext,
    user: &'c User,
    ip: &'c str,
    now: DateTime<Utc>,
    op: Operation,
    entity: &'c EntityType,
    fields: Vec<Predicate>,
    data: Map<String, JsonValue>,
    entry: Entry,
    related: Vec<Entry>,
    extra: Vec<NQuad>,
    delete: Vec<NQuad>,
    deferred: Vec<(Predicate, Deferred)>,
    touched: BTreeSet<String>,
    /// Unique names handed out so far in this submission, nested builds included.
    allocated: BTreeSet<String>,
    stage: Stage,
    depth: usize,
}

impl<'c> Build<'c> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: &'c SanitizerContext,
        user: &'c User,
        ip: &'c str,
        op: Operation,
        entity: &'c EntityType,
        extra_fields: &[Predicate],
        data: Map<String, JsonValue>,
        node: NodeRef,
        depth: usize,
    ) -> Self {
        Self {
            ctx,
            user,
            ip,
            now: Utc::now(),
            op,
            entity,
            fields: effective_fields(&entity.predicates, extra_fields),
            data,
            entry: Entry::new(node),
            related: Vec::new(),
            extra: Vec::new(),
            delete: Vec::new(),
            deferred: Vec::new(),
            touched: BTreeSet::new(),
            allocated: BTreeSet::new(),
            stage: Stage::Start,
            depth,
        }
    }

    fn nested(&self) -> bool {
        self.depth > 0
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(
            entity = %self.entity.name,
            node = %self.entry.node,
            from = ?self.stage,
            to = ?stage,
            "sanitizer stage"
        );
        self.stage = stage;
    }

    fn run(mut self) -> Result<Self, SanitizeError> {
        match self.steps() {
            Ok(()) => {
                self.enter(Stage::Done);
                Ok(self)
            }
            Err(e) => {
                self.enter(Stage::Failed);
                tracing::debug!(entity = %self.entity.name, error = %e, "submission refused");
                Err(e)
            }
        }
    }

    fn steps(&mut self) -> Result<(), SanitizeError> {
        self.enter(Stage::Validating);
        self.validate_fields()?;

        self.enter(Stage::Resolving);
        self.resolve_fields()?;
        self.resolve_derived()?;
        if self.op == Operation::Create && !self.nested() {
            self.check_required()?;
        }

        self.enter(Stage::Stamping);
        self.stamp()?;

        self.enter(Stage::Naming);
        self.assign_unique_name()?;

        if self.op == Operation::Edit {
            self.queue_overwrites();
        }
        Ok(())
    }

    fn finish(self) -> Sanitizer {
        Sanitizer {
            operation: self.op,
            type_name: self.entity.name.clone(),
            entry: self.entry,
            related: self.related,
            extra: self.extra,
            delete: self.delete,
        }
    }

    fn field(&self, name: &str) -> Option<&Predicate> {
        self.fields.iter().find(|p| p.name == name)
    }

    fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Merges `value` under `name`; input-only predicates never reach the entry.
    fn put(&mut self, name: &str, value: FieldValue) {
        if self.field(name).is_some_and(|p| !p.stored) {
            return;
        }
        self.entry.fields.merge_value(name, value);
        self.touched.insert(name.to_string());
    }

    fn is_managed(p: &Predicate) -> bool {
        matches!(p.kind, PredicateKind::UniqueName)
            || [ENTRY_ADDED, REVIEWED_BY, EDIT_HISTORY, DATE_CREATED, DATE_MODIFIED, REVIEW_STATUS]
                .contains(&p.name.as_str())
    }

    // ------------------------------------------------------------------------
    // Validating
    // ------------------------------------------------------------------------

    fn validate_fields(&mut self) -> Result<(), SanitizeError> {
        for key in self.data.keys() {
            if key != "uid" && key != "accept" && self.field(key).is_none() {
                tracing::debug!(entity = %self.entity.name, field = %key, "ignoring unknown field");
            }
        }

        let fields = self.fields.clone();
        for p in &fields {
            if Self::is_managed(p) {
                continue;
            }
            if let Some(Autocode {
                resolver,
                input: Some(source),
            }) = &p.autocode
            {
                if let Some(input) = self.data.get(source).cloned() {
                    self.deferred.push((p.clone(), Deferred::Autocode(*resolver, input)));
                }
                continue;
            }
            let Some(raw) = self.data.get(&p.name).cloned() else {
                self.apply_default(p);
                continue;
            };
            if !p.settable(self.op) {
                tracing::debug!(
                    entity = %self.entity.name,
                    predicate = %p.name,
                    op = ?self.op,
                    "ignoring input for predicate that is not settable"
                );
                continue;
            }
            if p.permission > self.user.role {
                return Err(SanitizeError::Permission(format!(
                    "setting `{}` requires {}",
                    p.name, p.permission
                )));
            }
            // Present in the input, so the stored value is replaced even when
            // the new one is empty.
            if self.op == Operation::Edit && p.overwrite && p.stored {
                self.touched.insert(p.name.clone());
            }
            match &p.autocode {
                Some(Autocode {
                    resolver,
                    input: None,
                }) => self.deferred.push((p.clone(), Deferred::Autocode(*resolver, raw))),
                _ if p.is_relationship() => self.deferred.push((p.clone(), Deferred::Link(raw))),
                _ => {
                    if let Some(value) = p.validate(&raw)? {
                        self.put(&p.name, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_fields(&mut self) -> Result<(), SanitizeError> {
        for (p, input) in std::mem::take(&mut self.deferred) {
            match input {
                Deferred::Autocode(resolver, raw) => self.autocode(&p, resolver, &raw)?,
                Deferred::Link(raw) => self.link(&p, &raw)?,
            }
        }
        Ok(())
    }

    fn apply_default(&mut self, p: &Predicate) {
        if self.op != Operation::Create || self.entry.fields.contains(&p.name) {
            return;
        }
        if let Some(default) = &p.default {
            self.entry
                .fields
                .insert(p.name.clone(), FieldValue::single(default.produce()));
        }
    }

    fn check_required(&self) -> Result<(), SanitizeError> {
        for p in &self.fields {
            if !p.required || !p.settable(Operation::Create) || Self::is_managed(p) {
                continue;
            }
            let supplied = self.entry.fields.contains(&p.name)
                || (!p.stored && self.data.contains_key(&p.name));
            if !supplied {
                return Err(SanitizeError::field(&p.name, "a value is required"));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------------

    fn link(&mut self, p: &Predicate, raw: &JsonValue) -> Result<(), SanitizeError> {
        let links = p.parse_links(raw)?;
        if links.is_empty() {
            if p.required {
                return Err(SanitizeError::field(&p.name, "a value is required"));
            }
            return Ok(());
        }
        let targets = self.resolve_links(p, links)?;
        if p.is_mutual() {
            for target in &targets {
                self.extra.push(NQuad::value(
                    target.clone(),
                    &p.name,
                    Value::Node(self.entry.node.clone()),
                ));
            }
        }
        self.put_nodes(p, targets);
        Ok(())
    }

    fn put_nodes(&mut self, p: &Predicate, targets: Vec<NodeRef>) {
        let mut items: Vec<Item> = targets.into_iter().map(|n| Item::new(Value::Node(n))).collect();
        if items.is_empty() {
            return;
        }
        let value = if p.is_list() {
            FieldValue::set(items)
        } else {
            FieldValue::Single(items.remove(0))
        };
        self.put(&p.name, value);
    }

    /// Checks existing targets against the predicate's type constraint and
    /// builds new ones.
    fn resolve_links(&mut self, p: &Predicate, links: Vec<LinkInput>) -> Result<Vec<NodeRef>, SanitizeError> {
        let constraint = p.target().cloned().unwrap_or(TargetConstraint::Any);
        let existing: Vec<Uid> = links
            .iter()
            .filter_map(|l| match l {
                LinkInput::Existing(uid) => Some(uid.clone()),
                _ => None,
            })
            .collect();
        let types = self.ctx.reader().node_types(&existing)?;

        let mut out = Vec::with_capacity(links.len());
        for link in links {
            match link {
                LinkInput::Existing(uid) => {
                    let tags = types.get(&uid).ok_or_else(|| {
                        SanitizeError::field(&p.name, format!("`{uid}` does not exist"))
                    })?;
                    if !constraint.allows(tags) {
                        return Err(SanitizeError::field(
                            &p.name,
                            format!("`{uid}` is a {} and not an allowed target", tags.join("/")),
                        ));
                    }
                    out.push(NodeRef::Existing(uid));
                }
                LinkInput::Inline(obj) => out.push(self.new_target(p, &constraint, obj)?),
                LinkInput::Text(name) => {
                    let mut obj = Map::new();
                    obj.insert("name".to_string(), JsonValue::String(name));
                    out.push(self.new_target(p, &constraint, obj)?);
                }
            }
        }
        Ok(out)
    }

    /// Sanitizes an inline new target as an entry of its own.
    fn new_target(
        &mut self,
        p: &Predicate,
        constraint: &TargetConstraint,
        data: Map<String, JsonValue>,
    ) -> Result<NodeRef, SanitizeError> {
        if self.depth + 1 > MAX_NESTING {
            return Err(SanitizeError::field(&p.name, "new targets are nested too deeply"));
        }
        let type_name = constraint.primary().ok_or_else(|| {
            SanitizeError::field(&p.name, "cannot create a target of unconstrained type")
        })?;
        let entity = self.ctx.registry.get_type(type_name)?;
        gate(self.user, entity.create, || format!("creating a {type_name}"))?;

        let node = NodeRef::New(BlankId::fresh("new"));
        let mut child = Build::new(
            self.ctx,
            self.user,
            self.ip,
            Operation::Create,
            entity,
            &[],
            data,
            node.clone(),
            self.depth + 1,
        );
        child.allocated = std::mem::take(&mut self.allocated);
        let child = child.run().map_err(|e| match e {
            SanitizeError::Validation(inner) => {
                SanitizeError::field(&p.name, format!("new {type_name}: {inner}"))
            }
            other => other,
        })?;
        self.allocated = child.allocated;
        self.related.push(child.entry);
        self.related.extend(child.related);
        self.extra.extend(child.extra);
        Ok(node)
    }

    // ------------------------------------------------------------------------
    // Autocodes
    // ------------------------------------------------------------------------

    fn autocode(&mut self, p: &Predicate, resolver: ResolverKind, raw: &JsonValue) -> Result<(), SanitizeError> {
        match resolver {
            ResolverKind::Subunit => self.subunits(p, raw),
            ResolverKind::Address => {
                self.address(raw);
                Ok(())
            }
            ResolverKind::Publisher => self.publishers(p, raw),
            ResolverKind::Repository => {
                if let Some(value) = p.validate(raw)? {
                    let url = value.items().first().and_then(|i| i.value.as_str()).map(str::to_string);
                    self.put(&p.name, value);
                    if let Some(url) = url {
                        self.repository(&url);
                    }
                }
                Ok(())
            }
            ResolverKind::SocialProfile => self.social(p, raw),
        }
    }

    /// Free-text places become references to (possibly new) subunits.
    /// Failing to resolve one fails the submission.
    fn subunits(&mut self, p: &Predicate, raw: &JsonValue) -> Result<(), SanitizeError> {
        let links = p.parse_links(raw)?;
        let (existing, places): (Vec<LinkInput>, Vec<LinkInput>) =
            links.into_iter().partition(|l| matches!(l, LinkInput::Existing(_)));
        let mut targets = self.resolve_links(p, existing)?;
        for place in places {
            let query = match place {
                LinkInput::Text(text) => text,
                LinkInput::Inline(obj) => text_of(obj.get("name")).unwrap_or_default(),
                LinkInput::Existing(_) => continue,
            };
            targets.push(self.subunit(p, &query)?);
        }
        self.put_nodes(p, targets);
        Ok(())
    }

    fn subunit(&mut self, p: &Predicate, query: &str) -> Result<NodeRef, SanitizeError> {
        let place = self.ctx.resolvers.geocode(query).map_err(|e| {
            SanitizeError::field(&p.name, format!("cannot resolve `{query}`: {e}"))
        })?;
        let code = place.country_code.trim().to_uppercase();
        let slug = format!("{}_{}", slugify(&place.name, "_"), code.to_lowercase());

        let reader = self.ctx.reader();
        if let Some(uid) = reader.get_uid("unique_name", &slug)? {
            return Ok(NodeRef::Existing(uid));
        }
        if let Some(pending) = self
            .related
            .iter()
            .find(|e| e.fields.str_value("unique_name") == Some(slug.as_str()))
        {
            return Ok(pending.node.clone());
        }
        let country = reader.get_uid(COUNTRY_CODE, &code)?.ok_or_else(|| {
            SanitizeError::field(&p.name, format!("`{query}` is in `{code}`, which is not a known country"))
        })?;

        let entity = self.ctx.registry.get_type(SUBNATIONAL_TYPE)?;
        let node = NodeRef::New(BlankId::fresh("subunit"));
        let mut entry = Entry::new(node.clone());
        let fields = &mut entry.fields;
        fields.insert(TYPE_PREDICATE, type_tags(entity));
        fields.insert("name", FieldValue::single(Value::string(place.name.clone())));
        fields.insert("unique_name", FieldValue::single(Value::string(slug.clone())));
        fields.insert("country_code", FieldValue::single(Value::string(code)));
        fields.insert("location_point", FieldValue::single(Value::Geo(place.point)));
        fields.insert(
            "country",
            FieldValue::single(Value::Node(NodeRef::Existing(country))),
        );
        fields.insert(DATE_CREATED, FieldValue::single(Value::DateTime(self.now)));
        fields.insert(ENTRY_ADDED, FieldValue::Single(stamp_item(self.user, self.ip, self.now)));
        fields.insert(REVIEW_STATUS, FieldValue::single(Value::string("pending")));
        tracing::debug!(%slug, query, "queued new subunit");
        self.allocated.insert(slug);
        self.related.push(entry);
        Ok(node)
    }

    /// Keeps the submitted address even when it cannot be geocoded.
    fn address(&mut self, raw: &JsonValue) {
        let Some(text) = scalar_text(raw).filter(|t| !t.is_empty()) else {
            return;
        };
        match self.ctx.resolvers.geocode(&text) {
            Ok(place) => {
                let canonical = place.address.unwrap_or_else(|| text.clone());
                if self.has_field("address_string") {
                    self.put("address_string", FieldValue::single(Value::string(canonical)));
                }
                if self.has_field("address_geo") {
                    self.put("address_geo", FieldValue::single(Value::Geo(place.point)));
                }
            }
            Err(e) => {
                tracing::warn!(address = %text, error = %e, "address lookup failed; storing it as given");
                if self.has_field("address_string") {
                    self.put("address_string", FieldValue::single(Value::string(text)));
                }
            }
        }
    }

    /// Publishers point at the entry with their own `publishes` edge.
    fn publishers(&mut self, p: &Predicate, raw: &JsonValue) -> Result<(), SanitizeError> {
        let links = p.parse_links(raw)?;
        let targets = self.resolve_links(p, links)?;
        for publisher in targets {
            self.extra.push(NQuad::value(
                publisher,
                PUBLISHES,
                Value::Node(self.entry.node.clone()),
            ));
        }
        Ok(())
    }

    fn social(&mut self, p: &Predicate, raw: &JsonValue) -> Result<(), SanitizeError> {
        let Some(handle) = scalar_text(raw).filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let profile = match self.ctx.resolvers.profile(&handle) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(predicate = %p.name, %handle, error = %e, "profile lookup failed; skipping");
                return Ok(());
            }
        };
        if let Some(value) = p.validate(&json!(profile.verified))? {
            self.put(&p.name, value);
        }
        if let Some(audience) = self.field("audience_size").cloned() {
            let raw = json!([{
                "value": self.now.year().to_string(),
                "unit": "followers",
                "count": profile.followers,
                "data_from": handle,
            }]);
            if let Some(value) = audience.validate(&raw)? {
                self.put(&audience.name, value);
            }
        }
        Ok(())
    }

    /// Fills package metadata the submitter left out.
    fn repository(&mut self, url: &str) {
        let info = match self.ctx.resolvers.repository(url) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(%url, error = %e, "repository lookup failed; skipping");
                return;
            }
        };
        let derived = [
            ("programming_languages", json!(info.programming_languages)),
            ("pypi", json!(info.pypi)),
            ("cran", json!(info.cran)),
            ("license", json!(info.license)),
        ];
        for (name, raw) in derived {
            if self.data.contains_key(name) {
                continue;
            }
            let Some(p) = self.field(name).cloned() else {
                continue;
            };
            match p.validate(&raw) {
                Ok(Some(value)) => self.put(name, value),
                Ok(None) => {}
                Err(e) => tracing::warn!(%url, error = %e, "discarding repository metadata"),
            }
        }
    }

    /// Knowledge-base enrichment of new entries, never overriding input.
    fn resolve_derived(&mut self) -> Result<(), SanitizeError> {
        if self.op != Operation::Create || self.ctx.resolvers.knowledge.is_none() {
            return Ok(());
        }
        let Some(name) = self.entry.fields.str_value("name").map(str::to_string) else {
            return Ok(());
        };
        let record = match self.ctx.resolvers.knowledge(&name) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%name, error = %e, "knowledge base lookup failed; skipping");
                return Ok(());
            }
        };
        if let Some(id) = record.identifier {
            if self.has_field("wikidata_id") && !self.entry.fields.contains("wikidata_id") {
                self.put("wikidata_id", FieldValue::single(Value::string(id)));
            }
        }
        if !record.aliases.is_empty() && !self.data.contains_key("alternate_names") {
            if let Some(p) = self.field("alternate_names").cloned() {
                if let Some(value) = p.validate(&json!(record.aliases))? {
                    self.put(&p.name, value);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stamping
    // ------------------------------------------------------------------------

    fn requested_status(&self) -> Option<String> {
        if self.nested() {
            return None;
        }
        let accept = text_of(self.data.get("accept")).and_then(|t| parse_bool_token(&t));
        if accept == Some(true) {
            return Some("accepted".to_string());
        }
        text_of(self.data.get(REVIEW_STATUS)).map(|s| s.to_lowercase())
    }

    fn stamp(&mut self) -> Result<(), SanitizeError> {
        let stamp = stamp_item(self.user, self.ip, self.now);
        let requested = self.requested_status();
        match self.op {
            Operation::Create => {
                self.entry.fields.insert(TYPE_PREDICATE, type_tags(self.entity));
                if self.has_field(ENTRY_ADDED) {
                    self.entry.fields.insert(ENTRY_ADDED, FieldValue::Single(stamp.clone()));
                }
                if self.has_field(DATE_CREATED) {
                    self.entry
                        .fields
                        .insert(DATE_CREATED, FieldValue::single(Value::DateTime(self.now)));
                }
                if !self.has_field(REVIEW_STATUS) {
                    return Ok(());
                }
                let status = match requested.as_deref() {
                    None | Some("pending") => "pending",
                    Some("draft") => "draft",
                    Some("accepted") => {
                        gate(self.user, Role::Reviewer, || "accepting an entry".to_string())?;
                        "accepted"
                    }
                    Some(other) => {
                        return Err(SanitizeError::field(
                            REVIEW_STATUS,
                            format!("`{other}` cannot be requested for a new entry"),
                        ))
                    }
                };
                self.entry
                    .fields
                    .insert(REVIEW_STATUS, FieldValue::single(Value::string(status)));
                if status == "accepted" && self.has_field(REVIEWED_BY) {
                    self.entry.fields.insert(REVIEWED_BY, FieldValue::Single(stamp));
                }
            }
            Operation::Edit => {
                if self.has_field(EDIT_HISTORY) {
                    self.entry
                        .fields
                        .merge_value(EDIT_HISTORY, FieldValue::set([stamp.clone()]));
                }
                if self.has_field(DATE_MODIFIED) {
                    self.entry
                        .fields
                        .insert(DATE_MODIFIED, FieldValue::single(Value::DateTime(self.now)));
                }
                let Some(status) = requested else {
                    return Ok(());
                };
                gate(self.user, Role::Reviewer, || "changing the review status".to_string())?;
                let Some(p) = self.field(REVIEW_STATUS).cloned() else {
                    return Ok(());
                };
                if let Some(value) = p.validate(&json!(status))? {
                    self.put(REVIEW_STATUS, value);
                }
                if status == "accepted" && self.has_field(REVIEWED_BY) {
                    self.entry.fields.insert(REVIEWED_BY, FieldValue::Single(stamp));
                    self.touched.insert(REVIEWED_BY.to_string());
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Naming
    // ------------------------------------------------------------------------

    fn assign_unique_name(&mut self) -> Result<(), SanitizeError> {
        if self.op == Operation::Create
            && !self.entry.fields.contains("name")
            && self.field("name").is_some_and(|p| !p.settable(Operation::Create))
        {
            if let Some(title) = self.entry.fields.str_value("title").map(str::to_string) {
                self.entry.fields.insert("name", FieldValue::single(Value::string(title)));
            }
        }
        if !self.has_field("unique_name") {
            return Ok(());
        }

        let reader = self.ctx.reader();
        let explicit = text_of(self.data.get("unique_name")).map(|s| s.trim().to_lowercase());
        let name = match (explicit, self.op) {
            (Some(name), _) => {
                if self.allocated.contains(&name) {
                    return Err(SanitizeError::field(
                        "unique_name",
                        format!("`{name}` is already used in this submission"),
                    ));
                }
                if let Some(holder) = reader.get_uid("unique_name", &name)? {
                    if self.entry.node.uid() != Some(&holder) {
                        return Err(SanitizeError::field(
                            "unique_name",
                            format!("`{name}` is already taken"),
                        ));
                    }
                }
                name
            }
            (None, Operation::Create) => {
                let display = self
                    .entry
                    .fields
                    .str_value("name")
                    .or_else(|| self.entry.fields.str_value("title"))
                    .ok_or_else(|| SanitizeError::field("name", "a name is required"))?;
                let base = slugify(display, "_");
                if base.is_empty() {
                    return Err(SanitizeError::field(
                        "name",
                        format!("cannot derive a unique name from `{display}`"),
                    ));
                }
                // Check-then-set: concurrent submissions can still collide.
                let mut name = base.clone();
                while self.allocated.contains(&name) || reader.get_uid("unique_name", &name)?.is_some() {
                    name = format!("{base}_{}", short_suffix());
                    tracing::debug!(%base, suffixed = %name, "unique name taken; suffixing");
                }
                name
            }
            (None, Operation::Edit) => return Ok(()),
        };
        self.allocated.insert(name.clone());
        self.entry
            .fields
            .insert("unique_name", FieldValue::single(Value::string(name)));
        self.touched.insert("unique_name".to_string());
        Ok(())
    }

    /// Overwrite predicates are cleared before the new value is added.
    fn queue_overwrites(&mut self) {
        let node = self.entry.node.clone();
        let clears: Vec<NQuad> = self
            .touched
            .iter()
            .filter(|name| self.field(name).is_some_and(|p| p.overwrite) || name.as_str() == "unique_name")
            .map(|name| NQuad::clear(node.clone(), name))
            .collect();
        self.delete.extend(clears);
    }
}
