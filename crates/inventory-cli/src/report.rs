//! Terminal rendering of schemas, submissions and read results.

use colored::Colorize;
use inventory_sanitizer::Sanitizer;
use inventory_schema::{
    EntityType, FieldValue, Item, Predicate, PredicateKind, Registry, Role, TargetConstraint, Uid,
    Value,
};
use inventory_store::{Document, Field};
use serde_json::{json, Map, Value as JsonValue};

fn show_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::DateTime(dt) => dt.to_rfc3339(),
        Value::Geo(p) => format!("({}, {})", p.longitude, p.latitude),
        Value::Node(node) => node.to_string(),
        Value::Password(_) => "********".to_string(),
    }
}

fn show_item(item: &Item) -> String {
    if item.facets.is_empty() {
        return show_value(&item.value);
    }
    let facets: Vec<String> = item
        .facets
        .iter()
        .map(|(k, v)| format!("{k}={}", show_value(v)))
        .collect();
    format!("{} ({})", show_value(&item.value), facets.join(", "))
}

fn show_field(value: &FieldValue) -> String {
    value.items().iter().map(show_item).collect::<Vec<_>>().join("; ")
}

fn target_label(target: &TargetConstraint) -> String {
    match target {
        TargetConstraint::Any => "any".to_string(),
        TargetConstraint::Types(types) => types.join("|"),
    }
}

fn kind_label(kind: &PredicateKind) -> String {
    match kind {
        PredicateKind::Uid => "uid".into(),
        PredicateKind::UniqueName => "unique name".into(),
        PredicateKind::String => "string".into(),
        PredicateKind::ListString { ordered: true, .. } => "ordered list".into(),
        PredicateKind::ListString { .. } => "list".into(),
        PredicateKind::Integer => "integer".into(),
        PredicateKind::Boolean => "boolean".into(),
        PredicateKind::DateTime => "datetime".into(),
        PredicateKind::Year => "year".into(),
        PredicateKind::ListYear => "years".into(),
        PredicateKind::SingleChoice { choices, .. } => format!("choice of {}", choices.len()),
        PredicateKind::MultipleChoice { choices, .. } => format!("choices of {}", choices.len()),
        PredicateKind::Relationship { target, .. } => format!("-> {}", target_label(target)),
        PredicateKind::ReverseRelationship { predicate, target } => {
            format!("<- {} ~{predicate}", target_label(target))
        }
        PredicateKind::Geo => "geo".into(),
        PredicateKind::Password => "password".into(),
    }
}

fn flags(p: &Predicate) -> String {
    let mut out = Vec::new();
    if p.required {
        out.push("required".to_string());
    }
    match (p.new, p.edit) {
        (false, false) => out.push("fixed".into()),
        (false, true) => out.push("edit only".into()),
        (true, false) => out.push("create only".into()),
        (true, true) => {}
    }
    if p.overwrite {
        out.push("overwrite".into());
    }
    if !p.stored {
        out.push("virtual".into());
    }
    if p.allows_new() {
        out.push("new targets".into());
    }
    if p.autocode.is_some() {
        out.push("autocode".into());
    }
    if p.permission > Role::Anonymous {
        out.push(format!("{}+", p.permission));
    }
    out.join(", ")
}

pub fn print_types(registry: &Registry) {
    for entity in registry.types() {
        println!(
            "{:<20} {:<12} {:<12} {}",
            entity.name.bold(),
            format!("create {}", entity.create),
            format!("edit {}", entity.edit),
            entity.description.as_deref().unwrap_or("").dimmed()
        );
    }
}

pub fn print_predicates(entity: &EntityType) {
    println!(
        "{} {}",
        entity.name.green().bold(),
        entity.lineage.join(" > ").dimmed()
    );
    for p in &entity.predicates {
        if p.hidden {
            continue;
        }
        println!(
            "  {:<34} {:<28} {}",
            p.name,
            kind_label(&p.kind),
            flags(p).yellow()
        );
    }
}

/// Raw JSON of a submission: its entry, new related entries and N-Quads.
pub fn submission_json(s: &Sanitizer, committed: Option<&Uid>) -> JsonValue {
    let entry: Map<String, JsonValue> = s
        .entry()
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_raw()))
        .collect();
    json!({
        "type": s.type_name(),
        "node": s.entry().node.to_string(),
        "uid": committed.map(ToString::to_string),
        "entry": entry,
        "related": s.related().iter().map(|e| e.node.to_string()).collect::<Vec<_>>(),
        "set": s.set_nquads(),
        "delete": s.delete_nquads(),
    })
}

pub fn print_submission(s: &Sanitizer, committed: Option<&Uid>) {
    let verb = match committed {
        Some(_) => "Committed".green().bold(),
        None => "Valid".green().bold(),
    };
    let target = committed
        .map(ToString::to_string)
        .unwrap_or_else(|| s.entry().node.to_string());
    println!("{verb} {} {}", s.type_name(), target.bold());
    for (name, value) in s.entry().fields.iter() {
        println!("  {:<28} {}", name, show_field(value));
    }
    for related in s.related() {
        println!(
            "  {} {} {}",
            "+".green(),
            related.types().join("/"),
            related.fields.str_value("unique_name").unwrap_or_default()
        );
    }
    for quad in s.delete_quads() {
        println!("  {} {quad}", "-".red());
    }
    println!("{}", format!("{} set quads", s.set_quads().len()).dimmed());
}

fn show_read_field(field: &Field) -> String {
    match field {
        Field::Node(doc) => doc
            .text("unique_name")
            .or_else(|| doc.text("name"))
            .or_else(|| doc.text("uid"))
            .unwrap_or("?")
            .to_string(),
        Field::List(items) => items.iter().map(show_read_field).collect::<Vec<_>>().join("; "),
        other => match other.to_json() {
            JsonValue::String(s) => s,
            json => json.to_string(),
        },
    }
}

pub fn print_document(doc: &Document) {
    println!(
        "{} {} {}",
        doc.text("uid").unwrap_or("?").bold(),
        doc.text("unique_name").unwrap_or_default().green(),
        doc.types().join("/").dimmed()
    );
    for (name, field) in &doc.fields {
        if name == "uid" || name == "unique_name" || name.ends_with("_paragraphs") {
            continue;
        }
        println!("  {:<28} {}", name, show_read_field(field));
    }
}

pub fn print_row(doc: &Document) {
    println!(
        "{:<10} {:<32} {}",
        doc.text("uid").unwrap_or("?"),
        doc.text("unique_name").unwrap_or_default(),
        doc.text("name").unwrap_or_default()
    );
}
