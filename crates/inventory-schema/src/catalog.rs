//! The inventory's entity types.
//!
//! Every content type extends [`BASE_TYPE`] and so carries the identity and
//! audit predicates declared on it. System types (`User`, `Notification`,
//! `File`, `Rejected`) stand alone and can only be written with
//! [`Role::System`].

use crate::auxiliary;
use crate::error::SchemaError;
use crate::predicate::{
    Autocode, ChoiceSet, FacetSpec, FacetType, Predicate, ResolverKind, TargetConstraint,
};
use crate::role::Role;
use crate::schema::{Registry, RegistryBuilder, TypeDef, BASE_TYPE};
use crate::value::Value;

pub const USER_TYPE: &str = "User";
pub const REJECTED_TYPE: &str = "Rejected";

pub const ENTRY_ADDED: &str = "entry_added";
pub const REVIEWED_BY: &str = "reviewed_by";
pub const EDIT_HISTORY: &str = "entry_edit_history";
pub const DATE_CREATED: &str = "date_created";
pub const DATE_MODIFIED: &str = "date_modified";
pub const REVIEW_STATUS: &str = "entry_review_status";
pub const FORMER_TYPES: &str = "former_types";

/// Review states of an entry.
pub const REVIEW_STATES: &[&str] = &["draft", "pending", "accepted", "rejected"];

fn t(name: &str) -> TargetConstraint {
    TargetConstraint::one(name)
}

fn ts(names: &[&str]) -> TargetConstraint {
    TargetConstraint::many(names)
}

fn yes_no_na() -> ChoiceSet {
    ChoiceSet::new(&[("yes", "Yes"), ("no", "No"), ("NA", "Don't know / NA")])
}

fn access() -> ChoiceSet {
    ChoiceSet::new(&[
        ("free", "Free"),
        ("restricted", "Restricted"),
        ("NA", "NA / Unknown"),
    ])
}

fn geographic_scope() -> ChoiceSet {
    ChoiceSet::new(&[
        ("multinational", "Multinational"),
        ("national", "National"),
        ("subnational", "Subnational"),
    ])
}

/// User reference with `ip` and `timestamp` facets.
fn audit_stamp(name: &str, list: bool) -> Predicate {
    let p = if list {
        Predicate::list_relationship(name, t(USER_TYPE))
    } else {
        Predicate::single_relationship(name, t(USER_TYPE))
    };
    p.fixed()
        .read_only()
        .hidden()
        .facet(FacetSpec::string("ip"))
        .facet(FacetSpec::new("timestamp", FacetType::DateTime))
}

fn publication_metadata(def: TypeDef) -> TypeDef {
    def.predicate(
        Predicate::ordered_list("authors", ';')
            .describe("Separate authors with `;`, in the order of the publication")
            .overwrite(),
    )
    .predicate(Predicate::year("published_date").label("Year of publication").queryable())
    .predicate(Predicate::datetime("last_updated").overwrite())
    .predicate(Predicate::string("url").overwrite())
    .predicate(Predicate::string("doi").label("DOI").directive("@index(hash)").overwrite())
    .predicate(Predicate::string("arxiv").label("arXiv").directive("@index(hash)").overwrite())
}

fn entry() -> TypeDef {
    TypeDef::new(BASE_TYPE)
        .predicate(Predicate::uid())
        .predicate(Predicate::unique_name())
        .predicate(
            Predicate::datetime(DATE_CREATED)
                .fixed()
                .read_only()
                .hidden()
                .default_now()
                .directive("@index(day)"),
        )
        .predicate(
            Predicate::datetime(DATE_MODIFIED)
                .fixed()
                .read_only()
                .hidden()
                .directive("@index(day)"),
        )
        .predicate(audit_stamp(ENTRY_ADDED, false).label("Added by"))
        .predicate(audit_stamp(REVIEWED_BY, false).label("Reviewed by"))
        .predicate(audit_stamp(EDIT_HISTORY, true).label("Edited by"))
        .predicate(
            Predicate::single_choice(
                REVIEW_STATUS,
                ChoiceSet::new(&[
                    ("draft", "Draft"),
                    ("pending", "Pending"),
                    ("accepted", "Accepted"),
                    ("rejected", "Rejected"),
                ]),
            )
            .default_value(Value::string("pending"))
            .not_new()
            .permission(Role::Reviewer)
            .directive("@index(hash)"),
        )
        .predicate(
            Predicate::string("name")
                .required()
                .directive("@index(term, trigram)")
                .directive("@lang"),
        )
        .predicate(Predicate::list_string("alternate_names").directive("@index(term)"))
        .predicate(
            Predicate::string("description")
                .large()
                .overwrite()
                .directive("@index(fulltext, trigram, term)"),
        )
        .predicate(
            Predicate::string("wikidata_id")
                .label("WikiData ID")
                .describe("ID as used by WikiData")
                .not_new()
                .overwrite()
                .directive("@index(hash)"),
        )
        .predicate(
            Predicate::string("hdl")
                .label("HDL")
                .describe("handle.net external identifier")
                .hidden()
                .directive("@index(hash)"),
        )
}

fn organization() -> TypeDef {
    TypeDef::new("Organization")
        .extends(BASE_TYPE)
        .describe("companies, NGOs, businesses, media organizations")
        .predicate(Predicate::string("name").label("Organization Name").required())
        .predicate(
            Predicate::single_choice(
                "ownership_kind",
                ChoiceSet::new(&[
                    ("NA", "Don't know / NA"),
                    ("private ownership", "Mainly private Ownership"),
                    ("public ownership", "Mainly public ownership"),
                    ("unknown", "Unknown Ownership"),
                ]),
            )
            .queryable(),
        )
        .predicate(Predicate::single_relationship("country", t("Country")).queryable())
        .predicate(Predicate::list_relationship("publishes", t("Source")).overwrite())
        .predicate(
            Predicate::list_relationship("owns", t("Organization"))
                .allow_new()
                .overwrite(),
        )
        .predicate(Predicate::boolean("is_ngo").label("Is NGO"))
        .predicate(Predicate::single_choice("party_affiliated", yes_no_na()).not_new().queryable())
        .predicate(
            Predicate::string("address")
                .describe("Main address of the organization")
                .virtual_field()
                .autocode(Autocode::own(ResolverKind::Address)),
        )
        .predicate(Predicate::string("address_string").fixed().hidden())
        .predicate(Predicate::geo("address_geo").fixed().hidden())
        .predicate(Predicate::string("employees").not_new())
        .predicate(Predicate::datetime("date_founded").not_new().overwrite().queryable())
        .predicate(Predicate::reverse("owned_by", "owns", t("Organization")))
}

fn source() -> TypeDef {
    TypeDef::new("Source")
        .extends(BASE_TYPE)
        .describe("news sources: newspapers, broadcasts, websites, social media accounts")
        .predicate(
            Predicate::single_relationship("channel", t("Channel"))
                .describe("Through which channel is the news source distributed?")
                .required()
                .not_edit()
                .read_only()
                .queryable(),
        )
        .predicate(Predicate::string("name").label("Name of the News Source").required())
        .predicate(
            Predicate::string("channel_url")
                .label("URL of Channel")
                .describe("What is the url or social media handle of the news source?"),
        )
        .predicate(
            Predicate::boolean("verified_account")
                .fixed()
                .queryable()
                .autocode(Autocode::from_field(ResolverKind::SocialProfile, "channel_url")),
        )
        .predicate(Predicate::list_string("alternate_names").overwrite())
        .predicate(
            Predicate::single_choice(
                "transcript_kind",
                ChoiceSet::new(&[
                    ("tv", "TV (broadcast, cable, satellite, etc)"),
                    ("radio", "Radio"),
                    ("podcast", "Podcast"),
                    ("NA", "Don't know / NA"),
                ]),
            )
            .queryable(),
        )
        .predicate(Predicate::single_choice("website_allows_comments", yes_no_na()).queryable())
        .predicate(
            Predicate::single_choice("website_comments_registration_required", yes_no_na())
                .label("Registration required for posting comments"),
        )
        .predicate(Predicate::year("date_founded").overwrite().queryable())
        .predicate(
            Predicate::multiple_choice(
                "publication_kind",
                ChoiceSet::new(&[
                    ("newspaper", "Newspaper"),
                    ("news site", "News Site"),
                    ("news agency", "News Agency"),
                    ("magazine", "Magazine"),
                    ("tv show", "TV Show / TV Channel"),
                    ("radio show", "Radio Show / Radio Channel"),
                    ("podcast", "Podcast"),
                    ("news blog", "News Blog"),
                    ("alternative media", "Alternative Media"),
                ]),
            )
            .queryable(),
        )
        .predicate(Predicate::boolean("special_interest").queryable())
        .predicate(
            Predicate::multiple_choice(
                "topical_focus",
                ChoiceSet::new(&[
                    ("economy", "Business, Economy, Finance & Stocks"),
                    ("education", "Education"),
                    ("environment", "Environment"),
                    ("health", "Health"),
                    ("media", "Media"),
                    ("politics", "Politics"),
                    ("religion", "Religion"),
                    ("society", "Society & Panorama"),
                    ("science", "Science & Technology"),
                    ("youth", "Youth"),
                ]),
            )
            .queryable(),
        )
        .predicate(
            Predicate::single_choice(
                "publication_cycle",
                ChoiceSet::new(&[
                    ("continuous", "Continuous"),
                    ("daily", "Daily (7 times a week)"),
                    ("multiple times per week", "Multiple times per week"),
                    ("weekly", "Weekly"),
                    ("twice a month", "Twice a month"),
                    ("monthly", "Monthly"),
                    ("less than monthly", "Less frequent than monthly"),
                    ("NA", "Don't Know / NA"),
                ]),
            )
            .required()
            .queryable(),
        )
        .predicate(Predicate::multiple_choice_int(
            "publication_cycle_weekday",
            ChoiceSet::new(&[
                ("1", "Monday"),
                ("2", "Tuesday"),
                ("3", "Wednesday"),
                ("4", "Thursday"),
                ("5", "Friday"),
                ("6", "Saturday"),
                ("7", "Sunday"),
                ("NA", "Don't Know / NA"),
            ]),
        ))
        .predicate(
            Predicate::single_choice("geographic_scope", geographic_scope())
                .required()
                .queryable(),
        )
        .predicate(
            Predicate::list_relationship("country", ts(&["Country", "Multinational"]))
                .label("Countries")
                .required()
                .queryable(),
        )
        .predicate(
            Predicate::list_relationship("geographic_scope_subunit", t("Subnational"))
                .label("Subunits")
                .allow_new()
                .queryable()
                .autocode(Autocode::own(ResolverKind::Subunit)),
        )
        .predicate(
            Predicate::multiple_choice("languages", auxiliary::languages())
                .required()
                .queryable(),
        )
        .predicate(
            Predicate::single_choice(
                "payment_model",
                ChoiceSet::new(&[
                    ("free", "All content is free of charge"),
                    ("partly free", "Some content is free of charge"),
                    ("not free", "Paid content only"),
                    ("NA", "Don't Know / NA"),
                ]),
            )
            .required()
            .queryable(),
        )
        .predicate(
            Predicate::single_choice(
                "contains_ads",
                ChoiceSet::new(&[
                    ("yes", "Yes"),
                    ("no", "No"),
                    ("non subscribers", "Only for non-subscribers"),
                    ("NA", "Don't Know / NA"),
                ]),
            )
            .required()
            .queryable(),
        )
        .predicate(
            Predicate::list_year("audience_size")
                .not_edit()
                .facet(
                    FacetSpec::string("unit")
                        .with_choices(ChoiceSet::from_keys(&[
                            "followers",
                            "subscribers",
                            "copies sold",
                            "likes",
                            "daily visitors",
                        ]))
                        .queryable(),
                )
                .facet(FacetSpec::new("count", FacetType::Int).queryable())
                .facet(FacetSpec::string("data_from")),
        )
        .predicate(
            Predicate::list_relationship("publishes_org", t("Organization"))
                .label("Published by")
                .allow_new()
                .virtual_field()
                .autocode(Autocode::own(ResolverKind::Publisher)),
        )
        .predicate(
            Predicate::list_relationship("publishes_person", t("Person"))
                .label("Published by person")
                .allow_new()
                .virtual_field()
                .autocode(Autocode::own(ResolverKind::Publisher)),
        )
        .predicate(Predicate::single_choice("channel_epaper", yes_no_na()).queryable())
        .predicate(
            Predicate::reverse(
                "included_in",
                "sources_included",
                ts(&["Archive", "Dataset", "ResearchPaper"]),
            )
            .queryable(),
        )
        .predicate(Predicate::reverse("published_by", "publishes", ts(&["Organization", "Person"])))
        .predicate(Predicate::mutual_relationship("related", t("Source")).allow_new())
}

fn political_party() -> TypeDef {
    TypeDef::new("PoliticalParty")
        .extends(BASE_TYPE)
        .describe("political parties as legally registered")
        .predicate(
            Predicate::string("name_abbrev")
                .label("Abbreviated Name")
                .directive("@index(term, trigram)")
                .directive("@lang")
                .queryable(),
        )
        .predicate(Predicate::string("parlgov_id").label("ParlGov ID").directive("@index(hash)"))
        .predicate(
            Predicate::string("party_facts_id")
                .label("Party Facts ID")
                .directive("@index(hash)"),
        )
        .predicate(
            Predicate::single_relationship("country", ts(&["Country", "Multinational"]))
                .required()
                .queryable(),
        )
}

fn governing_body(name: &str, description: &str) -> TypeDef {
    TypeDef::new(name)
        .extends(BASE_TYPE)
        .describe(description)
        .predicate(
            Predicate::single_relationship("country", ts(&["Country", "Multinational"]))
                .required()
                .queryable(),
        )
        .predicate(Predicate::multiple_choice("languages", auxiliary::languages()))
        .predicate(Predicate::single_choice("geographic_scope", geographic_scope()).queryable())
        .predicate(Predicate::single_relationship("subnational", t("Subnational")))
        .predicate(Predicate::string("url"))
}

fn person() -> TypeDef {
    TypeDef::new("Person")
        .extends(BASE_TYPE)
        .predicate(Predicate::single_relationship("country", t("Country")).queryable())
        .predicate(Predicate::list_relationship("publishes", t("Source")).overwrite())
        .predicate(Predicate::string("url"))
}

fn channel() -> TypeDef {
    TypeDef::new("Channel")
        .extends(BASE_TYPE)
        .permissions(Role::Admin, Role::Admin)
}

fn country() -> TypeDef {
    TypeDef::new("Country")
        .extends(BASE_TYPE)
        .permissions(Role::Admin, Role::Admin)
        .predicate(
            Predicate::string("iso_3166_1_2")
                .permission(Role::Admin)
                .directive("@index(exact)"),
        )
        .predicate(
            Predicate::string("iso_3166_1_3")
                .permission(Role::Admin)
                .directive("@index(exact)"),
        )
        .predicate(Predicate::boolean("opted_scope").permission(Role::Admin))
}

fn multinational() -> TypeDef {
    TypeDef::new("Multinational")
        .extends(BASE_TYPE)
        .permissions(Role::Admin, Role::Admin)
        .predicate(Predicate::list_relationship("membership", t("Country")))
}

fn subnational() -> TypeDef {
    TypeDef::new("Subnational")
        .extends(BASE_TYPE)
        .permissions(Role::Reviewer, Role::Reviewer)
        .predicate(
            Predicate::single_relationship("country", t("Country"))
                .required()
                .overwrite(),
        )
        .predicate(Predicate::string("country_code").directive("@index(exact)"))
        .predicate(Predicate::geo("location_point").fixed())
}

fn archive() -> TypeDef {
    TypeDef::new("Archive")
        .extends(BASE_TYPE)
        .describe("archives of news texts available for research")
        .predicate(Predicate::string("name").label("Name of the archive").required().overwrite())
        .predicate(Predicate::string("url"))
        .predicate(Predicate::single_choice("access", access()).queryable())
        .predicate(Predicate::list_relationship("sources_included", t("Source")))
        .predicate(Predicate::list_relationship("country", ts(&["Country", "Multinational"])))
        .predicate(
            Predicate::list_relationship("unit_of_analysis", t("UnitOfAnalysis")).allow_new(),
        )
}

fn dataset() -> TypeDef {
    publication_metadata(
        TypeDef::new("Dataset")
            .extends(BASE_TYPE)
            .describe("annotated datasets of media texts"),
    )
    .predicate(Predicate::string("name").required().overwrite())
    .predicate(Predicate::single_choice("access", access()).queryable())
    .predicate(Predicate::multiple_choice("languages", auxiliary::languages()).queryable())
    .predicate(Predicate::list_relationship("file_formats", t("FileFormat")))
    .predicate(Predicate::list_relationship("sources_included", t("Source")))
    .predicate(Predicate::list_relationship("country", ts(&["Country", "Multinational"])))
    .predicate(Predicate::list_relationship("meta_variables", t("MetaVariable")))
    .predicate(Predicate::list_relationship("concept_variables", t("ConceptVariable")))
    .predicate(
        Predicate::list_relationship("unit_of_analysis", t("UnitOfAnalysis")).allow_new(),
    )
}

fn tool() -> TypeDef {
    publication_metadata(
        TypeDef::new("Tool")
            .extends(BASE_TYPE)
            .describe("software and services for text analysis"),
    )
    .predicate(Predicate::string("name").required().overwrite())
    .predicate(
        Predicate::string("github")
            .label("GitHub repository")
            .overwrite()
            .autocode(Autocode::own(ResolverKind::Repository)),
    )
    .predicate(Predicate::string("pypi").label("PyPI package").overwrite())
    .predicate(Predicate::string("cran").label("CRAN package").overwrite())
    .predicate(Predicate::string("license").overwrite())
    .predicate(
        Predicate::multiple_choice(
            "platform",
            ChoiceSet::new(&[
                ("windows", "Windows"),
                ("linux", "Linux"),
                ("macos", "macOS"),
                ("web", "Web based"),
            ]),
        )
        .queryable(),
    )
    .predicate(
        Predicate::multiple_choice("programming_languages", auxiliary::programming_languages())
            .label("Programming Languages")
            .queryable(),
    )
    .predicate(Predicate::single_choice("open_source", yes_no_na()).queryable())
    .predicate(Predicate::list_relationship("operations", t("Operation")).queryable())
    .predicate(Predicate::list_relationship("concept_variables", t("ConceptVariable")))
    .predicate(Predicate::list_relationship("channels", t("Channel")))
    .predicate(Predicate::multiple_choice("languages", auxiliary::languages()))
    .predicate(Predicate::list_relationship("input_file_format", t("FileFormat")))
    .predicate(Predicate::list_relationship("output_file_format", t("FileFormat")))
    .predicate(Predicate::reverse(
        "related_publications",
        "tools_used",
        t("ResearchPaper"),
    ))
}

fn research_paper() -> TypeDef {
    publication_metadata(
        TypeDef::new("ResearchPaper")
            .extends(BASE_TYPE)
            .describe("scientific publications that use news sources, datasets or tools"),
    )
    .predicate(Predicate::string("name").fixed().hidden())
    .predicate(Predicate::string("title").required().directive("@index(term, fulltext)"))
    .predicate(Predicate::string("paper_kind").label("Journal / Publication kind"))
    .predicate(Predicate::list_relationship("tools_used", t("Tool")))
    .predicate(Predicate::list_relationship("sources_included", t("Source")))
    .predicate(Predicate::list_relationship("datasets_used", t("Dataset")))
    .predicate(Predicate::list_relationship("country", t("Country")))
    .predicate(
        Predicate::list_relationship("unit_of_analysis", t("UnitOfAnalysis")).allow_new(),
    )
}

fn author() -> TypeDef {
    TypeDef::new("Author")
        .extends(BASE_TYPE)
        .predicate(Predicate::string("orcid").label("ORCID").directive("@index(hash)"))
}

fn language() -> TypeDef {
    TypeDef::new("Language")
        .extends(BASE_TYPE)
        .permissions(Role::Admin, Role::Admin)
        .predicate(Predicate::string("iso_639_2").label("ISO-639-2 Code").directive("@index(exact)"))
        .predicate(Predicate::string("iso_639_3").label("ISO-639-3 Code").directive("@index(exact)"))
        .predicate(Predicate::string("icu_code").label("ICU Locale Code").directive("@index(exact)"))
}

fn file_format() -> TypeDef {
    TypeDef::new("FileFormat")
        .extends(BASE_TYPE)
        .predicate(Predicate::string("mime_type").label("MIME type"))
}

fn tag(name: &str) -> TypeDef {
    TypeDef::new(name).extends(BASE_TYPE)
}

fn operation() -> TypeDef {
    tag("Operation").predicate(Predicate::reverse("tools", "operations", t("Tool")))
}

fn collection() -> TypeDef {
    TypeDef::new("Collection")
        .extends(BASE_TYPE)
        .predicate(Predicate::list_relationship("creators", t(USER_TYPE)).not_edit())
        .predicate(Predicate::list_relationship(
            "entries_included",
            ts(&["Dataset", "Archive", "Tool", "Source", "Organization", "ResearchPaper"]),
        ))
        .predicate(Predicate::multiple_choice("languages", auxiliary::languages()))
        .predicate(Predicate::list_relationship(
            "countries",
            ts(&["Country", "Multinational", "Subnational"]),
        ))
        .predicate(Predicate::list_relationship("tools", t("Tool")))
}

fn user() -> TypeDef {
    TypeDef::new(USER_TYPE)
        .permissions(Role::System, Role::System)
        .predicate(Predicate::uid())
        .predicate(
            Predicate::string("email")
                .required()
                .read_only()
                .not_edit()
                .directive("@index(hash)")
                .directive("@upsert"),
        )
        .predicate(
            Predicate::string("display_name")
                .label("Username")
                .describe("Your publicly visible username")
                .required(),
        )
        .predicate(Predicate::password("pw").label("Password").required())
        .predicate(Predicate::string("orcid").label("ORCID"))
        .predicate(
            Predicate::datetime("date_joined")
                .fixed()
                .read_only()
                .default_now(),
        )
        .predicate(
            Predicate::single_choice_int(
                "role",
                ChoiceSet::new(&[
                    ("1", "Contributor"),
                    ("2", "Reviewer"),
                    ("10", "Admin"),
                ]),
            )
            .label("User Role")
            .not_edit()
            .read_only()
            .default_value(Value::Int(Role::Contributor.level())),
        )
        .predicate(Predicate::string("affiliation"))
        .predicate(
            Predicate::single_choice(
                "account_status",
                ChoiceSet::new(&[("pending", "Pending"), ("active", "Active")]),
            )
            .hidden()
            .not_edit()
            .default_value(Value::string("pending")),
        )
        .predicate(
            Predicate::boolean("preference_emails")
                .label("Receive Email notifications")
                .default_value(Value::Bool(true)),
        )
        .predicate(
            Predicate::list_relationship("follows_entities", TargetConstraint::Any)
                .label("Following")
                .not_edit(),
        )
        .predicate(Predicate::list_string("follows_types").label("Following types"))
}

fn notification() -> TypeDef {
    TypeDef::new("Notification")
        .permissions(Role::System, Role::System)
        .predicate(Predicate::uid())
        .predicate(
            Predicate::datetime("notification_date")
                .default_now()
                .directive("@index(hour)"),
        )
        .predicate(Predicate::boolean("read").default_value(Value::Bool(false)))
        .predicate(Predicate::single_relationship("notify", t(USER_TYPE)).required())
        .predicate(Predicate::string("title").default_value(Value::string("Notification")))
        .predicate(Predicate::string("content"))
        .predicate(Predicate::boolean("email_dispatched").default_value(Value::Bool(false)))
}

fn comment() -> TypeDef {
    TypeDef::new("Comment")
        .predicate(Predicate::uid())
        .predicate(Predicate::single_relationship("creator", t(USER_TYPE)).not_edit())
        .predicate(Predicate::datetime("comment_date").fixed().default_now())
        .predicate(Predicate::datetime("comment_edited").not_new())
        .predicate(Predicate::single_relationship("comment_on", t(BASE_TYPE)).required())
        .predicate(Predicate::string("content").required())
}

fn file() -> TypeDef {
    TypeDef::new("File")
        .permissions(Role::System, Role::System)
        .predicate(Predicate::uid())
        .predicate(Predicate::string("name"))
        .predicate(Predicate::single_relationship("file_format", t("FileFormat")))
}

fn rejected() -> TypeDef {
    TypeDef::new(REJECTED_TYPE)
        .permissions(Role::System, Role::System)
        .predicate(Predicate::uid())
        .predicate(Predicate::unique_name())
        .predicate(Predicate::string("name"))
        .predicate(Predicate::datetime(DATE_CREATED))
        .predicate(Predicate::datetime(DATE_MODIFIED))
        .predicate(audit_stamp(ENTRY_ADDED, false))
        .predicate(audit_stamp(REVIEWED_BY, false))
        .predicate(audit_stamp(EDIT_HISTORY, true))
        .predicate(Predicate::list_string(FORMER_TYPES))
        .predicate(Predicate::string(REVIEW_STATUS).default_value(Value::string("rejected")))
}

/// Builds the inventory registry. Call once at startup and share the result.
pub fn build() -> Result<Registry, SchemaError> {
    RegistryBuilder::new()
        .define(user())
        .define(entry())
        .define(organization())
        .define(source())
        .define(political_party())
        .define(governing_body("Government", "national or subnational governments"))
        .define(governing_body("Parliament", "legislative bodies"))
        .define(person())
        .define(channel())
        .define(country())
        .define(multinational())
        .define(subnational())
        .define(archive())
        .define(dataset())
        .define(tool())
        .define(research_paper())
        .define(author())
        .define(language())
        .define(tag("ProgrammingLanguage"))
        .define(operation())
        .define(file_format())
        .define(tag("MetaVariable"))
        .define(tag("ConceptVariable"))
        .define(tag("UnitOfAnalysis"))
        .define(collection())
        .define(notification())
        .define(comment())
        .define(file())
        .define(rejected())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Operation;

    #[test]
    fn catalog_builds() {
        let registry = build().unwrap();
        for name in ["Source", "Organization", "Subnational", "Tool", "Rejected", "User"] {
            assert!(registry.contains(name), "{name}");
        }
        assert!(registry.is_entry_type("Source"));
        assert!(!registry.is_entry_type("User"));
        assert!(!registry.is_entry_type("Rejected"));
    }

    #[test]
    fn thresholds_follow_type_kind() {
        let r = build().unwrap();
        assert_eq!(r.get_permission("Source", Operation::Create).unwrap(), Role::Contributor);
        assert_eq!(r.get_permission("Channel", Operation::Create).unwrap(), Role::Admin);
        assert_eq!(r.get_permission("Subnational", Operation::Edit).unwrap(), Role::Reviewer);
        assert_eq!(r.get_permission("Notification", Operation::Create).unwrap(), Role::System);
        assert_eq!(r.get_permission("Comment", Operation::Create).unwrap(), Role::Contributor);
    }

    #[test]
    fn entry_fields_are_inherited() {
        let r = build().unwrap();
        let source = r.get_type("Source").unwrap();
        assert_eq!(source.predicates[0].name, "uid");
        assert!(source.predicate(ENTRY_ADDED).is_some());
        assert_eq!(source.predicate("name").unwrap().label, "Name of the News Source");

        let paper = r.get_type("ResearchPaper").unwrap();
        assert!(!paper.predicate("name").unwrap().required);
        assert!(paper.predicate("title").unwrap().required);
    }

    #[test]
    fn ddl_covers_special_types() {
        let ddl = build().unwrap().generate_storage_schema();
        assert!(ddl.contains("unique_name: string @index(hash, trigram) @upsert .\n"));
        assert!(ddl.contains("pw: password .\n"));
        assert!(ddl.contains("address_geo: geo @index(geo) .\n"));
        assert!(ddl.contains("audience_size: [datetime] .\n"));
        assert!(ddl.contains("publication_cycle_weekday: [int] .\n"));
        assert!(ddl.contains("channel: uid @reverse .\n"));
        assert!(!ddl.contains("publishes_org"));
        assert!(!ddl.contains("published_by"));
    }
}
