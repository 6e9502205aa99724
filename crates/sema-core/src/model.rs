//! # Semantic Model
//!
//! The immutable description of a domain: its core concept tags, the target
//! representations it allows, the verb-noun rules that bound which tasks are
//! legal, noun categories for wildcard rules, and the structurally required
//! fields of any value in the domain.
//!
//! ## Invariants
//!
//! - A `SemanticModel` can only be produced from a validated
//!   [`ModelDefinition`] (directly, via [`SemanticModelBuilder`], or through
//!   serde, which routes through `TryFrom<ModelDefinition>`).
//! - Once built, a model is never mutated. Its lookup index is derived once
//!   at construction.
//!
//! ## Rule Grammar
//!
//! Each side of a [`PairRule`] is a [`TermPattern`]:
//!
//! | Text | Pattern | Matches |
//! |------|---------|---------|
//! | `*` | `Any` | every term |
//! | `@ground-vehicle` | `Category` | nouns listed under that category |
//! | `speed*` | `Prefix` | terms starting with `speed` |
//! | `car` | `Literal` | exactly `car` |
//!
//! Rules whose verb and noun are both literals are indexed by
//! `domain → noun → {verb}` for O(1) average lookup. Every other rule is kept
//! in a per-domain list and scanned.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::identity::FormatId;

// ─── VerbNounPair ────────────────────────────────────────────────────

/// A task descriptor: an action, its subject, and the domain it is claimed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbNounPair {
    /// The action tag (e.g. `"speeding"`).
    pub verb: String,
    /// The subject tag (e.g. `"car"`).
    pub noun: String,
    /// The domain tag (e.g. `"ground"`).
    pub domain: String,
}

impl VerbNounPair {
    /// Create a pair from its three tags.
    pub fn new(verb: impl Into<String>, noun: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            noun: noun.into(),
            domain: domain.into(),
        }
    }
}

impl std::fmt::Display for VerbNounPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.verb, self.noun, self.domain)
    }
}

// ─── TermPattern ─────────────────────────────────────────────────────

/// One side of a pair rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TermPattern {
    /// `*`: matches every term.
    Any,
    /// `@name`: matches nouns listed under the named category.
    Category(String),
    /// `text*`: matches terms starting with `text`.
    Prefix(String),
    /// Matches exactly this term.
    Literal(String),
}

impl TermPattern {
    /// Whether this pattern is a plain literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// The literal text, if this pattern is a literal.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Whether `term` matches this pattern, resolving categories against `categories`.
    pub fn matches(&self, term: &str, categories: &BTreeMap<String, BTreeSet<String>>) -> bool {
        match self {
            Self::Any => true,
            Self::Category(name) => categories
                .get(name)
                .is_some_and(|members| members.contains(term)),
            Self::Prefix(prefix) => term.starts_with(prefix.as_str()),
            Self::Literal(lit) => lit == term,
        }
    }
}

impl FromStr for TermPattern {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidPattern {
            pattern: s.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty pattern"));
        }
        if s == "*" {
            return Ok(Self::Any);
        }
        if let Some(name) = s.strip_prefix('@') {
            if name.is_empty() || name.contains(['@', '*']) {
                return Err(invalid("category name must be non-empty and plain"));
            }
            return Ok(Self::Category(name.to_string()));
        }
        if let Some(prefix) = s.strip_suffix('*') {
            if prefix.contains('*') {
                return Err(invalid("'*' is only allowed as a trailing wildcard"));
            }
            return Ok(Self::Prefix(prefix.to_string()));
        }
        if s.contains('*') {
            return Err(invalid("'*' is only allowed as a trailing wildcard"));
        }
        Ok(Self::Literal(s.to_string()))
    }
}

impl TryFrom<String> for TermPattern {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TermPattern> for String {
    fn from(p: TermPattern) -> Self {
        p.to_string()
    }
}

impl std::fmt::Display for TermPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Category(name) => write!(f, "@{name}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Literal(lit) => f.write_str(lit),
        }
    }
}

// ─── PairRule ────────────────────────────────────────────────────────

/// An allowed verb-noun combination within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairRule {
    /// Pattern over verbs.
    pub verb: TermPattern,
    /// Pattern over nouns.
    pub noun: TermPattern,
    /// The domain the rule applies in (always literal).
    pub domain: String,
}

impl PairRule {
    /// Whether both sides are literals (indexed rather than scanned).
    pub fn is_exact(&self) -> bool {
        self.verb.is_literal() && self.noun.is_literal()
    }

    /// Whether this rule permits `pair` (domain compared exactly).
    pub fn permits(&self, pair: &VerbNounPair, categories: &BTreeMap<String, BTreeSet<String>>) -> bool {
        self.domain == pair.domain
            && self.noun.matches(&pair.noun, categories)
            && self.verb.matches(&pair.verb, categories)
    }
}

impl std::fmt::Display for PairRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.verb, self.noun, self.domain)
    }
}

// ─── Required fields ─────────────────────────────────────────────────

/// The JSON kind a required field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Any non-null value.
    Any,
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number representable as i64 or u64.
    Integer,
    /// A JSON boolean.
    Bool,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldKind {
    /// Whether `value` is compatible with this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => !value.is_null(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// A structurally required field, addressed by a dotted path into an object payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Dotted path, e.g. `"vehicle.wheels"`.
    pub path: String,
    /// Required kind.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a field spec.
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Resolve this field's path in `payload`.
    pub fn lookup<'v>(&self, payload: &'v Value) -> Option<&'v Value> {
        self.path
            .split('.')
            .try_fold(payload, |node, segment| node.as_object()?.get(segment))
    }

    /// Whether `payload` carries this field with a compatible kind.
    pub fn is_satisfied_by(&self, payload: &Value) -> bool {
        self.lookup(payload).is_some_and(|v| self.kind.accepts(v))
    }
}

// ─── ModelDefinition ─────────────────────────────────────────────────

/// The plain-data form of a semantic model, used for construction and serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Domain name (e.g. `"transportation"`).
    pub domain: String,
    /// Ordered, duplicate-free core concept tags.
    #[serde(default)]
    pub core_concepts: Vec<String>,
    /// Allowed target representation identifiers.
    #[serde(default)]
    pub target_formats: BTreeSet<FormatId>,
    /// Allowed verb-noun rules (exact and pattern).
    #[serde(default)]
    pub rules: Vec<PairRule>,
    /// Noun categories referenced by `@category` patterns.
    #[serde(default)]
    pub noun_categories: BTreeMap<String, BTreeSet<String>>,
    /// Structurally required fields.
    #[serde(default)]
    pub required_fields: Vec<FieldSpec>,
}

// ─── SemanticModel ───────────────────────────────────────────────────

/// An immutable, validated semantic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ModelDefinition", into = "ModelDefinition")]
pub struct SemanticModel {
    definition: ModelDefinition,
    /// domain → noun → allowed verbs, for literal rules.
    exact: HashMap<String, HashMap<String, HashSet<String>>>,
    /// domain → non-literal rules.
    patterns: HashMap<String, Vec<PairRule>>,
    concept_set: HashSet<String>,
}

impl SemanticModel {
    /// Start building a model for `domain`.
    pub fn builder(domain: impl Into<String>) -> SemanticModelBuilder {
        SemanticModelBuilder {
            definition: ModelDefinition {
                domain: domain.into(),
                ..ModelDefinition::default()
            },
            error: None,
        }
    }

    /// Validate a definition and derive the lookup index.
    pub fn new(definition: ModelDefinition) -> Result<Self, ModelError> {
        if definition.domain.trim().is_empty() {
            return Err(ModelError::EmptyDomain);
        }

        let mut concept_set = HashSet::with_capacity(definition.core_concepts.len());
        for concept in &definition.core_concepts {
            if concept.is_empty() {
                return Err(ModelError::EmptyTerm("core concept"));
            }
            if !concept_set.insert(concept.clone()) {
                return Err(ModelError::DuplicateConcept(concept.clone()));
            }
        }

        for (name, members) in &definition.noun_categories {
            if name.is_empty() {
                return Err(ModelError::EmptyTerm("noun category name"));
            }
            if members.iter().any(String::is_empty) {
                return Err(ModelError::EmptyTerm("noun category member"));
            }
        }

        for field in &definition.required_fields {
            if field.path.is_empty() || field.path.split('.').any(str::is_empty) {
                return Err(ModelError::EmptyTerm("required field path segment"));
            }
        }

        let mut exact: HashMap<String, HashMap<String, HashSet<String>>> = HashMap::new();
        let mut patterns: HashMap<String, Vec<PairRule>> = HashMap::new();
        for rule in &definition.rules {
            if rule.domain.is_empty() {
                return Err(ModelError::EmptyTerm("rule domain"));
            }
            for side in [&rule.verb, &rule.noun] {
                if let TermPattern::Category(name) = side {
                    if !definition.noun_categories.contains_key(name) {
                        return Err(ModelError::UnknownCategory(name.clone()));
                    }
                }
            }
            match (rule.verb.as_literal(), rule.noun.as_literal()) {
                (Some(verb), Some(noun)) => {
                    exact
                        .entry(rule.domain.clone())
                        .or_default()
                        .entry(noun.to_string())
                        .or_default()
                        .insert(verb.to_string());
                }
                _ => patterns
                    .entry(rule.domain.clone())
                    .or_default()
                    .push(rule.clone()),
            }
        }

        Ok(Self {
            definition,
            exact,
            patterns,
            concept_set,
        })
    }

    /// The domain name.
    pub fn domain(&self) -> &str {
        &self.definition.domain
    }

    /// Core concept tags in declaration order.
    pub fn core_concepts(&self) -> &[String] {
        &self.definition.core_concepts
    }

    /// Whether `tag` is a core concept.
    pub fn is_core_concept(&self, tag: &str) -> bool {
        self.concept_set.contains(tag)
    }

    /// Allowed target representation identifiers.
    pub fn target_formats(&self) -> &BTreeSet<FormatId> {
        &self.definition.target_formats
    }

    /// Whether `format` is an allowed transformation target.
    pub fn allows_target(&self, format: &FormatId) -> bool {
        self.definition.target_formats.contains(format)
    }

    /// All declared pair rules in declaration order.
    pub fn rules(&self) -> &[PairRule] {
        &self.definition.rules
    }

    /// Declared noun categories.
    pub fn noun_categories(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.definition.noun_categories
    }

    /// Structurally required fields.
    pub fn required_fields(&self) -> &[FieldSpec] {
        &self.definition.required_fields
    }

    /// Verbs declared by literal rules for `(domain, noun)`.
    pub fn exact_verbs(&self, domain: &str, noun: &str) -> Option<&HashSet<String>> {
        self.exact.get(domain)?.get(noun)
    }

    /// Non-literal rules declared for `domain`.
    pub fn pattern_rules(&self, domain: &str) -> &[PairRule] {
        self.patterns.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any rule is declared for `domain`.
    pub fn declares_domain(&self, domain: &str) -> bool {
        self.exact.contains_key(domain) || self.patterns.contains_key(domain)
    }

    /// Whether `noun` is named (literally or through a category) by some rule in `domain`.
    ///
    /// A bare `*` or prefix noun pattern does not make a noun "known".
    pub fn knows_noun_in(&self, domain: &str, noun: &str) -> bool {
        if self.exact_verbs(domain, noun).is_some() {
            return true;
        }
        self.pattern_rules(domain).iter().any(|rule| match &rule.noun {
            TermPattern::Literal(lit) => lit == noun,
            TermPattern::Category(_) => rule.noun.matches(noun, self.noun_categories()),
            TermPattern::Any | TermPattern::Prefix(_) => false,
        })
    }

    /// Domains other than `pair.domain` in which the pair's exact
    /// `(verb, noun)` combination is declared literally.
    pub fn domains_declaring(&self, pair: &VerbNounPair) -> Vec<&str> {
        let mut domains: Vec<&str> = self
            .exact
            .iter()
            .filter(|(domain, nouns)| {
                domain.as_str() != pair.domain
                    && nouns
                        .get(&pair.noun)
                        .is_some_and(|verbs| verbs.contains(&pair.verb))
            })
            .map(|(domain, _)| domain.as_str())
            .collect();
        domains.sort_unstable();
        domains
    }

    /// The plain-data definition this model was built from.
    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }
}

impl TryFrom<ModelDefinition> for SemanticModel {
    type Error = ModelError;

    fn try_from(definition: ModelDefinition) -> Result<Self, Self::Error> {
        Self::new(definition)
    }
}

impl From<SemanticModel> for ModelDefinition {
    fn from(model: SemanticModel) -> Self {
        model.definition
    }
}

impl PartialEq for SemanticModel {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Fluent construction of a [`SemanticModel`].
///
/// Pattern parse errors are deferred to [`SemanticModelBuilder::build()`].
#[derive(Debug)]
pub struct SemanticModelBuilder {
    definition: ModelDefinition,
    error: Option<ModelError>,
}

impl SemanticModelBuilder {
    /// Append a core concept tag.
    pub fn concept(mut self, tag: impl Into<String>) -> Self {
        self.definition.core_concepts.push(tag.into());
        self
    }

    /// Append several core concept tags.
    pub fn concepts<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition
            .core_concepts
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Allow a target representation.
    pub fn target(mut self, format: FormatId) -> Self {
        self.definition.target_formats.insert(format);
        self
    }

    /// Allow an exact verb-noun pair.
    pub fn allow(self, verb: &str, noun: &str, domain: &str) -> Self {
        self.rule(verb, noun, domain)
    }

    /// Allow a rule written in the pattern grammar (`*`, `@category`, `prefix*`, literal).
    pub fn rule(mut self, verb: &str, noun: &str, domain: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (verb.parse::<TermPattern>(), noun.parse::<TermPattern>()) {
            (Ok(verb), Ok(noun)) => self.definition.rules.push(PairRule {
                verb,
                noun,
                domain: domain.to_string(),
            }),
            (Err(e), _) | (_, Err(e)) => self.error = Some(e),
        }
        self
    }

    /// Declare a noun category.
    pub fn category<I, S>(mut self, name: impl Into<String>, nouns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition
            .noun_categories
            .entry(name.into())
            .or_default()
            .extend(nouns.into_iter().map(Into::into));
        self
    }

    /// Declare a structurally required field.
    pub fn require_field(mut self, path: impl Into<String>, kind: FieldKind) -> Self {
        self.definition.required_fields.push(FieldSpec::new(path, kind));
        self
    }

    /// Validate and build the model.
    pub fn build(self) -> Result<SemanticModel, ModelError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        SemanticModel::new(self.definition)
    }
}
