//! Attribute descriptors.
//!
//! # Responsibility
//! - Describe one declared field of a model: its flags, default and kind.
//! - Provide builder-style constructors for every scalar and relationship
//!   kind.
//!
//! # Invariants
//! - Descriptors are immutable once a schema is built.
//! - Relationship descriptors are resolved to model ids only by
//!   `SchemaBuilder::build`.
//!
//! # See also
//! - `scalar` for per-kind clean/validate/serialize rules.

pub mod epoch;
pub mod scalar;
pub mod value;

use crate::codec::inline::InlineCodec;
use crate::invalid::InvalidAttribute;
use crate::schema::{ModelId, SchemaError, SchemaResult};
use crate::util::sentence_case;
use regex::{Regex, RegexBuilder};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub use value::{Field, Value};

/// Default maximum length of plain string attributes.
pub const DEFAULT_MAX_LENGTH: usize = 255;
/// Maximum length of long string attributes.
pub const LONG_STRING_MAX_LENGTH: usize = 4_294_967_295;
/// Maximum length of URL attributes.
pub const URL_MAX_LENGTH: usize = 65_535;
/// Maximum length of slug attributes.
pub const SLUG_MAX_LENGTH: usize = 63;

pub(crate) const SLUG_PATTERN: &str = r"^[a-z_][a-z0-9_]*$";
pub(crate) const URL_CORE_PATTERN: &str = r"(?:http|ftp)s?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)";

/// Value provider used to seed a new instance.
#[derive(Clone)]
pub enum DefaultValue {
    Fixed(Value),
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Computed(factory) => factory(),
        }
    }
}

impl Debug for DefaultValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Closed domain of an enumeration attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDomain {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumDomain {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(member, ordinal)| (member.into(), ordinal))
                .collect(),
        }
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|(name, _)| name == member)
    }

    pub fn by_ordinal(&self, ordinal: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, value)| *value == ordinal)
            .map(|(name, _)| name.as_str())
    }

    pub fn member_names(&self) -> String {
        self.members
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Flavor of a string attribute; each flavor refines the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFlavor {
    String,
    LongString,
    Regex,
    Slug,
    Url,
}

impl TextFlavor {
    pub fn class_name(self) -> &'static str {
        match self {
            Self::String => "StringAttribute",
            Self::LongString => "LongStringAttribute",
            Self::Regex => "RegexAttribute",
            Self::Slug => "SlugAttribute",
            Self::Url => "UrlAttribute",
        }
    }
}

/// Compiled pattern of a regex-flavored string attribute.
#[derive(Debug, Clone)]
pub struct TextPattern {
    pub source: String,
    pub regex: Regex,
}

impl TextPattern {
    pub fn compile(source: &str, case_insensitive: bool) -> SchemaResult<Self> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|err| SchemaError::InvalidPattern {
                pattern: source.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

/// Constraints shared by the string family.
#[derive(Debug, Clone)]
pub struct TextRules {
    pub flavor: TextFlavor,
    pub min_length: usize,
    pub max_length: Option<usize>,
    pub pattern: Option<TextPattern>,
}

/// Relationship cardinality, named from the declaring side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// Side of a relationship an object sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The declaring class.
    Forward,
    /// The related class, through the mirror named `related_name`.
    Reverse,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

impl Cardinality {
    /// Whether `side` holds a collection for this cardinality.
    pub fn is_many(self, side: Side) -> bool {
        match side {
            Side::Forward => matches!(self, Self::OneToMany | Self::ManyToMany),
            Side::Reverse => matches!(self, Self::ManyToOne | Self::ManyToMany),
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Self::OneToOne => "OneToOneAttribute",
            Self::ManyToOne => "ManyToOneAttribute",
            Self::OneToMany => "OneToManyAttribute",
            Self::ManyToMany => "ManyToManyAttribute",
        }
    }
}

/// Relationship descriptor; one declaration defines both ends.
#[derive(Clone)]
pub struct Relation {
    pub cardinality: Cardinality,
    pub related_class: String,
    pub related_name: Option<String>,
    pub verbose_related_name: String,
    /// Whether the single-valued forward side may be empty.
    pub none: bool,
    /// Whether the single-valued reverse side may be empty.
    pub related_none: bool,
    /// Custom single-cell codec used for inline related classes.
    pub inline: Option<Arc<dyn InlineCodec>>,
    pub(crate) primary_model: ModelId,
    pub(crate) related_model: ModelId,
}

impl Relation {
    /// Class that declares the relationship.
    pub fn primary_model(&self) -> ModelId {
        self.primary_model
    }

    /// Class the relationship points at.
    pub fn related_model(&self) -> ModelId {
        self.related_model
    }

    /// Class expected on the far side when standing on `side`.
    pub fn peer_model(&self, side: Side) -> ModelId {
        match side {
            Side::Forward => self.related_model,
            Side::Reverse => self.primary_model,
        }
    }
}

impl Debug for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("cardinality", &self.cardinality)
            .field("related_class", &self.related_class)
            .field("related_name", &self.related_name)
            .field("none", &self.none)
            .field("related_none", &self.related_none)
            .field("inline", &self.inline.is_some())
            .finish()
    }
}

/// Kind-specific constraints of an attribute.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    Boolean,
    Enum(EnumDomain),
    Integer { min: Option<i64>, max: Option<i64> },
    PositiveInteger { max: Option<i64> },
    /// NaN bounds mean unbounded.
    Float { min: f64, max: f64, nan: bool },
    Text(TextRules),
    Date { none: bool },
    Time { none: bool },
    DateTime { none: bool },
    Related(Relation),
}

/// Kind lineage used to check subclass overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    Boolean,
    Enum,
    Integer,
    PositiveInteger,
    Float,
    String,
    LongString,
    Regex,
    Slug,
    Url,
    Date,
    Time,
    DateTime,
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl KindTag {
    fn lineage(self) -> &'static [KindTag] {
        use KindTag::*;
        match self {
            PositiveInteger => &[PositiveInteger, Integer],
            LongString => &[LongString, String],
            Regex => &[Regex, String],
            Slug => &[Slug, Regex, String],
            Url => &[Url, Regex, String],
            Boolean => &[Boolean],
            Enum => &[Enum],
            Integer => &[Integer],
            Float => &[Float],
            String => &[String],
            Date => &[Date],
            Time => &[Time],
            DateTime => &[DateTime],
            OneToOne => &[OneToOne],
            ManyToOne => &[ManyToOne],
            OneToMany => &[OneToMany],
            ManyToMany => &[ManyToMany],
        }
    }

    /// Whether a `self` attribute may override an inherited `base` one.
    pub fn is_subtype_of(self, base: KindTag) -> bool {
        self.lineage().contains(&base)
    }
}

impl AttributeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Boolean => KindTag::Boolean,
            Self::Enum(_) => KindTag::Enum,
            Self::Integer { .. } => KindTag::Integer,
            Self::PositiveInteger { .. } => KindTag::PositiveInteger,
            Self::Float { .. } => KindTag::Float,
            Self::Text(rules) => match rules.flavor {
                TextFlavor::String => KindTag::String,
                TextFlavor::LongString => KindTag::LongString,
                TextFlavor::Regex => KindTag::Regex,
                TextFlavor::Slug => KindTag::Slug,
                TextFlavor::Url => KindTag::Url,
            },
            Self::Date { .. } => KindTag::Date,
            Self::Time { .. } => KindTag::Time,
            Self::DateTime { .. } => KindTag::DateTime,
            Self::Related(relation) => match relation.cardinality {
                Cardinality::OneToOne => KindTag::OneToOne,
                Cardinality::ManyToOne => KindTag::ManyToOne,
                Cardinality::OneToMany => KindTag::OneToMany,
                Cardinality::ManyToMany => KindTag::ManyToMany,
            },
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Boolean => "BooleanAttribute",
            Self::Enum(_) => "EnumAttribute",
            Self::Integer { .. } => "IntegerAttribute",
            Self::PositiveInteger { .. } => "PositiveIntegerAttribute",
            Self::Float { .. } => "FloatAttribute",
            Self::Text(rules) => rules.flavor.class_name(),
            Self::Date { .. } => "DateAttribute",
            Self::Time { .. } => "TimeAttribute",
            Self::DateTime { .. } => "DateTimeAttribute",
            Self::Related(relation) => relation.cardinality.class_name(),
        }
    }
}

/// One declared field of a model.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub verbose_name: String,
    pub help: String,
    pub primary: bool,
    pub unique: bool,
    pub unique_case_insensitive: bool,
    pub default: Option<DefaultValue>,
    pub kind: AttributeKind,
}

impl Attribute {
    /// Creates an attribute whose verbose name is the sentence-cased name.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        let name = name.into();
        Self {
            verbose_name: sentence_case(&name),
            name,
            help: String::new(),
            primary: false,
            unique: false,
            unique_case_insensitive: false,
            default: None,
            kind,
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Boolean).default_value(Value::Bool(false))
    }

    pub fn enumeration(name: impl Into<String>, domain: EnumDomain) -> Self {
        Self::new(name, AttributeKind::Enum(domain))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Integer { min: None, max: None })
    }

    pub fn positive_integer(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::PositiveInteger { max: None })
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(
            name,
            AttributeKind::Float {
                min: f64::NAN,
                max: f64::NAN,
                nan: true,
            },
        )
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::text(name, TextFlavor::String, 0, Some(DEFAULT_MAX_LENGTH), None)
    }

    pub fn long_string(name: impl Into<String>) -> Self {
        Self::text(name, TextFlavor::LongString, 0, Some(LONG_STRING_MAX_LENGTH), None)
    }

    /// String attribute constrained by `pattern`.
    pub fn regex(
        name: impl Into<String>,
        pattern: &str,
        case_insensitive: bool,
    ) -> SchemaResult<Self> {
        let pattern = TextPattern::compile(pattern, case_insensitive)?;
        Ok(Self::text(
            name,
            TextFlavor::Regex,
            0,
            Some(DEFAULT_MAX_LENGTH),
            Some(pattern),
        ))
    }

    /// Identifier-like string; primary and unique unless told otherwise.
    pub fn slug(name: impl Into<String>) -> Self {
        let pattern = TextPattern {
            source: SLUG_PATTERN.to_string(),
            regex: Regex::clone(&scalar::SLUG_RE),
        };
        let mut attr = Self::text(
            name,
            TextFlavor::Slug,
            1,
            Some(SLUG_MAX_LENGTH),
            Some(pattern),
        );
        attr.primary = true;
        attr.unique = true;
        attr.help = "Enter a unique string identifier that (1) starts with a letter, (2) is composed of letters, numbers and underscores, and (3) is less than 64 characters long".to_string();
        attr
    }

    /// URL string; an empty value is allowed while `min_length` is zero.
    pub fn url(name: impl Into<String>) -> Self {
        let pattern = TextPattern {
            source: scalar::url_pattern_source(true),
            regex: Regex::clone(&scalar::URL_OR_EMPTY_RE),
        };
        let mut attr = Self::text(name, TextFlavor::Url, 0, Some(URL_MAX_LENGTH), Some(pattern));
        attr.verbose_name = "URL".to_string();
        attr.help = "Enter a valid URL".to_string();
        attr
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Date { none: true })
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Time { none: true })
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::DateTime { none: true })
    }

    pub fn one_to_one(name: impl Into<String>, related_class: impl Into<String>) -> Self {
        Self::relationship(name, Cardinality::OneToOne, related_class)
    }

    pub fn many_to_one(name: impl Into<String>, related_class: impl Into<String>) -> Self {
        Self::relationship(name, Cardinality::ManyToOne, related_class)
    }

    pub fn one_to_many(name: impl Into<String>, related_class: impl Into<String>) -> Self {
        Self::relationship(name, Cardinality::OneToMany, related_class)
    }

    pub fn many_to_many(name: impl Into<String>, related_class: impl Into<String>) -> Self {
        Self::relationship(name, Cardinality::ManyToMany, related_class)
    }

    fn relationship(
        name: impl Into<String>,
        cardinality: Cardinality,
        related_class: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Related(Relation {
                cardinality,
                related_class: related_class.into(),
                related_name: None,
                verbose_related_name: String::new(),
                none: true,
                related_none: true,
                inline: None,
                primary_model: ModelId::UNRESOLVED,
                related_model: ModelId::UNRESOLVED,
            }),
        )
    }

    fn text(
        name: impl Into<String>,
        flavor: TextFlavor,
        min_length: usize,
        max_length: Option<usize>,
        pattern: Option<TextPattern>,
    ) -> Self {
        Self::new(
            name,
            AttributeKind::Text(TextRules {
                flavor,
                min_length,
                max_length,
                pattern,
            }),
        )
        .default_value(Value::String(String::new()))
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_primary(mut self) -> Self {
        self.primary = false;
        self
    }

    pub fn not_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    pub fn unique_case_insensitive(mut self) -> Self {
        self.unique = true;
        self.unique_case_insensitive = true;
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = verbose_name.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Fixed(value.into()));
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(factory)));
        self
    }

    /// Inclusive lower bound for integer and float kinds.
    pub fn with_min(mut self, min: f64) -> Self {
        match &mut self.kind {
            AttributeKind::Float { min: bound, .. } => *bound = min,
            AttributeKind::Integer { min: bound, .. } => *bound = Some(min as i64),
            _ => {}
        }
        self
    }

    /// Inclusive upper bound for integer and float kinds.
    pub fn with_max(mut self, max: f64) -> Self {
        match &mut self.kind {
            AttributeKind::Float { max: bound, .. } => *bound = max,
            AttributeKind::Integer { max: bound, .. }
            | AttributeKind::PositiveInteger { max: bound } => *bound = Some(max as i64),
            _ => {}
        }
        self
    }

    /// Whether a float attribute accepts NaN.
    pub fn with_nan(mut self, allowed: bool) -> Self {
        if let AttributeKind::Float { nan, .. } = &mut self.kind {
            *nan = allowed;
        }
        self
    }

    /// Length bounds for the string family.
    ///
    /// For URLs a non-zero minimum also rejects the empty string.
    pub fn with_length(mut self, min_length: usize, max_length: Option<usize>) -> Self {
        if let AttributeKind::Text(rules) = &mut self.kind {
            rules.min_length = min_length;
            rules.max_length = max_length;
            if rules.flavor == TextFlavor::Url {
                let allow_empty = min_length == 0;
                rules.pattern = Some(TextPattern {
                    source: scalar::url_pattern_source(allow_empty),
                    regex: if allow_empty {
                        Regex::clone(&scalar::URL_OR_EMPTY_RE)
                    } else {
                        Regex::clone(&scalar::URL_RE)
                    },
                });
            }
        }
        self
    }

    /// Whether a date/time kind or a single-valued forward relationship
    /// side may be empty.
    pub fn with_none(mut self, allowed: bool) -> Self {
        match &mut self.kind {
            AttributeKind::Date { none }
            | AttributeKind::Time { none }
            | AttributeKind::DateTime { none } => *none = allowed,
            AttributeKind::Related(relation) => relation.none = allowed,
            _ => {}
        }
        self
    }

    /// Whether a single-valued reverse relationship side may be empty.
    pub fn related_none(mut self, allowed: bool) -> Self {
        if let AttributeKind::Related(relation) = &mut self.kind {
            relation.related_none = allowed;
        }
        self
    }

    /// Names the mirror attribute materialized on the related class.
    pub fn related_name(mut self, related_name: impl Into<String>) -> Self {
        if let AttributeKind::Related(relation) = &mut self.kind {
            let related_name = related_name.into();
            if relation.verbose_related_name.is_empty() {
                relation.verbose_related_name = sentence_case(&related_name);
            }
            relation.related_name = Some(related_name);
        }
        self
    }

    pub fn verbose_related_name(mut self, verbose: impl Into<String>) -> Self {
        if let AttributeKind::Related(relation) = &mut self.kind {
            relation.verbose_related_name = verbose.into();
        }
        self
    }

    /// Serializes the related objects into the owner's cell with `codec`.
    pub fn inline_codec(mut self, codec: Arc<dyn InlineCodec>) -> Self {
        if let AttributeKind::Related(relation) = &mut self.kind {
            relation.inline = Some(codec);
        }
        self
    }

    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            AttributeKind::Related(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn is_related(&self) -> bool {
        matches!(self.kind, AttributeKind::Related(_))
    }

    /// Builds an error about this attribute's own value.
    pub fn invalid(&self, messages: Vec<String>) -> InvalidAttribute {
        InvalidAttribute::new(self.name.clone(), messages)
    }

    /// Builds an error about the mirrored side of this relationship.
    pub fn invalid_related(&self, messages: Vec<String>) -> InvalidAttribute {
        let name = self
            .relation()
            .and_then(|relation| relation.related_name.clone())
            .unwrap_or_else(|| self.name.clone());
        let mut error = InvalidAttribute::new(name, messages);
        error.related = true;
        error
    }
}
