//! Symbolic variable keys.
//!
//! A summary variable is identified by its keyword (e.g. `WOPR`, oil
//! production rate of a well) together with the entity it measures. The
//! entity depends on the category:
//!
//! | Category   | Entity                        | General key  |
//! |------------|-------------------------------|--------------|
//! | Well       | well name                     | `WOPR:W1`    |
//! | Group      | group name                    | `GOPT:G1`    |
//! | Region     | region number                 | `RPR:3`      |
//! | Field      | none                          | `FOPT`       |
//! | Completion | well name + completion number | `COPR:W1:5`  |
//! | Misc       | none                          | `TIME`       |
//!
//! The category is implied by the first letter of the keyword.

pub mod catalog;

pub use catalog::{KeyCatalog, Variable};

use crate::error::{Result, SummaryError};
use std::fmt;
use std::str::FromStr;

/// Separator between the parts of a general key.
pub const KEY_SEPARATOR: char = ':';

/// Measurement category of a summary variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VarCategory {
    /// Scoped to a single well.
    Well = 0,
    /// Scoped to a named group of wells.
    Group = 1,
    /// Scoped to a numbered reservoir region.
    Region = 2,
    /// Scoped to the whole field.
    Field = 3,
    /// Scoped to one completion of a well.
    Completion = 4,
    /// Anything else (timing, solver statistics).
    Misc = 5,
}

impl VarCategory {
    /// Infers the category from the first letter of a keyword.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.as_bytes().first() {
            Some(b'W') => Self::Well,
            Some(b'G') => Self::Group,
            Some(b'R') => Self::Region,
            Some(b'F') => Self::Field,
            Some(b'C') => Self::Completion,
            _ => Self::Misc,
        }
    }

    /// Creates a category from its on-disk tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Well),
            1 => Some(Self::Group),
            2 => Some(Self::Region),
            3 => Some(Self::Field),
            4 => Some(Self::Completion),
            5 => Some(Self::Misc),
            _ => None,
        }
    }

    /// Short upper-case tag used by the formatted codec.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Well => "WELL",
            Self::Group => "GROUP",
            Self::Region => "REGION",
            Self::Field => "FIELD",
            Self::Completion => "COMPLETION",
            Self::Misc => "MISC",
        }
    }

    /// Parses a tag produced by [`VarCategory::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "WELL" => Some(Self::Well),
            "GROUP" => Some(Self::Group),
            "REGION" => Some(Self::Region),
            "FIELD" => Some(Self::Field),
            "COMPLETION" => Some(Self::Completion),
            "MISC" => Some(Self::Misc),
            _ => None,
        }
    }
}

impl fmt::Display for VarCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identity of a summary variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarKey {
    /// Well variable.
    Well {
        /// Variable keyword, e.g. `WOPR`.
        keyword: String,
        /// Well name.
        well: String,
    },
    /// Group variable.
    Group {
        /// Variable keyword, e.g. `GOPT`.
        keyword: String,
        /// Group name.
        group: String,
    },
    /// Region variable.
    Region {
        /// Variable keyword, e.g. `RPR`.
        keyword: String,
        /// Region number.
        region: u32,
    },
    /// Field variable.
    Field {
        /// Variable keyword, e.g. `FOPT`.
        keyword: String,
    },
    /// Well completion variable.
    Completion {
        /// Variable keyword, e.g. `COPR`.
        keyword: String,
        /// Well name.
        well: String,
        /// Completion number on the well.
        completion: u32,
    },
    /// Miscellaneous variable.
    Misc {
        /// Variable keyword, e.g. `TIME`.
        keyword: String,
    },
}

impl VarKey {
    /// Creates a well key.
    pub fn well(keyword: impl Into<String>, well: impl Into<String>) -> Self {
        Self::Well {
            keyword: keyword.into(),
            well: well.into(),
        }
    }

    /// Creates a group key.
    pub fn group(keyword: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Group {
            keyword: keyword.into(),
            group: group.into(),
        }
    }

    /// Creates a region key.
    pub fn region(keyword: impl Into<String>, region: u32) -> Self {
        Self::Region {
            keyword: keyword.into(),
            region,
        }
    }

    /// Creates a field key.
    pub fn field(keyword: impl Into<String>) -> Self {
        Self::Field {
            keyword: keyword.into(),
        }
    }

    /// Creates a well completion key.
    pub fn completion(keyword: impl Into<String>, well: impl Into<String>, completion: u32) -> Self {
        Self::Completion {
            keyword: keyword.into(),
            well: well.into(),
            completion,
        }
    }

    /// Creates a miscellaneous key.
    pub fn misc(keyword: impl Into<String>) -> Self {
        Self::Misc {
            keyword: keyword.into(),
        }
    }

    /// Builds a key from its stored parts.
    ///
    /// `name` is ignored for categories without a named entity and `number`
    /// for categories without a numbered one.
    pub fn from_parts(
        category: VarCategory,
        keyword: &str,
        name: &str,
        number: u32,
    ) -> Result<Self> {
        let key = match category {
            VarCategory::Well => Self::well(keyword, name),
            VarCategory::Group => Self::group(keyword, name),
            VarCategory::Region => Self::region(keyword, number),
            VarCategory::Field => Self::field(keyword),
            VarCategory::Completion => Self::completion(keyword, name, number),
            VarCategory::Misc => Self::misc(keyword),
        };
        key.validate()?;
        Ok(key)
    }

    /// Returns the category of this key.
    pub fn category(&self) -> VarCategory {
        match self {
            Self::Well { .. } => VarCategory::Well,
            Self::Group { .. } => VarCategory::Group,
            Self::Region { .. } => VarCategory::Region,
            Self::Field { .. } => VarCategory::Field,
            Self::Completion { .. } => VarCategory::Completion,
            Self::Misc { .. } => VarCategory::Misc,
        }
    }

    /// Returns the variable keyword.
    pub fn keyword(&self) -> &str {
        match self {
            Self::Well { keyword, .. }
            | Self::Group { keyword, .. }
            | Self::Region { keyword, .. }
            | Self::Field { keyword }
            | Self::Completion { keyword, .. }
            | Self::Misc { keyword } => keyword,
        }
    }

    /// Returns the entity name (well or group), if the category has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Well { well, .. } | Self::Completion { well, .. } => Some(well),
            Self::Group { group, .. } => Some(group),
            _ => None,
        }
    }

    /// Returns the entity number (region or completion), if the category has one.
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Region { region, .. } => Some(*region),
            Self::Completion { completion, .. } => Some(*completion),
            _ => None,
        }
    }

    /// Checks that keyword and entity name are usable in every codec.
    pub fn validate(&self) -> Result<()> {
        validate_name(self.keyword())?;
        if let Some(name) = self.name() {
            validate_name(name)?;
        }
        Ok(())
    }
}

/// Checks an entity name or keyword: non-empty, no whitespace, no `:`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SummaryError::InvalidKey("empty name".to_string()));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == KEY_SEPARATOR)
    {
        return Err(SummaryError::InvalidKey(format!("{name:?}")));
    }
    Ok(())
}

/// Checks free text stored next to keys, such as units and case names.
///
/// Empty text is allowed; control characters are not.
pub fn validate_text(what: &str, text: &str) -> Result<()> {
    if text.chars().any(char::is_control) {
        return Err(SummaryError::InvalidKey(format!("{what} {text:?}")));
    }
    Ok(())
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Well { keyword, well } => write!(f, "{keyword}:{well}"),
            Self::Group { keyword, group } => write!(f, "{keyword}:{group}"),
            Self::Region { keyword, region } => write!(f, "{keyword}:{region}"),
            Self::Field { keyword } | Self::Misc { keyword } => f.write_str(keyword),
            Self::Completion {
                keyword,
                well,
                completion,
            } => write!(f, "{keyword}:{well}:{completion}"),
        }
    }
}

impl FromStr for VarKey {
    type Err = SummaryError;

    /// Parses a general key such as `WOPR:W1` or `COPR:W1:5`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SummaryError::InvalidKey(s.to_string());
        let parts: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let keyword = parts[0];
        let parse_number = |text: &str| text.parse::<u32>().map_err(|_| invalid());

        let key = match (VarCategory::from_keyword(keyword), parts.as_slice()) {
            (VarCategory::Well, [_, well]) => Self::well(keyword, *well),
            (VarCategory::Group, [_, group]) => Self::group(keyword, *group),
            (VarCategory::Region, [_, region]) => Self::region(keyword, parse_number(region)?),
            (VarCategory::Field, [_]) => Self::field(keyword),
            (VarCategory::Completion, [_, well, completion]) => {
                Self::completion(keyword, *well, parse_number(completion)?)
            }
            (VarCategory::Misc, [_]) => Self::misc(keyword),
            _ => return Err(invalid()),
        };
        key.validate().map_err(|_| invalid())?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_keyword() {
        assert_eq!(VarCategory::from_keyword("WOPR"), VarCategory::Well);
        assert_eq!(VarCategory::from_keyword("GGPT"), VarCategory::Group);
        assert_eq!(VarCategory::from_keyword("RPR"), VarCategory::Region);
        assert_eq!(VarCategory::from_keyword("FOPT"), VarCategory::Field);
        assert_eq!(VarCategory::from_keyword("COPR"), VarCategory::Completion);
        assert_eq!(VarCategory::from_keyword("TIME"), VarCategory::Misc);
        assert_eq!(VarCategory::from_keyword(""), VarCategory::Misc);
    }

    #[test]
    fn test_category_tags_roundtrip() {
        for value in 0..6u8 {
            let category = VarCategory::from_u8(value).unwrap();
            assert_eq!(category as u8, value);
            assert_eq!(VarCategory::from_tag(category.tag()), Some(category));
        }
        assert_eq!(VarCategory::from_u8(6), None);
        assert_eq!(VarCategory::from_tag("WELLS"), None);
    }

    #[test]
    fn test_general_key_display() {
        assert_eq!(VarKey::well("WOPR", "W1").to_string(), "WOPR:W1");
        assert_eq!(VarKey::region("RPR", 3).to_string(), "RPR:3");
        assert_eq!(VarKey::field("FOPT").to_string(), "FOPT");
        assert_eq!(
            VarKey::completion("COPR", "W1", 5).to_string(),
            "COPR:W1:5"
        );
    }

    #[test]
    fn test_general_key_parse() {
        assert_eq!("WOPR:W1".parse::<VarKey>().unwrap(), VarKey::well("WOPR", "W1"));
        assert_eq!("GOPT:G1".parse::<VarKey>().unwrap(), VarKey::group("GOPT", "G1"));
        assert_eq!("RPR:12".parse::<VarKey>().unwrap(), VarKey::region("RPR", 12));
        assert_eq!("FOPT".parse::<VarKey>().unwrap(), VarKey::field("FOPT"));
        assert_eq!(
            "COPR:OP_1:2".parse::<VarKey>().unwrap(),
            VarKey::completion("COPR", "OP_1", 2)
        );
        assert_eq!("TIME".parse::<VarKey>().unwrap(), VarKey::misc("TIME"));
    }

    #[test]
    fn test_general_key_parse_rejects_malformed() {
        for text in ["WOPR", "WOPR:W1:2", "RPR:x", "FOPT:W1", "COPR:W1", ":W1", "WOPR:", ""] {
            let err = text.parse::<VarKey>().unwrap_err();
            assert!(matches!(err, SummaryError::InvalidKey(_)), "{text}");
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("OP_1").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("OP 1").is_err());
        assert!(validate_name("OP\t1").is_err());
        assert!(validate_name("OP:1").is_err());
    }

    #[test]
    fn test_key_accessors() {
        let key = VarKey::completion("CWIR", "I1", 4);
        assert_eq!(key.category(), VarCategory::Completion);
        assert_eq!(key.keyword(), "CWIR");
        assert_eq!(key.name(), Some("I1"));
        assert_eq!(key.number(), Some(4));

        let key = VarKey::field("FWCT");
        assert_eq!(key.name(), None);
        assert_eq!(key.number(), None);
    }
}
