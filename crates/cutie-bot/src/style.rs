//! Embed templates and rendering.
//!
//! Each card is a JSON embed template with `{placeholder}` markers.  A
//! template found in the styles directory overrides the copy compiled into
//! the binary, so the look can change without a rebuild.  Templates are
//! parsed and checked once at startup; rendering itself cannot fail.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::commands::{Caller, RankedEntry, Target};
use crate::professions::ProfessionPost;

/// Red used for error cards.
const ERROR_COLOR: u32 = 0xE7_4C_3C;
const NOTICE_COLOR: u32 = 0xFF_69_B4;

/// Discord rejects embed fields with an empty value.
const EMPTY_FIELD: &str = "-";

const POINTS_GIVEN: (&str, &str) = ("points_given.json", include_str!("../styles/points_given.json"));
const POINT_VIEW: (&str, &str) = ("point_view.json", include_str!("../styles/point_view.json"));
const LEADERBOARD: (&str, &str) = ("leaderboard.json", include_str!("../styles/leaderboard.json"));
const PROFESSIONS: (&str, &str) = ("professions.json", include_str!("../styles/professions.json"));

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Failed to read style {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Style {name} is not a valid embed: {source}")]
    Parse {
        name: String,
        source: serde_json::Error,
    },

    #[error("Style {name} is unusable: {reason}")]
    Invalid { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Embed
// ---------------------------------------------------------------------------

/// A message embed.  Keys the bot does not touch (footer, thumbnail, ...)
/// are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl Embed {
    /// The generic failure card.  Never carries internal error detail.
    pub fn error(message: &str) -> Self {
        Self {
            title: Some("Error".to_string()),
            description: Some(message.to_string()),
            color: Some(ERROR_COLOR),
            ..Self::default()
        }
    }

    /// A plain informational card.
    pub fn notice(message: &str) -> Self {
        Self {
            description: Some(message.to_string()),
            color: Some(NOTICE_COLOR),
            ..Self::default()
        }
    }

    fn with_author(mut self, caller: &Caller) -> Self {
        self.author = Some(EmbedAuthor {
            name: caller.display_name.clone(),
            icon_url: Some(caller.avatar_url.clone()),
        });
        self
    }

    fn fill(mut self, vars: &[(&str, &str)]) -> Self {
        self.title = self.title.map(|t| substitute(&t, vars));
        self.description = self.description.map(|d| substitute(&d, vars));
        for field in &mut self.fields {
            field.value = substitute(&field.value, vars);
        }
        self
    }
}

/// Replace each `{key}` in one left-to-right pass.  Substituted values are
/// never scanned again, so user text that looks like a placeholder stays
/// literal.  Unknown keys are left as written.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let known = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match known {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// StyleBook
// ---------------------------------------------------------------------------

/// The set of card templates the bot renders replies with.
#[derive(Debug, Clone)]
pub struct StyleBook {
    points_given: Embed,
    point_view: Embed,
    leaderboard: Embed,
    profession: Embed,
}

impl StyleBook {
    /// Templates compiled into the binary.
    pub fn builtin() -> Result<Self, StyleError> {
        Self::from_sources(|(name, builtin)| parse(name, builtin))
    }

    /// Templates from `dir`, falling back to the built-in copy for any file
    /// that is not there.
    pub fn load(dir: &Path) -> Result<Self, StyleError> {
        Self::from_sources(|(name, builtin)| {
            let path = dir.join(name);
            if !path.is_file() {
                return parse(name, builtin);
            }

            info!(path = %path.display(), "using style override");
            let raw = std::fs::read_to_string(&path).map_err(|source| StyleError::Io {
                path: path.clone(),
                source,
            })?;
            parse(name, &raw)
        })
    }

    fn from_sources<F>(mut source: F) -> Result<Self, StyleError>
    where
        F: FnMut((&str, &str)) -> Result<Embed, StyleError>,
    {
        let book = Self {
            points_given: source(POINTS_GIVEN)?,
            point_view: source(POINT_VIEW)?,
            leaderboard: source(LEADERBOARD)?,
            profession: source(PROFESSIONS)?,
        };

        require_fields(LEADERBOARD.0, &book.leaderboard, 3)?;
        require_fields(PROFESSIONS.0, &book.profession, 2)?;

        Ok(book)
    }

    pub fn given(&self, author: &Caller, target: &Target, points: i64) -> Embed {
        let points = points.to_string();
        self.points_given
            .clone()
            .fill(&[("points", points.as_str()), ("target", target.display_name.as_str())])
            .with_author(author)
    }

    pub fn points(&self, author: &Caller, points: i64) -> Embed {
        let points = points.to_string();
        self.point_view
            .clone()
            .fill(&[("points", points.as_str())])
            .with_author(author)
    }

    /// Fields 0, 1 and 2 of the template receive the rank, name and points
    /// columns, one row per line.
    pub fn leaderboard(&self, author: &Caller, entries: &[RankedEntry]) -> Embed {
        let mut embed = self.leaderboard.clone().with_author(author);

        let ranks: Vec<String> = entries.iter().map(|e| e.rank.to_string()).collect();
        let names: Vec<&str> = entries.iter().map(|e| e.display_name.as_str()).collect();
        let points: Vec<String> = entries.iter().map(|e| e.points.to_string()).collect();

        embed.fields[0].value.push_str(&ranks.join("\n"));
        embed.fields[1].value.push_str(&names.join("\n"));
        embed.fields[2].value.push_str(&points.join("\n"));

        for field in &mut embed.fields {
            if field.value.trim().is_empty() {
                field.value = EMPTY_FIELD.to_string();
            }
        }
        embed
    }

    pub fn profession(&self, author: &Caller, post: &ProfessionPost) -> Embed {
        self.profession
            .clone()
            .fill(&[
                ("service_name", post.name.as_str()),
                ("service_description", post.description.as_str()),
                ("service_requirements", post.requirements.as_str()),
            ])
            .with_author(author)
    }
}

fn parse(name: &str, raw: &str) -> Result<Embed, StyleError> {
    serde_json::from_str(raw).map_err(|source| StyleError::Parse {
        name: name.to_string(),
        source,
    })
}

fn require_fields(name: &str, embed: &Embed, count: usize) -> Result<(), StyleError> {
    if embed.fields.len() < count {
        return Err(StyleError::Invalid {
            name: name.to_string(),
            reason: format!("needs at least {count} fields, has {}", embed.fields.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutie_store::ExternalId;

    fn author() -> Caller {
        Caller {
            external_id: ExternalId(111),
            display_name: "Alice".into(),
            username: "alice".into(),
            avatar_url: "https://cdn.example/a.png".into(),
            roles: vec![],
        }
    }

    #[test]
    fn builtin_templates_parse() {
        StyleBook::builtin().expect("built-in styles are valid");
    }

    #[test]
    fn points_card_substitutes_and_sets_author() {
        let book = StyleBook::builtin().unwrap();
        let embed = book.points(&author(), 25);

        assert!(embed.description.as_deref().unwrap().contains("**25**"));
        let author = embed.author.unwrap();
        assert_eq!(author.name, "Alice");
        assert_eq!(author.icon_url.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn given_card_names_target() {
        let book = StyleBook::builtin().unwrap();
        let target = Target {
            external_id: ExternalId(2),
            display_name: "Bob".into(),
            username: "bob".into(),
        };

        let description = book.given(&author(), &target, -4).description.unwrap();
        assert!(description.contains("Bob"));
        assert!(description.contains("-4"));
        assert!(!description.contains('{'));
    }

    #[test]
    fn leaderboard_columns() {
        let book = StyleBook::builtin().unwrap();
        let entries = vec![
            RankedEntry {
                rank: 1,
                display_name: "Alice".into(),
                points: 90,
            },
            RankedEntry {
                rank: 2,
                display_name: "Bob".into(),
                points: 10,
            },
        ];

        let embed = book.leaderboard(&author(), &entries);
        assert_eq!(embed.fields[0].value, "1\n2");
        assert_eq!(embed.fields[1].value, "Alice\nBob");
        assert_eq!(embed.fields[2].value, "90\n10");
    }

    #[test]
    fn empty_leaderboard_has_placeholder_values() {
        let book = StyleBook::builtin().unwrap();
        let embed = book.leaderboard(&author(), &[]);

        assert!(embed.fields.iter().all(|f| f.value == EMPTY_FIELD));
    }

    #[test]
    fn unknown_keys_survive_rendering() {
        let book = StyleBook::builtin().unwrap();
        let value = serde_json::to_value(book.given(
            &author(),
            &Target {
                external_id: ExternalId(2),
                display_name: "Bob".into(),
                username: "bob".into(),
            },
            1,
        ))
        .unwrap();

        assert_eq!(value["footer"]["text"], "owo");
    }

    #[test]
    fn directory_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("point_view.json"),
            r#"{ "description": "points: {points}" }"#,
        )
        .unwrap();

        let book = StyleBook::load(dir.path()).unwrap();
        assert_eq!(
            book.points(&author(), 3).description.as_deref(),
            Some("points: 3")
        );
        // untouched files fall back to the built-in copy
        assert!(book.leaderboard(&author(), &[]).fields.len() >= 3);
    }

    #[test]
    fn broken_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leaderboard.json"), r#"{ "fields": [] }"#).unwrap();
        assert!(matches!(
            StyleBook::load(dir.path()),
            Err(StyleError::Invalid { .. })
        ));

        std::fs::write(dir.path().join("leaderboard.json"), "not json").unwrap();
        assert!(matches!(
            StyleBook::load(dir.path()),
            Err(StyleError::Parse { .. })
        ));
    }

    #[test]
    fn substitution_is_single_pass() {
        let vars = [("a", "{b}"), ("b", "secret")];
        assert_eq!(substitute("{a} and {b}", &vars), "{b} and secret");
        assert_eq!(substitute("{unknown} {a", &vars), "{unknown} {a");
        assert_eq!(substitute("{{b}}", &vars), "{secret}");
    }

    #[test]
    fn profession_text_is_not_reinterpreted() {
        let book = StyleBook::builtin().unwrap();
        let post = ProfessionPost {
            name: "{service_requirements}".into(),
            description: "my {service_requirements} text".into(),
            requirements: "SECRET".into(),
        };

        let embed = book.profession(&author(), &post);
        assert_eq!(
            embed.description.as_deref(),
            Some("**{service_requirements}**")
        );
        assert_eq!(embed.fields[0].value, "my {service_requirements} text");
        assert_eq!(embed.fields[1].value, "SECRET");
    }

    #[test]
    fn error_card() {
        let embed = Embed::error("Failed to give cute points");
        assert_eq!(embed.title.as_deref(), Some("Error"));
        assert_eq!(embed.color, Some(ERROR_COLOR));
    }
}
