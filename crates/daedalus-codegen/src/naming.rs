//! Unit naming scheme.
//!
//! A handler unit is named after the method it dispatches to:
//!
//! ```text
//! <owner>$<VERB><pattern>[$<param>]*
//! ```
//!
//! The pattern is transliterated token by token. Letters and digits are kept
//! as they are; every other character becomes an escape token starting with
//! `_`:
//!
//! | Char | Token |
//! |------|-------|
//! | `/` | `_s` |
//! | `{` | `_o` |
//! | `}` | `_c` |
//! | `_` | `_u` |
//! | `-` | `_d` |
//! | `.` | `_p` |
//! | `*` | `_w` |
//! | `:` | `_k` |
//! | other | `_x<hex code point>_` |
//!
//! The owner and parameter names use the same tokens for characters outside
//! `[A-Za-z0-9.]`, so none of the parts can contain a raw `$`. Because the
//! token set is prefix-free the rendering can be parsed back, which makes it
//! injective: two methods share a unit name only when owner, verb, pattern
//! and parameter names are all identical.
//!
//! ```
//! use daedalus_codegen::naming::UnitKey;
//! use daedalus_model::HttpVerb;
//!
//! let key = UnitKey::new("app.PetController", HttpVerb::Get, "/pets/{id}", ["id"]);
//! assert_eq!(key.to_string(), "app.PetController$GET_spets_s_oid_c$id");
//! assert_eq!(UnitKey::parse(&key.to_string()), Some(key));
//! ```

use std::fmt::{self, Write as _};

use daedalus_model::{HttpVerb, MethodDescriptor};

/// Suffix appended to a controller name to form its registration unit name.
pub const ROUTES_SUFFIX: &str = "$Routes";

/// Structured identity of a handler unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    /// Controller type name.
    pub owner: String,
    /// HTTP verb.
    pub verb: HttpVerb,
    /// Normalized path pattern.
    pub pattern: String,
    /// Parameter names in declaration order.
    pub params: Vec<String>,
}

impl UnitKey {
    /// Creates a key.
    pub fn new<I, S>(
        owner: impl Into<String>,
        verb: HttpVerb,
        pattern: impl Into<String>,
        params: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            verb,
            pattern: pattern.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// The key of the handler unit for `method`.
    #[must_use]
    pub fn for_method(method: &MethodDescriptor) -> Self {
        Self::new(
            method.owner.clone(),
            method.verb,
            method.pattern.clone(),
            method.param_names(),
        )
    }

    /// Renders the unit name.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Parses a rendered unit name.
    ///
    /// Returns `None` if `name` is not the rendering of any key.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('$');
        let owner = unescape(parts.next()?, true)?;
        let route = parts.next()?;
        let (verb, pattern) = HttpVerb::ALL.into_iter().find_map(|verb| {
            route
                .strip_prefix(verb.as_str())
                .and_then(|rest| unescape(rest, false))
                .map(|pattern| (verb, pattern))
        })?;
        let params = parts
            .map(|p| unescape(p, true))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            owner,
            verb,
            pattern,
            params,
        })
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(self.owner.len() + self.pattern.len() * 2 + 8);
        escape_into(&mut out, &self.owner, true);
        out.push('$');
        out.push_str(self.verb.as_str());
        escape_into(&mut out, &self.pattern, false);
        for param in &self.params {
            out.push('$');
            escape_into(&mut out, param, true);
        }
        f.write_str(&out)
    }
}

/// The handler unit name for `method`.
#[must_use]
pub fn handler_name(method: &MethodDescriptor) -> String {
    UnitKey::for_method(method).render()
}

/// The registration unit name for `controller`.
#[must_use]
pub fn registration_name(controller: &str) -> String {
    let mut out = String::with_capacity(controller.len() + ROUTES_SUFFIX.len());
    escape_into(&mut out, controller, true);
    out.push_str(ROUTES_SUFFIX);
    out
}

fn token(ch: char) -> Option<char> {
    Some(match ch {
        '/' => 's',
        '{' => 'o',
        '}' => 'c',
        '_' => 'u',
        '-' => 'd',
        '.' => 'p',
        '*' => 'w',
        ':' => 'k',
        _ => return None,
    })
}

fn from_token(tag: char) -> Option<char> {
    Some(match tag {
        's' => '/',
        'o' => '{',
        'c' => '}',
        'u' => '_',
        'd' => '-',
        'p' => '.',
        'w' => '*',
        'k' => ':',
        _ => return None,
    })
}

fn escape_into(out: &mut String, input: &str, keep_dots: bool) {
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || (keep_dots && ch == '.') {
            out.push(ch);
        } else if let Some(tag) = token(ch) {
            out.push('_');
            out.push(tag);
        } else {
            let _ = write!(out, "_x{:x}_", u32::from(ch));
        }
    }
}

fn unescape(input: &str, keep_dots: bool) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_alphanumeric() || (keep_dots && ch == '.') {
            out.push(ch);
            continue;
        }
        if ch != '_' {
            return None;
        }
        let tag = chars.next()?;
        if tag == 'x' {
            let mut hex = String::new();
            loop {
                match chars.next()? {
                    '_' => break,
                    c => hex.push(c),
                }
            }
            let decoded = char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?;
            // Reject non-canonical spellings so parsing stays the inverse of
            // rendering.
            if decoded.is_ascii_alphanumeric()
                || token(decoded).is_some()
                || (keep_dots && decoded == '.')
                || hex != format!("{:x}", u32::from(decoded))
            {
                return None;
            }
            out.push(decoded);
        } else {
            let decoded = from_token(tag)?;
            if keep_dots && decoded == '.' {
                return None;
            }
            out.push(decoded);
        }
    }
    Some(out)
}
