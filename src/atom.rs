use std::fmt::{self, Write};
use std::io;
use std::str::FromStr;
use std::sync::Arc;

const HASH_TAG_STR: u64 = 0x01;
const HASH_TAG_INT: u64 = 0x02;
const HASH_TAG_LABEL: u64 = 0x03;

/// One slot of a composite feature key
///
/// Atoms are compared and hashed by value, so two keys built from separately
/// allocated but equal strings index the same feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    /// A string such as a template name or a word form
    Str(Arc<str>),
    /// An integer such as a relative position or a category id
    Int(i64),
    /// An opaque label token
    Label(u32),
}

impl Atom {
    /// Create a label atom
    pub fn label(id: u32) -> Self {
        Atom::Label(id)
    }

    /// Deterministic hash of this atom.
    ///
    /// Unlike `std::hash::Hash` with a randomized hasher, this value is stable
    /// across processes, which lets composite key hashes be persisted with the
    /// indexer and reused on reload.
    pub(crate) fn stable_hash(&self) -> u64 {
        match self {
            Atom::Str(s) => s.bytes().fold(HASH_TAG_STR, |h, b| {
                h.wrapping_mul(31).wrapping_add(u64::from(b))
            }),
            Atom::Int(v) => mix(HASH_TAG_INT, *v as u64),
            Atom::Label(l) => mix(HASH_TAG_LABEL, u64::from(*l)),
        }
    }
}

#[inline]
fn mix(tag: u64, value: u64) -> u64 {
    (value ^ (value >> 32)).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ tag
}

/// Escape character of string atoms in their display form
const ESCAPE: char = '\\';

fn write_escaped_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // An integer-looking string would read back as `Atom::Int`
    if s.parse::<i64>().is_ok() {
        f.write_char(ESCAPE)?;
    }
    if !s.contains([ESCAPE, '#']) {
        return f.write_str(s);
    }
    for c in s.chars() {
        if c == ESCAPE || c == '#' {
            f.write_char(ESCAPE)?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

/// Display form of an atom.
///
/// Strings print verbatim unless they contain `\` or `#`, which get a
/// leading `\`, or look like an integer, which gets a leading `\` as a
/// whole. The form parses back into the same atom, and never contains `##`.
impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Str(s) => write_escaped_str(f, s),
            Atom::Int(v) => write!(f, "{}", v),
            Atom::Label(l) => write!(f, "#{}", l),
        }
    }
}

impl FromStr for Atom {
    type Err = io::Error;

    /// Parse the display form of an atom
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Atom::Int(v));
        }
        if let Some(l) = s.strip_prefix('#').and_then(|n| n.parse().ok()) {
            return Ok(Atom::Label(l));
        }
        if !s.contains(ESCAPE) {
            return Ok(Atom::from(s));
        }
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == ESCAPE {
                let escaped = chars.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "dangling escape in atom")
                })?;
                out.push(escaped);
            } else {
                out.push(c);
            }
        }
        Ok(Atom::from(out))
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Str(Arc::from(s))
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Atom {
    fn from(s: Arc<str>) -> Self {
        Atom::Str(s)
    }
}

impl From<i32> for Atom {
    fn from(v: i32) -> Self {
        Atom::Int(i64::from(v))
    }
}

impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Atom::Int(v)
    }
}

impl From<u32> for Atom {
    fn from(v: u32) -> Self {
        Atom::Int(i64::from(v))
    }
}

impl From<usize> for Atom {
    fn from(v: usize) -> Self {
        Atom::Int(v as i64)
    }
}
