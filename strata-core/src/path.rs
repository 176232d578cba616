// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain-qualified virtual paths
//!
//! A path string has the shape `[domain:]path`. The domain is everything up to
//! and including the *last* colon anywhere in the string, so `"fo::o :bar:xxx"`
//! has domain `"fo::o :bar:"`. The remainder uses `/` as its only separator.
//! Nothing is escaped or normalized: `.` and `..` are ordinary names.
//!
//! All parts are views into the single backing string. They are located by one
//! reverse scan the first time any of them is requested.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Div;
use std::str::FromStr;
use std::sync::OnceLock;

/// Selects one of the views [`Path::part`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    /// Everything up to and including the last `:`, or empty
    Domain,
    /// Everything after the domain
    Path,
    /// The path up to and including its last `/`
    Parents,
    /// The path after its last `/`
    Filename,
    /// The filename without its extension
    Stem,
    /// From the last `.` of the filename to the end, or empty
    Extension,
}

/// Byte offsets of the parts inside the backing string.
///
/// `colon`, `slash` and `dot` are ASCII, so every offset is a char boundary.
#[derive(Debug, Clone, Copy, Default)]
struct Spans {
    path_begin: usize,
    filename_begin: usize,
    ext_begin: usize,
    absolute: bool,
}

impl Spans {
    fn parse(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut colon = None;
        let mut slash = None;
        let mut dot = None;
        let mut found = 0;

        for (i, &b) in bytes.iter().enumerate().rev() {
            match b {
                b':' if colon.is_none() => {
                    colon = Some(i);
                    found += 1;
                }
                b'/' if slash.is_none() => {
                    slash = Some(i);
                    found += 1;
                }
                b'.' if dot.is_none() => {
                    dot = Some(i);
                    found += 1;
                }
                _ => {}
            }
            if found == 3 {
                break;
            }
        }

        let path_begin = colon.map_or(0, |c| c + 1);
        // A slash inside the domain does not start the filename.
        let filename_begin = slash.map_or(path_begin, |s| (s + 1).max(path_begin));
        let ext_begin = match dot {
            Some(d) if d >= filename_begin => d,
            _ => bytes.len(),
        };

        Self {
            path_begin,
            filename_begin,
            ext_begin,
            absolute: bytes.get(path_begin) == Some(&b'/'),
        }
    }
}

/// Virtual path addressing a file inside some backend's domain
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path {
    inner: String,
    spans: OnceLock<Spans>,
    hash: OnceLock<u64>,
}

impl Path {
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            inner: s.into(),
            spans: OnceLock::new(),
            hash: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn into_string(self) -> String {
        self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn spans(&self) -> Spans {
        *self.spans.get_or_init(|| Spans::parse(&self.inner))
    }

    pub fn part(&self, part: Part) -> &str {
        let sp = self.spans();
        let s = self.inner.as_str();
        match part {
            Part::Domain => &s[..sp.path_begin],
            Part::Path => &s[sp.path_begin..],
            Part::Parents => &s[sp.path_begin..sp.filename_begin],
            Part::Filename => &s[sp.filename_begin..],
            Part::Stem => &s[sp.filename_begin..sp.ext_begin],
            Part::Extension => &s[sp.ext_begin..],
        }
    }

    pub fn domain(&self) -> &str {
        self.part(Part::Domain)
    }

    pub fn path(&self) -> &str {
        self.part(Part::Path)
    }

    pub fn parents(&self) -> &str {
        self.part(Part::Parents)
    }

    pub fn filename(&self) -> &str {
        self.part(Part::Filename)
    }

    pub fn stem(&self) -> &str {
        self.part(Part::Stem)
    }

    pub fn extension(&self) -> &str {
        self.part(Part::Extension)
    }

    pub fn is_absolute(&self) -> bool {
        self.spans().absolute
    }

    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// The same path with the domain stripped off.
    pub fn without_domain(&self) -> Path {
        Path::new(self.path())
    }

    /// The path one segment up, keeping the domain.
    ///
    /// The trailing slash of [`Path::parents`] is dropped unless it is the
    /// only character, so an absolute path bottoms out at `domain:/` and a
    /// relative one at `domain:`. Both are fixed points.
    pub fn parent_path(&self) -> Path {
        let mut parents = self.parents();
        if !parents.is_empty() && parents != "/" {
            parents = &parents[..parents.len() - 1];
        }
        Path::new(format!("{}{}", self.domain(), parents))
    }

    /// Appends `other` to this path.
    ///
    /// The domain of `other` is ignored. Exactly one `/` ends up between the
    /// two sides, unless one of them is empty.
    pub fn join(&self, other: &Path) -> Path {
        let lp = self.path();
        let rp = other.path();
        if rp.is_empty() {
            return self.clone();
        }
        if lp.is_empty() {
            return Path::new(format!("{}{}", self.domain(), rp));
        }
        match (lp.ends_with('/'), rp.starts_with('/')) {
            (true, true) => Path::new(format!("{}{}", self.inner, &rp[1..])),
            (false, false) => Path::new(format!("{}/{}", self.inner, rp)),
            _ => Path::new(format!("{}{}", self.inner, rp)),
        }
    }

    /// 64-bit hash of the full string, computed once.
    pub fn hash_value(&self) -> u64 {
        *self.hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.inner.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Path {}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.cmp(&other.inner)
    }
}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Path").field(&self.inner).finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::new(s)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::new(s)
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Self {
        p.clone()
    }
}

impl From<Path> for String {
    fn from(p: Path) -> Self {
        p.inner
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::new(s))
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl Div<&Path> for &Path {
    type Output = Path;

    fn div(self, rhs: &Path) -> Path {
        self.join(rhs)
    }
}

impl Div<Path> for Path {
    type Output = Path;

    fn div(self, rhs: Path) -> Path {
        self.join(&rhs)
    }
}

impl Div<&str> for &Path {
    type Output = Path;

    fn div(self, rhs: &str) -> Path {
        self.join(&Path::new(rhs))
    }
}

impl Div<&str> for Path {
    type Output = Path;

    fn div(self, rhs: &str) -> Path {
        self.join(&Path::new(rhs))
    }
}
