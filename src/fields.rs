use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Fields filled in locally rather than by a resolution service.
pub const LOCAL_FIELDS: &[&str] = &["count"];

/// An ordered list of field names requested from a service and reported in
/// output rows.
///
/// Names are trimmed and de-duplicated; the first occurrence keeps its
/// position. Ordering matters for CSV columns only.
///
/// ```
/// use chickadee::FieldSpec;
///
/// let spec: FieldSpec = "query, count,as,query".parse().unwrap();
/// assert_eq!(spec.as_slice(), &["query", "count", "as"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSpec {
    fields: Vec<String>,
}

impl FieldSpec {
    /// Build a spec from any list of names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = FieldSpec::default();
        for field in fields {
            spec.push(field.as_ref());
        }
        spec
    }

    /// Parse a comma separated list such as `query,count,as`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Append a field unless it is empty or already present. Returns whether
    /// the field was added.
    pub fn push(&mut self, field: &str) -> bool {
        let field = field.trim();
        if field.is_empty() || self.contains(field) {
            return false;
        }
        self.fields.push(field.to_string());
        true
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The comma separated list sent to a service, without [`LOCAL_FIELDS`].
    pub fn remote_param(&self) -> String {
        self.iter()
            .filter(|f| !LOCAL_FIELDS.contains(f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for FieldSpec {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldSpec::parse(s))
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields.join(","))
    }
}

impl<'a> IntoIterator for &'a FieldSpec {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
