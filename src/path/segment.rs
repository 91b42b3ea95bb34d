/// One dotted segment of a walkable path: a property name and optional index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Parse `name` or `name[n]`.
    ///
    /// Malformed or negative indexes leave the whole text as the name, which then
    /// fails property resolution instead of silently addressing slot 0.
    pub fn parse(part: &str) -> Self {
        let Some(open) = part.find('[') else {
            return Self::new(part, None);
        };
        if !part.ends_with(']') || open == 0 {
            return Self::new(part, None);
        }

        let digits = &part[open + 1..part.len() - 1];
        match digits.parse::<usize>() {
            Ok(index) if !digits.is_empty() => Self::new(&part[..open], Some(index)),
            _ => Self::new(part, None),
        }
    }
}

/// Split a walkable path on `.` into segments
pub fn split_path(path: &str) -> Vec<PathSegment> {
    path.split('.').map(PathSegment::parse).collect()
}

/// Split `a.b.c` into (`Some("a.b")`, `"c"`)
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, terminal)) => (Some(parent), terminal),
        None => (None, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        assert_eq!(PathSegment::parse("gender"), PathSegment::new("gender", None));
        assert_eq!(
            PathSegment::parse("extension[2]"),
            PathSegment::new("extension", Some(2))
        );
        assert_eq!(PathSegment::parse("name[]"), PathSegment::new("name[]", None));
        assert_eq!(PathSegment::parse("name[-1]"), PathSegment::new("name[-1]", None));
        assert_eq!(PathSegment::parse("name[x"), PathSegment::new("name[x", None));
    }

    #[test]
    fn test_split_path() {
        let segments = split_path("Patient.name[1].given");
        assert_eq!(
            segments,
            vec![
                PathSegment::new("Patient", None),
                PathSegment::new("name", Some(1)),
                PathSegment::new("given", None),
            ]
        );
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("a.b.c"), (Some("a.b"), "c"));
        assert_eq!(split_parent("gender"), (None, "gender"));
    }
}
