use std::sync::{Arc, LazyLock};

use papaya::HashMap as PapayaMap;
use regex::Regex;

use crate::error::{NormalizationError, Result};
use crate::model::Node;

static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[([0-9]+)\])?$").expect("valid member pattern")
});
static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\((.*)\)$").expect("valid function pattern"));
static WHERE_ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*'([^']*)'\s*$").expect("valid where pattern")
});

/// Upper bound on cached compiled expressions
const COMPILED_CACHE_CAPACITY: usize = 1024;

/// A node matched by a path expression, with its structural location
#[derive(Debug, Clone)]
pub struct PathMatch<'a> {
    /// e.g. `Patient.name[0].given[1]`
    pub location: String,
    pub node: &'a Node,
}

/// Path-query capability consumed by the executors
pub trait PathEvaluator: Send + Sync {
    /// Check that `path` is well-formed without evaluating it
    fn validate(&self, path: &str) -> Result<()>;

    /// Evaluate `path` against `root`, returning zero or more matches
    fn evaluate<'a>(&self, root: &'a Node, path: &str) -> Result<Vec<PathMatch<'a>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Member { name: String, index: Option<usize> },
    First,
    Last,
    Where { member: String, literal: String },
}

#[derive(Debug)]
struct Expression {
    type_filter: Option<String>,
    steps: Vec<Step>,
}

/// Default evaluator for dotted member paths.
///
/// Grammar: `Type? ('.' member ('[' n ']')? | '.first()' | '.last()' |
/// '.where(member = 'literal')')*`. Member names are case-sensitive and
/// collections flatten across steps. A leading capitalised identifier is a type
/// filter on the root. Compiled expressions are cached by their text, up to a
/// fixed number of entries.
#[derive(Debug, Default)]
pub struct DottedPathEvaluator {
    compiled: PapayaMap<String, Arc<Expression>>,
}

impl DottedPathEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, path: &str) -> Result<Arc<Expression>> {
        let compiled = self.compiled.pin();
        if let Some(expression) = compiled.get(path) {
            return Ok(expression.clone());
        }

        let expression = Arc::new(parse_expression(path)?);
        if compiled.len() < COMPILED_CACHE_CAPACITY {
            compiled.insert(path.to_string(), expression.clone());
        }
        Ok(expression)
    }
}

impl PathEvaluator for DottedPathEvaluator {
    fn validate(&self, path: &str) -> Result<()> {
        self.compile(path).map(|_| ())
    }

    fn evaluate<'a>(&self, root: &'a Node, path: &str) -> Result<Vec<PathMatch<'a>>> {
        let expression = self.compile(path)?;

        if let Some(type_filter) = &expression.type_filter {
            if root.type_name() != type_filter {
                return Ok(Vec::new());
            }
        }

        let mut current = vec![PathMatch {
            location: root.type_name().to_string(),
            node: root,
        }];
        for step in &expression.steps {
            current = apply_step(step, current);
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }
}

fn apply_step<'a>(step: &Step, input: Vec<PathMatch<'a>>) -> Vec<PathMatch<'a>> {
    match step {
        Step::Member { name, index } => {
            let mut output = Vec::new();
            for item in &input {
                let Some((key, child)) = member(item.node, name) else {
                    continue;
                };
                match child {
                    Node::List(items) => {
                        for (i, node) in items.iter().enumerate() {
                            output.push(PathMatch {
                                location: format!("{}.{key}[{i}]", item.location),
                                node,
                            });
                        }
                    }
                    node => output.push(PathMatch {
                        location: format!("{}.{key}", item.location),
                        node,
                    }),
                }
            }
            match index {
                Some(index) if *index < output.len() => vec![output.swap_remove(*index)],
                Some(_) => Vec::new(),
                None => output,
            }
        }
        Step::First => input.into_iter().take(1).collect(),
        Step::Last => input.into_iter().last().into_iter().collect(),
        Step::Where { member: name, literal } => input
            .into_iter()
            .filter(|item| {
                member(item.node, name).is_some_and(|(_, child)| match child {
                    Node::List(items) => items.iter().any(|node| scalar_equals(node, literal)),
                    node => scalar_equals(node, literal),
                })
            })
            .collect(),
    }
}

/// Child of an element by exact name, or a choice child by its serialized
/// name (`valueQuantity` finds a Quantity stored under `value`)
fn member<'a, 'n>(node: &'a Node, name: &'n str) -> Option<(&'n str, &'a Node)> {
    let element = node.as_element()?;
    if let Some(child) = element.get(name) {
        return Some((name, child));
    }

    element.properties().find_map(|(key, child)| {
        let suffix = name.strip_prefix(key)?;
        let child_suffix = match child {
            Node::Primitive(primitive) => primitive.kind.choice_suffix(),
            Node::Element(element) => element.type_name(),
            _ => return None,
        };
        (!suffix.is_empty() && suffix == child_suffix).then_some((name, child))
    })
}

fn scalar_equals(node: &Node, literal: &str) -> bool {
    node.as_scalar()
        .is_some_and(|scalar| scalar.to_invariant_string() == literal)
}

fn parse_expression(path: &str) -> Result<Expression> {
    let text = path.trim();
    if text.is_empty() {
        return Err(NormalizationError::path_syntax(path, "path is empty"));
    }

    let parts = split_top_level(path, text)?;
    let mut parts = parts.into_iter().peekable();

    let mut type_filter = None;
    if let Some(first) = parts.peek() {
        let is_type_name = first.starts_with(|c: char| c.is_ascii_uppercase())
            && first.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_type_name {
            type_filter = Some(first.to_string());
            parts.next();
        }
    }

    let steps = parts
        .map(|part| parse_step(path, part))
        .collect::<Result<Vec<_>>>()?;

    Ok(Expression { type_filter, steps })
}

fn parse_step(path: &str, part: &str) -> Result<Step> {
    if let Some(captures) = MEMBER_RE.captures(part) {
        let index = match captures.get(2) {
            Some(digits) => Some(digits.as_str().parse::<usize>().map_err(|_| {
                NormalizationError::path_syntax(path, format!("index out of range in '{part}'"))
            })?),
            None => None,
        };
        return Ok(Step::Member {
            name: captures[1].to_string(),
            index,
        });
    }

    let Some(captures) = FUNCTION_RE.captures(part) else {
        return Err(NormalizationError::path_syntax(
            path,
            format!("unexpected segment '{part}'"),
        ));
    };
    let args = captures[2].trim();
    match (&captures[1], args.is_empty()) {
        ("first", true) => Ok(Step::First),
        ("last", true) => Ok(Step::Last),
        ("where", false) => {
            let Some(args) = WHERE_ARGS_RE.captures(args) else {
                return Err(NormalizationError::path_syntax(
                    path,
                    "where() expects member = 'literal'",
                ));
            };
            Ok(Step::Where {
                member: args[1].to_string(),
                literal: args[2].to_string(),
            })
        }
        (function, _) => Err(NormalizationError::path_syntax(
            path,
            format!("unsupported function '{function}'"),
        )),
    }
}

/// Split on `.` outside quotes and parentheses
fn split_top_level<'t>(path: &str, text: &'t str) -> Result<Vec<&'t str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    NormalizationError::path_syntax(path, "unbalanced parenthesis")
                })?;
            }
            '.' if !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err(NormalizationError::path_syntax(path, "unterminated string literal"));
    }
    if depth != 0 {
        return Err(NormalizationError::path_syntax(path, "unbalanced parenthesis"));
    }
    parts.push(&text[start..]);

    if parts.iter().any(|part| part.trim().is_empty()) {
        return Err(NormalizationError::path_syntax(path, "empty path segment"));
    }
    Ok(parts.into_iter().map(str::trim).collect())
}
