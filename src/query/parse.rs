//! Parser for path expressions

use crate::error::ConfError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(String),
    /// `*`
    AnyElement,
    /// `node()`
    AnyNode,
    /// `text()`
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    HasAttr(String),
    AttrEq(String, String),
    /// 1-based position within the step's matches for one context item
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// Split on `/` outside brackets and quotes
fn split_top_level<'e>(expr: &'e str) -> Result<Vec<&'e str>, ConfError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in expr.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' => depth += 1,
            ']' => {
                if depth == 0 {
                    return Err(ConfError::invalid_path(expr, "unbalanced ']'"));
                }
                depth -= 1;
            }
            '/' if depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(ConfError::invalid_path(expr, "unterminated string literal"));
    }
    if depth != 0 {
        return Err(ConfError::invalid_path(expr, "unbalanced '['"));
    }
    parts.push(&expr[start..]);
    Ok(parts)
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

fn parse_axis(expr: &str, name: &str) -> Result<Axis, ConfError> {
    Ok(match name {
        "child" => Axis::Child,
        "descendant" => Axis::Descendant,
        "descendant-or-self" => Axis::DescendantOrSelf,
        "self" => Axis::SelfAxis,
        "parent" => Axis::Parent,
        "ancestor" => Axis::Ancestor,
        "ancestor-or-self" => Axis::AncestorOrSelf,
        "attribute" => Axis::Attribute,
        other => {
            return Err(ConfError::invalid_path(
                expr,
                format!("unsupported axis '{}'", other),
            ))
        }
    })
}

fn parse_test(expr: &str, test: &str) -> Result<NodeTest, ConfError> {
    match test {
        "*" => Ok(NodeTest::AnyElement),
        "node()" => Ok(NodeTest::AnyNode),
        "text()" => Ok(NodeTest::Text),
        name if is_name(name) => Ok(NodeTest::Name(name.to_string())),
        other => Err(ConfError::invalid_path(
            expr,
            format!("bad node test '{}'", other),
        )),
    }
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn parse_predicate(expr: &str, inner: &str) -> Result<Predicate, ConfError> {
    let inner = inner.trim();
    if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
        let position: usize = inner
            .parse()
            .map_err(|_| ConfError::invalid_path(expr, "position out of range"))?;
        if position == 0 {
            return Err(ConfError::invalid_path(expr, "positions start at 1"));
        }
        return Ok(Predicate::Position(position));
    }
    if let Some(rest) = inner.strip_prefix('@') {
        return match rest.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                let value = unquote(value)
                    .ok_or_else(|| ConfError::invalid_path(expr, "attribute value must be quoted"))?;
                if !is_name(key) {
                    return Err(ConfError::invalid_path(expr, "bad attribute name"));
                }
                Ok(Predicate::AttrEq(key.to_string(), value.to_string()))
            }
            None if is_name(rest.trim()) => Ok(Predicate::HasAttr(rest.trim().to_string())),
            None => Err(ConfError::invalid_path(expr, "bad attribute name")),
        };
    }
    Err(ConfError::invalid_path(
        expr,
        format!("unsupported predicate '[{}]'", inner),
    ))
}

fn parse_step(expr: &str, raw: &str) -> Result<Step, ConfError> {
    let raw = raw.trim();
    let (head, mut rest) = match raw.find('[') {
        Some(i) => (raw[..i].trim(), &raw[i..]),
        None => (raw, ""),
    };

    let (axis, test) = match head {
        "." => (Axis::SelfAxis, NodeTest::AnyNode),
        ".." => (Axis::Parent, NodeTest::AnyNode),
        _ => {
            if let Some(name) = head.strip_prefix('@') {
                (Axis::Attribute, parse_test(expr, name)?)
            } else if let Some((axis, test)) = head.split_once("::") {
                (parse_axis(expr, axis.trim())?, parse_test(expr, test.trim())?)
            } else {
                (Axis::Child, parse_test(expr, head)?)
            }
        }
    };

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(ConfError::invalid_path(expr, "junk after predicate"));
        }
        let mut quote: Option<char> = None;
        let mut close = None;
        for (i, ch) in rest.char_indices().skip(1) {
            match quote {
                Some(q) if ch == q => quote = None,
                Some(_) => {}
                None if ch == '\'' || ch == '"' => quote = Some(ch),
                None if ch == ']' => {
                    close = Some(i);
                    break;
                }
                None => {}
            }
        }
        let close = close.ok_or_else(|| ConfError::invalid_path(expr, "unbalanced '['"))?;
        predicates.push(parse_predicate(expr, &rest[1..close])?);
        rest = rest[close + 1..].trim_start();
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

impl PathExpr {
    pub fn parse(expr: &str) -> Result<Self, ConfError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(ConfError::invalid_path(expr, "empty expression"));
        }
        let parts = split_top_level(trimmed)?;
        let absolute = trimmed.starts_with('/');
        let body = if absolute { &parts[1..] } else { &parts[..] };

        if absolute && body.len() == 1 && body[0].is_empty() {
            return Ok(Self {
                absolute,
                steps: Vec::new(),
            });
        }

        let mut steps = Vec::new();
        for (i, part) in body.iter().enumerate() {
            if part.trim().is_empty() {
                if i + 1 == body.len() {
                    return Err(ConfError::invalid_path(expr, "trailing '/'"));
                }
                steps.push(Step::descendant_or_self());
                continue;
            }
            steps.push(parse_step(expr, part)?);
        }
        Ok(Self { absolute, steps })
    }
}
