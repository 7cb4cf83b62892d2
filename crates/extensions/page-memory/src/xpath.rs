//! XPath 1.0 subset evaluator.
//!
//! Supports location paths over the common axes (abbreviated and
//! `axis::` syntax), name/`*`/`text()`/`node()` tests, predicates,
//! unions, filter expressions, the `= != < <= > >=` comparisons with
//! node-set semantics, `and`/`or`, `+`/`-` and the core string and
//! node-set functions. Only element results are returned.

use std::collections::HashMap;

use herbie_protocols::PageError;

use crate::dom::{Dom, NodeId};

const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("contains", 2, 2),
    ("starts-with", 2, 2),
    ("normalize-space", 0, 1),
    ("string", 0, 1),
    ("string-length", 0, 1),
    ("concat", 2, usize::MAX),
    ("translate", 3, 3),
    ("not", 1, 1),
    ("boolean", 1, 1),
    ("number", 0, 1),
    ("true", 0, 0),
    ("false", 0, 0),
    ("position", 0, 0),
    ("last", 0, 0),
    ("count", 1, 1),
];

/// Evaluate `expression` against `dom`, relative to `context` or the document.
pub(crate) fn evaluate(dom: &Dom, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>, PageError> {
    let invalid = || PageError::InvalidXPath(expression.to_string());
    let tokens = tokenize(expression).ok_or_else(invalid)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr().ok_or_else(invalid)?;
    if parser.pos != parser.tokens.len() {
        return Err(invalid());
    }

    let evaluator = Evaluator::new(dom);
    let ctx = Ctx {
        item: Item::Node(context.unwrap_or(Dom::ROOT)),
        position: 1,
        size: 1,
    };
    match evaluator.eval(&expr, &ctx).ok_or_else(invalid)? {
        Value::Nodes(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Item::Node(n) if dom.is_element(n) => Some(n),
                _ => None,
            })
            .collect()),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    Star,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    ColonColon,
    Literal(String),
    Number(f64),
    Name(String),
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '@' => Token::At,
            ',' => Token::Comma,
            '|' => Token::Pipe,
            '*' => Token::Star,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '=' => Token::Eq,
            '!' if next == Some('=') => {
                i += 1;
                Token::Neq
            }
            '<' if next == Some('=') => {
                i += 1;
                Token::Le
            }
            '<' => Token::Lt,
            '>' if next == Some('=') => {
                i += 1;
                Token::Ge
            }
            '>' => Token::Gt,
            ':' if next == Some(':') => {
                i += 1;
                Token::ColonColon
            }
            '.' if next == Some('.') => {
                i += 1;
                Token::DotDot
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => Token::Dot,
            '"' | '\'' => {
                let end = chars[i + 1..].iter().position(|ch| *ch == c)? + i + 1;
                let literal: String = chars[i + 1..end].iter().collect();
                i = end;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i + 1 < chars.len() && (chars[i + 1].is_ascii_digit() || chars[i + 1] == '.') {
                    i += 1;
                }
                let number: String = chars[start..=i].iter().collect();
                Token::Number(number.parse().ok()?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i + 1 < chars.len() && (chars[i + 1].is_alphanumeric() || matches!(chars[i + 1], '-' | '_')) {
                    i += 1;
                }
                Token::Name(chars[start..=i].iter().collect())
            }
            _ => return None,
        };
        tokens.push(token);
        i += 1;
    }
    Some(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    SelfAxis,
    Attribute,
}

impl Axis {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "self" => Axis::SelfAxis,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Union(Vec<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter { primary: Box<Expr>, predicates: Vec<Expr>, steps: Vec<Step> },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_name(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_name("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat_name("and") {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::Neq) => CmpOp::Neq,
                _ => return Some(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Ge) => CmpOp::Ge,
                _ => return Some(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_union()?;
        loop {
            if self.eat(&Token::Plus) {
                let right = self.parse_union()?;
                left = Expr::Add(Box::new(left), Box::new(right));
            } else if self.eat(&Token::Minus) {
                let right = self.parse_union()?;
                left = Expr::Sub(Box::new(left), Box::new(right));
            } else {
                return Some(left);
            }
        }
    }

    fn parse_union(&mut self) -> Option<Expr> {
        let first = self.parse_path()?;
        if self.peek() != Some(&Token::Pipe) {
            return Some(first);
        }
        let mut parts = vec![first];
        while self.eat(&Token::Pipe) {
            parts.push(self.parse_path()?);
        }
        Some(Expr::Union(parts))
    }

    fn starts_step(&self) -> bool {
        match self.peek() {
            Some(Token::Star | Token::At | Token::Dot | Token::DotDot) => true,
            Some(Token::Name(name)) => match self.peek_at(1) {
                Some(Token::LParen) => name == "text" || name == "node",
                _ => true,
            },
            _ => false,
        }
    }

    fn parse_path(&mut self) -> Option<Expr> {
        if self.eat(&Token::Slash) {
            let steps = if self.starts_step() {
                self.parse_relative_steps()?
            } else {
                Vec::new()
            };
            return Some(Expr::Path { absolute: true, steps });
        }
        if self.eat(&Token::DoubleSlash) {
            let mut steps = vec![Step::descendant_or_self()];
            steps.extend(self.parse_relative_steps()?);
            return Some(Expr::Path { absolute: true, steps });
        }
        if self.starts_step() {
            let steps = self.parse_relative_steps()?;
            return Some(Expr::Path { absolute: false, steps });
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Vec::new();
        if matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
            } else {
                self.pos += 1;
            }
            steps.extend(self.parse_relative_steps()?);
        }
        if predicates.is_empty() && steps.is_empty() {
            return Some(primary);
        }
        Some(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn parse_relative_steps(&mut self) -> Option<Vec<Step>> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Some(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Option<Step> {
        if self.eat(&Token::Dot) {
            return Some(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: self.parse_predicates()?,
            });
        }
        if self.eat(&Token::DotDot) {
            return Some(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: self.parse_predicates()?,
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if self.peek_at(1) == Some(&Token::ColonColon) {
            let Some(Token::Name(name)) = self.peek() else {
                return None;
            };
            let axis = Axis::parse(name)?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = match self.peek()?.clone() {
            Token::Star => {
                self.pos += 1;
                NodeTest::Any
            }
            Token::Name(name) => {
                self.pos += 1;
                if (name == "text" || name == "node") && self.eat(&Token::LParen) {
                    if !self.eat(&Token::RParen) {
                        return None;
                    }
                    if name == "text" { NodeTest::Text } else { NodeTest::Node }
                } else {
                    NodeTest::Name(name.to_ascii_lowercase())
                }
            }
            _ => return None,
        };

        Some(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_predicates(&mut self) -> Option<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_expr()?);
            if !self.eat(&Token::RBracket) {
                return None;
            }
        }
        Some(predicates)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.peek()?.clone() {
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.eat(&Token::RParen).then_some(inner)
            }
            Token::Literal(s) => {
                self.pos += 1;
                Some(Expr::Literal(s))
            }
            Token::Number(n) => {
                self.pos += 1;
                Some(Expr::Number(n))
            }
            Token::Minus => {
                self.pos += 1;
                let inner = self.parse_primary()?;
                Some(Expr::Sub(Box::new(Expr::Number(0.0)), Box::new(inner)))
            }
            Token::Name(name) if self.peek_at(1) == Some(&Token::LParen) => {
                let &(_, min, max) = FUNCTIONS.iter().find(|(f, _, _)| *f == name)?;
                self.pos += 2;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        if !self.eat(&Token::Comma) {
                            return None;
                        }
                    }
                }
                (args.len() >= min && args.len() <= max).then_some(Expr::Function(name, args))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Item {
    Node(NodeId),
    /// Attribute `index` of the element.
    Attr(NodeId, usize),
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<Item>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Ctx {
    item: Item,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    dom: &'a Dom,
    order: HashMap<NodeId, usize>,
}

impl<'a> Evaluator<'a> {
    fn new(dom: &'a Dom) -> Self {
        let order = std::iter::once(Dom::ROOT)
            .chain(dom.descendants(Dom::ROOT))
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();
        Self { dom, order }
    }

    fn sort_key(&self, item: &Item) -> (usize, usize) {
        let (node, attr) = match item {
            Item::Node(n) => (*n, 0),
            Item::Attr(n, i) => (*n, i + 1),
        };
        let pos = self.order.get(&node).copied().unwrap_or(self.order.len() + node);
        (pos, attr)
    }

    fn document_order(&self, mut items: Vec<Item>) -> Vec<Item> {
        items.sort_by_key(|i| self.sort_key(i));
        items.dedup();
        items
    }

    fn string_value(&self, item: &Item) -> String {
        match item {
            Item::Node(n) => self.dom.text_content(*n),
            Item::Attr(n, i) => self
                .dom
                .element(*n)
                .and_then(|e| e.attrs.get(*i))
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(items) => self
                .document_order(items.clone())
                .first()
                .map(|i| self.string_value(i))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.to_string(other)),
        }
    }

    fn to_bool(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn eval(&self, expr: &Expr, ctx: &Ctx) -> Option<Value> {
        Some(match expr {
            Expr::Or(a, b) => {
                Value::Bool(self.to_bool(&self.eval(a, ctx)?) || self.to_bool(&self.eval(b, ctx)?))
            }
            Expr::And(a, b) => {
                Value::Bool(self.to_bool(&self.eval(a, ctx)?) && self.to_bool(&self.eval(b, ctx)?))
            }
            Expr::Compare(op, a, b) => {
                let left = self.eval(a, ctx)?;
                let right = self.eval(b, ctx)?;
                Value::Bool(self.compare(*op, &left, &right))
            }
            Expr::Add(a, b) => Value::Num(self.to_number(&self.eval(a, ctx)?) + self.to_number(&self.eval(b, ctx)?)),
            Expr::Sub(a, b) => Value::Num(self.to_number(&self.eval(a, ctx)?) - self.to_number(&self.eval(b, ctx)?)),
            Expr::Union(parts) => {
                let mut items = Vec::new();
                for part in parts {
                    match self.eval(part, ctx)? {
                        Value::Nodes(found) => items.extend(found),
                        _ => return None,
                    }
                }
                Value::Nodes(self.document_order(items))
            }
            Expr::Path { absolute, steps } => {
                let start = if *absolute { Item::Node(Dom::ROOT) } else { ctx.item };
                Value::Nodes(self.apply_steps(vec![start], steps)?)
            }
            Expr::Filter { primary, predicates, steps } => {
                let Value::Nodes(items) = self.eval(primary, ctx)? else {
                    return None;
                };
                let mut items = self.document_order(items);
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                Value::Nodes(self.apply_steps(items, steps)?)
            }
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Function(name, args) => self.call(name, args, ctx)?,
        })
    }

    fn apply_steps(&self, mut items: Vec<Item>, steps: &[Step]) -> Option<Vec<Item>> {
        for step in steps {
            let mut next = Vec::new();
            for item in &items {
                let mut candidates: Vec<Item> = self
                    .axis(item, step.axis)
                    .into_iter()
                    .filter(|c| self.node_test(c, step))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            items = self.document_order(next);
        }
        Some(items)
    }

    fn filter(&self, items: Vec<Item>, predicate: &Expr) -> Option<Vec<Item>> {
        let size = items.len();
        let mut kept = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let ctx = Ctx {
                item,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(n) => n == (i + 1) as f64,
                other => self.to_bool(&other),
            };
            if keep {
                kept.push(item);
            }
        }
        Some(kept)
    }

    /// Nodes along `axis` in proximity order.
    fn axis(&self, item: &Item, axis: Axis) -> Vec<Item> {
        let dom = self.dom;
        let node = match item {
            Item::Node(n) => *n,
            Item::Attr(owner, _) => {
                return match axis {
                    Axis::SelfAxis => vec![*item],
                    Axis::Parent => vec![Item::Node(*owner)],
                    Axis::Ancestor => std::iter::once(*owner)
                        .chain(dom.ancestors(*owner))
                        .map(Item::Node)
                        .collect(),
                    Axis::AncestorOrSelf => std::iter::once(*item)
                        .chain(std::iter::once(*owner).chain(dom.ancestors(*owner)).map(Item::Node))
                        .collect(),
                    _ => Vec::new(),
                };
            }
        };

        let nodes: Vec<NodeId> = match axis {
            Axis::Child => dom.children(node).to_vec(),
            Axis::Descendant => dom.descendants(node),
            Axis::DescendantOrSelf => std::iter::once(node).chain(dom.descendants(node)).collect(),
            Axis::Parent => dom.parent(node).into_iter().collect(),
            Axis::Ancestor => dom.ancestors(node),
            Axis::AncestorOrSelf => std::iter::once(node).chain(dom.ancestors(node)).collect(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let siblings = dom.parent(node).map(|p| dom.children(p)).unwrap_or(&[]);
                let index = siblings.iter().position(|s| *s == node).unwrap_or(0);
                if axis == Axis::FollowingSibling {
                    siblings.iter().skip(index + 1).copied().collect()
                } else {
                    siblings[..index].iter().rev().copied().collect()
                }
            }
            Axis::SelfAxis => vec![node],
            Axis::Attribute => {
                return dom
                    .element(node)
                    .map(|e| (0..e.attrs.len()).map(|i| Item::Attr(node, i)).collect())
                    .unwrap_or_default();
            }
        };
        nodes.into_iter().map(Item::Node).collect()
    }

    fn node_test(&self, item: &Item, step: &Step) -> bool {
        match item {
            Item::Attr(node, index) => match &step.test {
                NodeTest::Any | NodeTest::Node => true,
                NodeTest::Name(name) => self
                    .dom
                    .element(*node)
                    .and_then(|e| e.attrs.get(*index))
                    .is_some_and(|(k, _)| k == name),
                NodeTest::Text => false,
            },
            Item::Node(node) => match &step.test {
                NodeTest::Node => true,
                NodeTest::Text => self.dom.text(*node).is_some(),
                NodeTest::Any => self.dom.is_element(*node),
                NodeTest::Name(name) => self.dom.tag(*node) == Some(name.as_str()),
            },
        }
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let xs = self.string_value(x);
                b.iter().any(|y| self.compare_atoms(op, &Value::Str(xs.clone()), &Value::Str(self.string_value(y))))
            }),
            (Value::Nodes(items), other) => match other {
                Value::Bool(_) => self.compare_atoms(op, &Value::Bool(!items.is_empty()), other),
                _ => items
                    .iter()
                    .any(|i| self.compare_atoms(op, &self.atomize(i, other), other)),
            },
            (other, Value::Nodes(items)) => match other {
                Value::Bool(_) => self.compare_atoms(op, other, &Value::Bool(!items.is_empty())),
                _ => items
                    .iter()
                    .any(|i| self.compare_atoms(op, other, &self.atomize(i, other))),
            },
            _ => self.compare_atoms(op, left, right),
        }
    }

    /// A node's value converted to the type of `like`.
    fn atomize(&self, item: &Item, like: &Value) -> Value {
        let s = self.string_value(item);
        match like {
            Value::Num(_) => Value::Num(parse_number(&s)),
            _ => Value::Str(s),
        }
    }

    fn compare_atoms(&self, op: CmpOp, left: &Value, right: &Value) -> bool {
        match op {
            CmpOp::Eq | CmpOp::Neq => {
                let equal = match (left, right) {
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => self.to_bool(left) == self.to_bool(right),
                    (Value::Num(_), _) | (_, Value::Num(_)) => self.to_number(left) == self.to_number(right),
                    _ => self.to_string(left) == self.to_string(right),
                };
                equal == (op == CmpOp::Eq)
            }
            _ => {
                let (a, b) = (self.to_number(left), self.to_number(right));
                match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    _ => a >= b,
                }
            }
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Ctx) -> Option<Value> {
        let string_arg = |i: usize| -> Option<String> {
            match args.get(i) {
                Some(arg) => Some(self.to_string(&self.eval(arg, ctx)?)),
                None => Some(self.string_value(&ctx.item)),
            }
        };

        Some(match name {
            "contains" => Value::Bool(string_arg(0)?.contains(&string_arg(1)?)),
            "starts-with" => Value::Bool(string_arg(0)?.starts_with(&string_arg(1)?)),
            "normalize-space" => Value::Str(string_arg(0)?.split_whitespace().collect::<Vec<_>>().join(" ")),
            "string" => Value::Str(string_arg(0)?),
            "string-length" => Value::Num(string_arg(0)?.chars().count() as f64),
            "concat" => {
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&string_arg(i)?);
                }
                Value::Str(out)
            }
            "translate" => {
                let source = string_arg(0)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                Value::Str(
                    source
                        .chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "not" => Value::Bool(!self.to_bool(&self.eval(&args[0], ctx)?)),
            "boolean" => Value::Bool(self.to_bool(&self.eval(&args[0], ctx)?)),
            "number" => Value::Num(match args.first() {
                Some(arg) => self.to_number(&self.eval(arg, ctx)?),
                None => parse_number(&self.string_value(&ctx.item)),
            }),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "position" => Value::Num(ctx.position as f64),
            "last" => Value::Num(ctx.size as f64),
            "count" => match self.eval(&args[0], ctx)? {
                Value::Nodes(items) => Value::Num(items.len() as f64),
                _ => return None,
            },
            _ => return None,
        })
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
