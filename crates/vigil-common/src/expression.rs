//! Threshold-expression grammar for alarm definitions.
//!
//! An expression combines one or more sub-expressions with `and` / `or`
//! (or `&&` / `||`), optionally grouped with parentheses:
//!
//! ```text
//! avg(cpu.idle_perc{hostname=web-01}, 120) < 10 times 3 or max(disk.space_used_perc) > 90
//! ```
//!
//! Each sub-expression is `[function(]metric[{dims}][, period][)] op threshold [times periods]`.
//! The function defaults to `avg`, the period to 60 seconds and the number of
//! periods to 1.
//!
//! # Examples
//!
//! ```
//! use vigil_common::expression::{AggregateFunction, AlarmExpression};
//!
//! let expr: AlarmExpression = "max(cpu.system_perc{hostname=web-01}) > 0".parse().unwrap();
//! let subs = expr.sub_expressions();
//! assert_eq!(subs.len(), 1);
//! assert_eq!(subs[0].function, AggregateFunction::Max);
//! assert_eq!(subs[0].metric.name, "cpu.system_perc");
//! assert!(expr.dimensions().contains(&("hostname".to_string(), "web-01".to_string())));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PERIOD_SECS: u32 = 60;
pub const DEFAULT_PERIODS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,

    #[error("disallowed character '{ch}' at position {pos}")]
    DisallowedCharacter { ch: char, pos: usize },

    #[error("expected {expected} at position {pos}, found '{found}'")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        pos: usize,
    },

    #[error("expected {expected}, found end of expression")]
    UnexpectedEnd { expected: &'static str },

    #[error("invalid threshold '{0}'")]
    InvalidThreshold(String),

    #[error("invalid period '{0}': must be a positive multiple of 60")]
    InvalidPeriod(String),

    #[error("invalid periods '{0}': must be a positive integer")]
    InvalidPeriods(String),

    #[error("dimension '{0}' is specified more than once")]
    DuplicateDimension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Avg,
    Min,
    Max,
    Sum,
    Count,
    Last,
}

impl AggregateFunction {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Last => "last",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOperator {
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl RelationalOperator {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "lt" => Some(Self::LessThan),
            "lte" => Some(Self::LessEqual),
            "gt" => Some(Self::GreaterThan),
            "gte" => Some(Self::GreaterEqual),
            _ => None,
        }
    }
}

impl fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
        };
        f.write_str(s)
    }
}

/// Metric name plus the dimensions it is filtered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubExpression {
    pub function: AggregateFunction,
    pub metric: MetricDefinition,
    pub operator: RelationalOperator,
    pub threshold: f64,
    pub period: u32,
    pub periods: u32,
}

impl fmt::Display for SubExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.function, self.metric.name)?;
        if !self.metric.dimensions.is_empty() {
            let dims: Vec<String> = self
                .metric
                .dimensions
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "{{{}}}", dims.join(","))?;
        }
        if self.period != DEFAULT_PERIOD_SECS {
            write!(f, ", {}", self.period)?;
        }
        write!(f, ") {} {}", self.operator, self.threshold)?;
        if self.periods != DEFAULT_PERIODS {
            write!(f, " times {}", self.periods)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Sub(SubExpression),
    And(Box<ExpressionNode>, Box<ExpressionNode>),
    Or(Box<ExpressionNode>, Box<ExpressionNode>),
}

impl ExpressionNode {
    fn collect<'a>(&'a self, out: &mut Vec<&'a SubExpression>) {
        match self {
            ExpressionNode::Sub(sub) => out.push(sub),
            ExpressionNode::And(l, r) | ExpressionNode::Or(l, r) => {
                l.collect(out);
                r.collect(out);
            }
        }
    }
}

/// A successfully parsed alarm expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmExpression {
    root: ExpressionNode,
}

impl AlarmExpression {
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(ExpressionError::UnexpectedToken {
                expected: "end of expression",
                found: tok.token.to_string(),
                pos: tok.pos,
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &ExpressionNode {
        &self.root
    }

    /// Sub-expressions in left-to-right order.
    pub fn sub_expressions(&self) -> Vec<&SubExpression> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    /// Every `(dimension, value)` pair referenced by any sub-expression.
    pub fn dimensions(&self) -> BTreeSet<(String, String)> {
        self.sub_expressions()
            .into_iter()
            .flat_map(|sub| {
                sub.metric
                    .dimensions
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect()
    }
}

impl FromStr for AlarmExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---- lexer ----

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Equals,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::Equals => f.write_str("="),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::AndAnd => f.write_str("&&"),
            Token::OrOr => f.write_str("||"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

const DISALLOWED: &[char] = &[';', '\'', '"', '\\'];

fn is_special(c: char) -> bool {
    matches!(
        c,
        '{' | '}' | '(' | ')' | ',' | '=' | '<' | '>' | '&' | '|'
    ) || DISALLOWED.contains(&c)
}

fn tokenize(text: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (token, width) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            ',' => (Token::Comma, 1),
            '=' => (Token::Equals, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if next == Some('&') => (Token::AndAnd, 2),
            '|' if next == Some('|') => (Token::OrOr, 2),
            '&' | '|' => return Err(ExpressionError::DisallowedCharacter { ch: c, pos }),
            c if DISALLOWED.contains(&c) => {
                return Err(ExpressionError::DisallowedCharacter { ch: c, pos })
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].1.is_whitespace() && !is_special(chars[i].1) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push(Spanned {
                    token: Token::Word(word),
                    pos,
                });
                continue;
            }
        };
        tokens.push(Spanned { token, pos });
        i += width;
    }

    Ok(tokens)
}

// ---- parser ----

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self, expected: &'static str) -> Result<Spanned, ExpressionError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: Token, expected: &'static str) -> Result<(), ExpressionError> {
        let tok = self.next(expected)?;
        if tok.token == want {
            Ok(())
        } else {
            Err(unexpected(expected, &tok))
        }
    }

    fn expect_word(&mut self, expected: &'static str) -> Result<(String, usize), ExpressionError> {
        let tok = self.next(expected)?;
        match tok.token {
            Token::Word(w) => Ok((w, tok.pos)),
            _ => Err(unexpected(expected, &tok)),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_token(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_or(&mut self) -> Result<ExpressionNode, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") || self.peek_token() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = ExpressionNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExpressionNode, ExpressionError> {
        let mut left = self.parse_primary()?;
        while self.peek_keyword("and") || self.peek_token() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.parse_primary()?;
            left = ExpressionNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode, ExpressionError> {
        if self.peek_token() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_sub_expression().map(ExpressionNode::Sub)
    }

    fn parse_sub_expression(&mut self) -> Result<SubExpression, ExpressionError> {
        let (first, _) = self.expect_word("function or metric name")?;

        let mut period = DEFAULT_PERIOD_SECS;
        let (function, metric) = match AggregateFunction::from_word(&first) {
            Some(function) if self.peek_token() == Some(&Token::LParen) => {
                self.pos += 1;
                let (name, _) = self.expect_word("metric name")?;
                let metric = self.parse_metric(name)?;
                if self.peek_token() == Some(&Token::Comma) {
                    self.pos += 1;
                    let (raw, _) = self.expect_word("period")?;
                    period = match raw.parse::<u32>() {
                        Ok(p) if p > 0 && p % 60 == 0 => p,
                        _ => return Err(ExpressionError::InvalidPeriod(raw)),
                    };
                }
                self.expect(Token::RParen, "')'")?;
                (function, metric)
            }
            _ => (AggregateFunction::Avg, self.parse_metric(first)?),
        };

        let operator = self.parse_operator()?;

        let (raw, _) = self.expect_word("threshold")?;
        let threshold = raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(ExpressionError::InvalidThreshold(raw))?;

        let mut periods = DEFAULT_PERIODS;
        if self.peek_keyword("times") {
            self.pos += 1;
            let (raw, _) = self.expect_word("number of periods")?;
            periods = match raw.parse::<u32>() {
                Ok(p) if p > 0 => p,
                _ => return Err(ExpressionError::InvalidPeriods(raw)),
            };
        }

        Ok(SubExpression {
            function,
            metric,
            operator,
            threshold,
            period,
            periods,
        })
    }

    fn parse_metric(&mut self, name: String) -> Result<MetricDefinition, ExpressionError> {
        let mut dimensions = BTreeMap::new();
        if self.peek_token() == Some(&Token::LBrace) {
            self.pos += 1;
            loop {
                let (key, _) = self.expect_word("dimension name")?;
                self.expect(Token::Equals, "'='")?;
                let (value, _) = self.expect_word("dimension value")?;
                if dimensions.insert(key.clone(), value).is_some() {
                    return Err(ExpressionError::DuplicateDimension(key));
                }
                let tok = self.next("',' or '}'")?;
                match tok.token {
                    Token::Comma => continue,
                    Token::RBrace => break,
                    _ => return Err(unexpected("',' or '}'", &tok)),
                }
            }
        }
        Ok(MetricDefinition { name, dimensions })
    }

    fn parse_operator(&mut self) -> Result<RelationalOperator, ExpressionError> {
        let tok = self.next("relational operator")?;
        let op = match &tok.token {
            Token::Lt => Some(RelationalOperator::LessThan),
            Token::Le => Some(RelationalOperator::LessEqual),
            Token::Gt => Some(RelationalOperator::GreaterThan),
            Token::Ge => Some(RelationalOperator::GreaterEqual),
            Token::Word(w) => RelationalOperator::from_word(w),
            _ => None,
        };
        op.ok_or_else(|| unexpected("relational operator", &tok))
    }
}

fn unexpected(expected: &'static str, tok: &Spanned) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        expected,
        found: tok.token.to_string(),
        pos: tok.pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AlarmExpression {
        AlarmExpression::parse(text).unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    #[test]
    fn parses_function_call() {
        let expr = parse("max(cpu.system_perc) > 0");
        let subs = expr.sub_expressions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].function, AggregateFunction::Max);
        assert_eq!(subs[0].metric.name, "cpu.system_perc");
        assert_eq!(subs[0].operator, RelationalOperator::GreaterThan);
        assert_eq!(subs[0].threshold, 0.0);
        assert_eq!(subs[0].period, 60);
        assert_eq!(subs[0].periods, 1);
    }

    #[test]
    fn bare_metric_defaults_to_avg() {
        let expr = parse("mem_total_mb > 0");
        assert_eq!(expr.sub_expressions()[0].function, AggregateFunction::Avg);
    }

    #[test]
    fn word_operators_are_case_insensitive() {
        let expr = parse("AVG(mem_total_mb) GTE 10.5");
        let sub = expr.sub_expressions()[0];
        assert_eq!(sub.function, AggregateFunction::Avg);
        assert_eq!(sub.operator, RelationalOperator::GreaterEqual);
        assert_eq!(sub.threshold, 10.5);
    }

    #[test]
    fn dimension_values_may_contain_urls() {
        let expr = parse("avg(mem_total_mb{url=https://www.google.com}) gt 0");
        let dims = expr.dimensions();
        assert!(dims.contains(&("url".to_string(), "https://www.google.com".to_string())));
    }

    #[test]
    fn period_and_periods() {
        let expr = parse("sum(net.in_bytes{hostname=h1,service=web}, 120) >= 1000 times 3");
        let sub = expr.sub_expressions()[0];
        assert_eq!(sub.period, 120);
        assert_eq!(sub.periods, 3);
        assert_eq!(sub.metric.dimensions.len(), 2);
    }

    #[test]
    fn compound_expressions_keep_order() {
        let expr = parse("(a > 1 and b < 2) || count(c) <= 3 && d lt -4");
        let names: Vec<&str> = expr
            .sub_expressions()
            .iter()
            .map(|s| s.metric.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(matches!(expr.root(), ExpressionNode::Or(_, _)));
        assert_eq!(expr.sub_expressions()[3].threshold, -4.0);
    }

    #[test]
    fn rejects_backslashes() {
        let err = AlarmExpression::parse(r"avg(mem_total_mb{dev=\usr\local\bin}) gt 0").unwrap_err();
        assert!(matches!(err, ExpressionError::DisallowedCharacter { ch: '\\', .. }));
    }

    #[test]
    fn rejects_single_ampersand() {
        let err = AlarmExpression::parse("a > 1 & b > 2").unwrap_err();
        assert!(matches!(err, ExpressionError::DisallowedCharacter { ch: '&', .. }));
    }

    #[test]
    fn rejects_mismatched_braces() {
        assert!(AlarmExpression::parse("max(cpu{a=b) > 0").is_err());
        assert!(AlarmExpression::parse("max(cpu > 0").is_err());
        assert!(AlarmExpression::parse("(a > 0").is_err());
        assert!(AlarmExpression::parse("a > 0)").is_err());
    }

    #[test]
    fn rejects_bad_operator_and_threshold() {
        assert!(matches!(
            AlarmExpression::parse("cpu == 1"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            AlarmExpression::parse("cpu > high"),
            Err(ExpressionError::InvalidThreshold(_))
        ));
        assert!(matches!(
            AlarmExpression::parse("cpu > inf"),
            Err(ExpressionError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn rejects_bad_periods() {
        assert!(matches!(
            AlarmExpression::parse("avg(cpu, 45) > 1"),
            Err(ExpressionError::InvalidPeriod(_))
        ));
        assert!(matches!(
            AlarmExpression::parse("avg(cpu) > 1 times 0"),
            Err(ExpressionError::InvalidPeriods(_))
        ));
    }

    #[test]
    fn rejects_duplicate_dimension() {
        assert_eq!(
            AlarmExpression::parse("cpu{a=1,a=2} > 1").unwrap_err(),
            ExpressionError::DuplicateDimension("a".to_string())
        );
    }

    #[test]
    fn rejects_empty_and_truncated() {
        assert_eq!(AlarmExpression::parse("   ").unwrap_err(), ExpressionError::Empty);
        assert!(matches!(
            AlarmExpression::parse("cpu >"),
            Err(ExpressionError::UnexpectedEnd { .. })
        ));
        assert!(AlarmExpression::parse("a > 1 and").is_err());
    }

    #[test]
    fn sub_expression_display_is_canonical() {
        let expr = parse("MAX(cpu{b=2,a=1}, 120) gt 5 times 2");
        assert_eq!(
            expr.sub_expressions()[0].to_string(),
            "max(cpu{a=1,b=2}, 120) > 5 times 2"
        );
    }
}
