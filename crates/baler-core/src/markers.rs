//! Environment-marker evaluation.
//!
//! A dependency declaration may carry a marker expression deciding whether
//! the clause applies to a given build target, e.g.
//! `enum34; python_version == '3.3'`. This module parses the expression
//! into a small AST and evaluates it against a synthetic [`MarkerEnv`]
//! bound from the target triple - never against the host interpreter.
//!
//! The supported grammar is deliberately minimal:
//!
//! ```text
//! expression := clause ('or' clause)*
//! clause     := IDENT ('==' | '!=') STRING
//!             | STRING 'in' IDENT
//! IDENT      := python_version | platform.machine | sys.platform
//! ```
//!
//! No `and`, no parentheses, no negation; `or` is left-associative and
//! short-circuits. Version values compare as plain strings (`"3.10"` and
//! `"3.1"` are different), matching the semantics upstream markers are
//! written against. Extending the grammar means adding clause variants,
//! not special-casing strings.

use baler_schema::Target;
use thiserror::Error;

/// Why a marker expression could not be parsed.
///
/// A malformed marker is a configuration error: the affected build aborts
/// before any archive bytes are written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression contained no clauses at all.
    #[error("empty marker expression")]
    Empty,

    /// A quote was opened but never closed.
    #[error("unterminated string literal in marker expression")]
    UnterminatedString,

    /// A character outside the grammar was encountered.
    #[error("unexpected character '{0}' in marker expression")]
    UnexpectedChar(char),

    /// The expression referenced a variable outside the fixed environment.
    #[error("unknown environment variable '{0}'")]
    UnknownVariable(String),

    /// The token stream did not match the grammar.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the grammar required at this position.
        expected: &'static str,
        /// What was actually present.
        found: String,
    },
}

/// The fixed set of environment variables a marker may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvVar {
    PythonVersion,
    Machine,
    SysPlatform,
}

impl EnvVar {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "python_version" => Some(Self::PythonVersion),
            "platform.machine" => Some(Self::Machine),
            "sys.platform" => Some(Self::SysPlatform),
            _ => None,
        }
    }
}

/// Synthetic environment a marker expression is evaluated against.
///
/// Bound once per target; evaluation is a pure function of
/// (expression, environment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEnv {
    /// Interpreter version string, e.g. `3.9`.
    pub python_version: String,
    /// Short OS token as `sys.platform` reports it (`linux`, `darwin`,
    /// `win32`).
    pub sys_platform: String,
    /// Machine architecture token (`i386` or `x86_64`).
    pub machine: String,
}

impl MarkerEnv {
    /// Bind the environment for a build target.
    pub fn from_target(target: &Target) -> Self {
        Self {
            python_version: target.python.clone(),
            sys_platform: target.sys_platform().to_string(),
            machine: target.machine().to_string(),
        }
    }

    fn get(&self, var: EnvVar) -> &str {
        match var {
            EnvVar::PythonVersion => &self.python_version,
            EnvVar::Machine => &self.machine,
            EnvVar::SysPlatform => &self.sys_platform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    /// `IDENT == 'literal'` / `IDENT != 'literal'`.
    Compare {
        var: EnvVar,
        op: Comparator,
        literal: String,
    },
    /// `'literal' in IDENT` - substring membership.
    Contains { literal: String, var: EnvVar },
}

impl Clause {
    fn evaluate(&self, env: &MarkerEnv) -> bool {
        match self {
            Self::Compare { var, op, literal } => {
                let value = env.get(*var);
                match op {
                    Comparator::Eq => value == literal,
                    Comparator::Ne => value != literal,
                }
            }
            Self::Contains { literal, var } => env.get(*var).contains(literal.as_str()),
        }
    }
}

/// A parsed marker expression: one or more clauses joined by `or`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    clauses: Vec<Clause>,
}

impl Expr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the input does not conform to the
    /// grammar described in the module documentation.
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expression()?;
        Ok(expr)
    }

    /// Evaluate against an environment, short-circuiting on the first
    /// satisfied clause.
    pub fn evaluate(&self, env: &MarkerEnv) -> bool {
        self.clauses.iter().any(|clause| clause.evaluate(env))
    }
}

/// Parse and evaluate an expression in one step.
///
/// # Errors
///
/// Returns an [`ExpressionError`] if the expression is malformed.
pub fn evaluate(input: &str, env: &MarkerEnv) -> Result<bool, ExpressionError> {
    Ok(Expr::parse(input)?.evaluate(env))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Eq,
    Ne,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("'{name}'"),
            Self::Str(value) => format!("'{value}'"),
            Self::Eq => "'=='".to_string(),
            Self::Ne => "'!='".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut literal = String::new();
            loop {
                match chars.next() {
                    Some(ch) if ch == c => break,
                    Some(ch) => literal.push(ch),
                    None => return Err(ExpressionError::UnterminatedString),
                }
            }
            tokens.push(Token::Str(literal));
        } else if c == '=' || c == '!' {
            chars.next();
            match chars.next() {
                Some('=') => tokens.push(if c == '=' { Token::Eq } else { Token::Ne }),
                _ => return Err(ExpressionError::UnexpectedChar(c)),
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(name));
        } else {
            return Err(ExpressionError::UnexpectedChar(c));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut clauses = vec![self.parse_clause()?];
        while let Some(token) = self.next() {
            match token {
                Token::Ident(ref name) if name == "or" => clauses.push(self.parse_clause()?),
                other => {
                    return Err(ExpressionError::Unexpected {
                        expected: "'or' or end of expression",
                        found: other.describe(),
                    });
                }
            }
        }
        Ok(Expr { clauses })
    }

    fn parse_clause(&mut self) -> Result<Clause, ExpressionError> {
        match self.next() {
            // 'literal' in IDENT
            Some(Token::Str(literal)) => {
                match self.next() {
                    Some(Token::Ident(ref kw)) if kw == "in" => {}
                    Some(other) => {
                        return Err(ExpressionError::Unexpected {
                            expected: "'in'",
                            found: other.describe(),
                        });
                    }
                    None => {
                        return Err(ExpressionError::Unexpected {
                            expected: "'in'",
                            found: "end of expression".to_string(),
                        });
                    }
                }
                let var = self.parse_env_var()?;
                Ok(Clause::Contains { literal, var })
            }
            // IDENT == 'literal' / IDENT != 'literal'
            Some(Token::Ident(name)) => {
                let var = EnvVar::from_name(&name)
                    .ok_or_else(|| ExpressionError::UnknownVariable(name.clone()))?;
                let op = match self.next() {
                    Some(Token::Eq) => Comparator::Eq,
                    Some(Token::Ne) => Comparator::Ne,
                    Some(other) => {
                        return Err(ExpressionError::Unexpected {
                            expected: "'==' or '!='",
                            found: other.describe(),
                        });
                    }
                    None => {
                        return Err(ExpressionError::Unexpected {
                            expected: "'==' or '!='",
                            found: "end of expression".to_string(),
                        });
                    }
                };
                let literal = match self.next() {
                    Some(Token::Str(literal)) => literal,
                    Some(other) => {
                        return Err(ExpressionError::Unexpected {
                            expected: "string literal",
                            found: other.describe(),
                        });
                    }
                    None => {
                        return Err(ExpressionError::Unexpected {
                            expected: "string literal",
                            found: "end of expression".to_string(),
                        });
                    }
                };
                Ok(Clause::Compare { var, op, literal })
            }
            Some(other) => Err(ExpressionError::Unexpected {
                expected: "comparison or membership clause",
                found: other.describe(),
            }),
            None => Err(ExpressionError::Empty),
        }
    }

    fn parse_env_var(&mut self) -> Result<EnvVar, ExpressionError> {
        match self.next() {
            Some(Token::Ident(name)) => {
                let var = EnvVar::from_name(&name);
                var.ok_or_else(|| ExpressionError::UnknownVariable(name))
            }
            Some(other) => Err(ExpressionError::Unexpected {
                expected: "environment variable",
                found: other.describe(),
            }),
            None => Err(ExpressionError::Unexpected {
                expected: "environment variable",
                found: "end of expression".to_string(),
            }),
        }
    }
}
