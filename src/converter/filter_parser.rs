//! Filter-group parser.
//!
//! Walks a filter tree depth-first and reports begin-group, operator,
//! condition and end-group events to a [`FilterVisitor`], checking the
//! grammar as it goes:
//!
//! - a group must not be empty
//! - a group must not start or end with an operator
//! - two operators must not follow each other
//! - two filters or groups must be separated by an operator
//!
//! Events are emitted while walking, so a visitor may see a prefix of the
//! events of a tree that turns out to be invalid.

use crate::definition::{FilterCondition, FilterNode, LogicalOperator};

use super::errors::ConvertError;
use super::ConvertResult;

/// Receives the events of a filter tree walk
pub trait FilterVisitor {
    fn begin_group(&mut self) -> ConvertResult<()>;

    fn end_group(&mut self) -> ConvertResult<()>;

    fn operator(&mut self, operator: LogicalOperator) -> ConvertResult<()>;

    fn condition(&mut self, condition: &FilterCondition) -> ConvertResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastToken {
    None,
    BeginGroup,
    Operator,
    Filter,
    EndGroup,
}

#[derive(Debug)]
pub struct FilterParser {
    last: LastToken,
}

impl Default for FilterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterParser {
    pub fn new() -> Self {
        Self {
            last: LastToken::None,
        }
    }

    /// Walks the top-level filter list, which is a group itself
    pub fn parse<V: FilterVisitor + ?Sized>(
        &mut self,
        filters: &[FilterNode],
        visitor: &mut V,
    ) -> ConvertResult<()> {
        self.last = LastToken::None;
        self.group(filters, visitor)
    }

    fn group<V: FilterVisitor + ?Sized>(
        &mut self,
        tokens: &[FilterNode],
        visitor: &mut V,
    ) -> ConvertResult<()> {
        if tokens.is_empty() {
            return Err(invalid("a group must not be empty", &FilterNode::Group(Vec::new())));
        }
        if matches!(self.last, LastToken::Filter | LastToken::EndGroup) {
            return Err(invalid(
                "a group must be separated from the previous filter or group by an operator",
                &FilterNode::Group(tokens.to_vec()),
            ));
        }

        visitor.begin_group()?;
        self.last = LastToken::BeginGroup;

        for token in tokens {
            match token {
                FilterNode::Operator(operator) => {
                    self.check_operator(token)?;
                    visitor.operator(*operator)?;
                    self.last = LastToken::Operator;
                }
                FilterNode::Condition(condition) => {
                    if matches!(self.last, LastToken::Filter | LastToken::EndGroup) {
                        return Err(invalid(
                            "a filter must be separated from the previous filter or group by an operator",
                            token,
                        ));
                    }
                    visitor.condition(condition)?;
                    self.last = LastToken::Filter;
                }
                FilterNode::Group(children) => self.group(children, visitor)?,
            }
        }

        if self.last == LastToken::Operator {
            let token = tokens.last().unwrap_or(&FilterNode::Group(Vec::new())).clone();
            return Err(invalid("a group must not end with an operator", &token));
        }

        visitor.end_group()?;
        self.last = LastToken::EndGroup;
        Ok(())
    }

    fn check_operator(&self, token: &FilterNode) -> ConvertResult<()> {
        match self.last {
            LastToken::Filter | LastToken::EndGroup => Ok(()),
            LastToken::Operator => Err(invalid("two operators must not follow each other", token)),
            LastToken::BeginGroup | LastToken::None => {
                Err(invalid("a group must not start with an operator", token))
            }
        }
    }
}

fn invalid(reason: &str, token: &FilterNode) -> ConvertError {
    let token = token.token_text();
    log::warn!("Invalid filters definition: {} ({})", reason, token);
    ConvertError::grammar(reason, token)
}

/// Checks the grammar of a filter list without emitting anything
pub fn validate_filters(filters: &[FilterNode]) -> ConvertResult<()> {
    struct Discard;

    impl FilterVisitor for Discard {
        fn begin_group(&mut self) -> ConvertResult<()> {
            Ok(())
        }
        fn end_group(&mut self) -> ConvertResult<()> {
            Ok(())
        }
        fn operator(&mut self, _operator: LogicalOperator) -> ConvertResult<()> {
            Ok(())
        }
        fn condition(&mut self, _condition: &FilterCondition) -> ConvertResult<()> {
            Ok(())
        }
    }

    FilterParser::new().parse(filters, &mut Discard)
}
