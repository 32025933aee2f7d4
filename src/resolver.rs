//! Folds `global` defaults and per-shape comments into resolved shape attributes.

use crate::attr_parser::{parse_attribute_list, ShapeAttributes};
use crate::grammar::{parse_comment_shape, Statement};
use crate::shape::Shape;

#[derive(Debug, Clone, PartialEq)]
enum ContinuationState {
    Idle,
    /// The previous shape ended with `||`; the next one inherits its attributes.
    AwaitingContinuation(ShapeAttributes),
}

/// Per-parse attribute state. Create one for each region text.
#[derive(Debug)]
pub struct AttributeResolver {
    global: ShapeAttributes,
    state: ContinuationState,
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeResolver {
    pub fn new() -> Self {
        AttributeResolver {
            global: ShapeAttributes::default(),
            state: ContinuationState::Idle,
        }
    }

    pub fn global(&self) -> &ShapeAttributes {
        &self.global
    }

    /// Consumes one statement. `global` lines are absorbed; shapes come back
    /// with resolved attributes; comment lines come back only when they
    /// embed a shape.
    pub fn resolve(&mut self, statement: Statement) -> Option<Statement> {
        match statement {
            Statement::Global(text) => {
                let (tokens, _) = parse_attribute_list(&text);
                self.global.apply(&tokens);
                self.state = ContinuationState::Idle;
                None
            }
            Statement::Frame(frame) => Some(Statement::Frame(frame)),
            Statement::Shape(shape) => Some(Statement::Shape(self.resolve_shape(shape))),
            Statement::Comment(text) => {
                parse_comment_shape(&text).map(|shape| Statement::Shape(self.resolve_shape(shape)))
            }
        }
    }

    fn resolve_shape(&mut self, shape: Shape) -> Shape {
        let base = match &self.state {
            ContinuationState::AwaitingContinuation(saved) => saved,
            ContinuationState::Idle => &self.global,
        };
        let attrs = match shape.comment() {
            Some(comment) => base.merged(&parse_attribute_list(comment).0),
            None => base.clone(),
        };
        self.state = if shape.continued() {
            ContinuationState::AwaitingContinuation(attrs.clone())
        } else {
            ContinuationState::Idle
        };
        shape.with_attributes(attrs)
    }
}
