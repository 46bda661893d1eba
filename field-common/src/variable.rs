use crate::error::ExpressionError;
use crate::expression::{Expression, Scope};
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One user-editable parameter: an expression string, its parsed form, and
/// the value of the last evaluation.
///
/// Variables are values. `update` and `change_expression` return new
/// Variables and clones share the parsed tree, so re-evaluating every tick
/// never re-parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Variable {
    expression: Arc<str>,
    program: Option<Arc<Expression>>,
    value: f64,
}

impl Variable {
    /// Wraps `expression`. The cached value starts at `0` until the first
    /// `update`. Text that does not parse is kept verbatim and evaluates to `0`.
    pub fn from_text(expression: &str) -> Self {
        let program = match Expression::parse(expression) {
            Ok(program) => Some(Arc::new(program)),
            Err(e) => {
                trace!("Expression '{}' does not parse: {}", expression, e);
                None
            }
        };
        Variable {
            expression: Arc::from(expression),
            program,
            value: 0.0,
        }
    }

    /// Evaluates against `scope`, returning `0` on any failure.
    pub fn evaluate(&self, scope: &Scope) -> f64 {
        let Some(program) = &self.program else {
            return 0.0;
        };
        match program.eval(scope) {
            Ok(value) => value,
            Err(e) => {
                trace!("Expression '{}' failed: {}", self.expression, e);
                0.0
            }
        }
    }

    /// Returns a copy whose cached value is the evaluation against `scope`.
    pub fn update(&self, scope: &Scope) -> Variable {
        Variable {
            value: self.evaluate(scope),
            ..self.clone()
        }
    }

    /// The value cached by the last `update`.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the expression parsed.
    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    /// Replaces the expression without validating it.
    pub fn change_expression(&self, expression: &str) -> Variable {
        Variable::from_text(expression)
    }

    /// Replaces the expression only if it parses and evaluates against the
    /// zero scope. NaN is accepted there, since `sqrt(t - 1)` is legitimate.
    pub fn try_change_expression(&self, expression: &str) -> Result<Variable, ExpressionError> {
        let program = Expression::parse(expression)?;
        match program.eval(&Scope::default()) {
            Ok(_) | Err(ExpressionError::NotANumber) => {}
            Err(e) => return Err(e),
        }
        Ok(Variable {
            expression: Arc::from(expression),
            program: Some(Arc::new(program)),
            value: 0.0,
        })
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl From<String> for Variable {
    fn from(expression: String) -> Self {
        Variable::from_text(&expression)
    }
}

impl From<&str> for Variable {
    fn from(expression: &str) -> Self {
        Variable::from_text(expression)
    }
}

impl From<Variable> for String {
    fn from(variable: Variable) -> Self {
        variable.expression.to_string()
    }
}
