//! Inline functions declared in the query prologue

use std::cell::RefCell;
use std::fmt;

use log::debug;

use esql_ast::{Expr, FunctionDefinition};
use esql_diagnostics::{ESQL0112, Result, keys};

use crate::{DbExpr, DbLambda, ScopeEntry, SemanticResolver};

#[derive(Debug, Clone)]
enum LambdaState {
    NotConverted,
    Converting,
    Converted(DbLambda),
}

/// A declared inline function whose body is converted on first use
pub struct InlineFunctionInfo {
    definition: FunctionDefinition,
    parameters: Vec<DbExpr>,
    state: RefCell<LambdaState>,
}

impl fmt::Debug for InlineFunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineFunctionInfo")
            .field("name", &self.definition.name)
            .field("parameters", &self.parameters)
            .field("state", &self.state.borrow())
            .finish()
    }
}

impl InlineFunctionInfo {
    /// `parameters` are variable references, one per declared parameter
    pub fn new(definition: FunctionDefinition, parameters: Vec<DbExpr>) -> Self {
        Self {
            definition,
            parameters,
            state: RefCell::new(LambdaState::NotConverted),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    pub fn parameters(&self) -> &[DbExpr] {
        &self.parameters
    }

    pub fn is_converted(&self) -> bool {
        matches!(*self.state.borrow(), LambdaState::Converted(_))
    }

    /// Converted body of the function.
    ///
    /// The body is converted once, by `convert`, in a resolver that shares
    /// parameters and inline functions with `resolver` but none of its
    /// scopes. A function whose body reaches its own definition again fails
    /// with a circular reference error.
    pub fn get_lambda<F>(&self, resolver: &SemanticResolver, convert: F) -> Result<DbLambda>
    where
        F: FnOnce(&Expr, &mut SemanticResolver) -> Result<DbExpr>,
    {
        match &*self.state.borrow() {
            LambdaState::Converted(lambda) => return Ok(lambda.clone()),
            LambdaState::Converting => {
                return Err(self.definition.ctx.error(
                    resolver.strings(),
                    ESQL0112,
                    keys::CIRCULAR_FUNCTION_DEFINITION,
                    &[&self.definition.name],
                ));
            }
            LambdaState::NotConverted => {}
        }

        debug!("converting inline function '{}'", self.definition.name);
        self.state.replace(LambdaState::Converting);
        let converted = self.convert_body(resolver, convert);
        match converted {
            Ok(lambda) => {
                self.state.replace(LambdaState::Converted(lambda.clone()));
                Ok(lambda)
            }
            Err(err) => {
                self.state.replace(LambdaState::NotConverted);
                Err(err)
            }
        }
    }

    fn convert_body<F>(&self, resolver: &SemanticResolver, convert: F) -> Result<DbLambda>
    where
        F: FnOnce(&Expr, &mut SemanticResolver) -> Result<DbExpr>,
    {
        let mut sandbox = resolver.clone_for_inline_function_conversion()?;
        let body = sandbox.with_scope(|sr| {
            for parameter in &self.parameters {
                let name = parameter.variable_name().unwrap_or_default().to_string();
                sr.add_to_current_scope(name, ScopeEntry::FreeVar(parameter.clone()))?;
            }
            convert(&self.definition.body, sr)
        })?;
        Ok(DbLambda::new(self.parameters.clone(), body))
    }
}
