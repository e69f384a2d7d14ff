//! Variable and macro definitions owned by one translator.

use std::collections::HashMap;
use std::ops::Range;

use super::diag::{DiagSink, Diagnostic};
use super::scan::{self, Place};

/// A parameter occurrence inside a macro body, precomputed at definition
/// time so each invocation is a direct span replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef {
    pub param: usize,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub params: Vec<String>,
    pub body: String,
    pub refs: Vec<ParamRef>,
}

impl MacroDef {
    pub fn new(params: Vec<String>, body: String) -> Self {
        let mut refs = Vec::new();
        let mut pos = 0;
        while let Some(ph) = scan::next_var_ref(&body, pos) {
            pos = ph.span.end;
            let Place::Var { name } = ph.place else {
                continue;
            };
            if let Some(param) = params.iter().position(|p| *p == name) {
                refs.push(ParamRef {
                    param,
                    span: ph.span,
                });
            }
        }
        Self { params, body, refs }
    }

    /// Splices the bound argument text into the body by walking the
    /// precomputed occurrence spans. Arguments are opaque: the result is
    /// never rescanned.
    pub fn apply(&self, args: &[String]) -> String {
        debug_assert_eq!(self.params.len(), args.len());
        let mut out = String::with_capacity(self.body.len());
        let mut pos = 0;
        for r in &self.refs {
            out.push_str(&self.body[pos..r.span.start]);
            out.push_str(&args[r.param]);
            pos = r.span.end;
        }
        out.push_str(&self.body[pos..]);
        out
    }
}

/// The two name maps of the translation engine. Redefinition of either kind
/// warns and replaces; lookups of missing names are left to the caller's
/// policy.
#[derive(Debug, Default)]
pub struct MacroTable {
    variables: HashMap<String, String>,
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    fn warn_redefined(&mut self, name: &str, line: usize, diag: &mut dyn DiagSink) {
        if self.variables.contains_key(name) || self.macros.contains_key(name) {
            diag.report(Diagnostic::new(
                line,
                format!("macro {} already defined!", name),
            ));
        }
    }

    pub fn define_variable(
        &mut self,
        name: &str,
        value: &str,
        line: usize,
        diag: &mut dyn DiagSink,
    ) {
        self.warn_redefined(name, line, diag);
        log::debug!("define variable {} = {}", name, value);
        self.macros.remove(name);
        self.variables.insert(name.to_owned(), value.to_owned());
    }

    pub fn define_macro(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: String,
        line: usize,
        diag: &mut dyn DiagSink,
    ) {
        self.warn_redefined(name, line, diag);
        log::debug!("define macro {}({})", name, params.join(", "));
        self.variables.remove(name);
        self.macros.insert(name.to_owned(), MacroDef::new(params, body));
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn lookup_macro(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.macros.clear();
    }
}
