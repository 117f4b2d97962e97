//! Parameter-list binding: raw `(name, value)` pairs become typed,
//! cardinality-checked parameters.

use std::collections::HashMap;

use serde::Serialize;

use crate::declaration::{self, DeclId, Declaration, DeclarationRegistry, QualifiedName};
use crate::error::RibError;
use crate::raw::{RawParameter, RawValues};
use crate::token::{TokenId, TokenMap};
use crate::types::{BasicType, ParamCounts};

/// Who owns a parameter's declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclRef {
    /// Inline declaration; dropped with the parameter.
    Owned(Box<Declaration>),
    /// Entry of the context's registry.
    Registered(DeclId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Values {
    Integers(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Integers(v) => v.len(),
            Values::Floats(v) => v.len(),
            Values::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view(&self) -> ValuesRef<'_> {
        match self {
            Values::Integers(v) => ValuesRef::Integers(v),
            Values::Floats(v) => ValuesRef::Floats(v),
            Values::Strings(v) => ValuesRef::Strings(v),
        }
    }
}

/// Borrowed view of a parameter's values, as handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValuesRef<'a> {
    Integers(&'a [i32]),
    Floats(&'a [f32]),
    Strings(&'a [String]),
}

impl ValuesRef<'_> {
    pub fn to_values(self) -> Values {
        match self {
            ValuesRef::Integers(v) => Values::Integers(v.to_vec()),
            ValuesRef::Floats(v) => Values::Floats(v.to_vec()),
            ValuesRef::Strings(v) => Values::Strings(v.to_vec()),
        }
    }

    /// The values as an array slot, as if they had arrived on `line`.
    pub fn to_raw(self, line: u32) -> RawParameter {
        let values = match self {
            ValuesRef::Integers(v) => RawValues::Integers(v.to_vec()),
            ValuesRef::Floats(v) => RawValues::Floats(v.to_vec()),
            ValuesRef::Strings(v) => RawValues::Strings(v.to_vec()),
        };
        RawParameter {
            values,
            is_array: true,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Qualified name of the declaration; a list holds one parameter per
    /// token.
    pub token: TokenId,
    /// Name that binds to the same declaration again: the registered name,
    /// or the inline declaration as written.
    pub spelling: TokenId,
    pub decl: DeclRef,
    /// Index of the name/value pair in the call that supplied it.
    pub position: usize,
    pub values: Values,
}

impl Parameter {
    pub fn declaration<'r>(&'r self, registry: &'r DeclarationRegistry) -> Option<&'r Declaration> {
        match &self.decl {
            DeclRef::Owned(d) => Some(&**d),
            DeclRef::Registered(id) => registry.get(*id),
        }
    }
}

/// Parallel token/value arrays of a bound list, in list order.
///
/// `names` can be handed back to [`Binder::bind`] with the values to rebuild
/// the same list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamSnapshot<'a> {
    pub tokens: Vec<TokenId>,
    pub names: Vec<&'a str>,
    pub values: Vec<ValuesRef<'a>>,
}

impl<'a> ParamSnapshot<'a> {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Owned name/slot pairs for forwarding the list through another bind.
    pub fn to_raw(&self, line: u32) -> Vec<(String, RawParameter)> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(name, values)| ((*name).to_owned(), values.to_raw(line)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<ValuesRef<'a>> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList {
    params: Vec<Parameter>,
    index: HashMap<TokenId, usize>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, name: TokenId) -> Option<&Parameter> {
        self.index.get(&name).map(|&i| &self.params[i])
    }

    /// Insert, replacing an earlier parameter of the same name in place.
    pub fn insert(&mut self, param: Parameter) {
        match self.index.get(&param.token) {
            Some(&i) => self.params[i] = param,
            None => {
                self.index.insert(param.token, self.params.len());
                self.params.push(param);
            }
        }
    }

    pub fn snapshot<'a>(&'a self, tokens: &'a TokenMap) -> ParamSnapshot<'a> {
        let mut snap = ParamSnapshot::default();
        for p in &self.params {
            snap.tokens.push(p.token);
            snap.names.push(tokens.name_or_empty(p.spelling));
            snap.values.push(p.values.view());
        }
        snap
    }
}

/// Table scope of a lookup, e.g. `Option "limits" "gridsize" 32` looks up
/// `gridsize` in table `limits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindScope<'a> {
    pub namespace: Option<&'a str>,
    pub table: Option<&'a str>,
}

impl<'a> BindScope<'a> {
    pub fn table(table: &'a str) -> Self {
        BindScope {
            namespace: None,
            table: Some(table),
        }
    }
}

/// Replace or merge semantics of a bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Set,
    Add,
}

pub struct Binder<'c> {
    pub tokens: &'c mut TokenMap,
    pub registry: &'c mut DeclarationRegistry,
    pub color_samples: usize,
    pub strict: bool,
}

impl Binder<'_> {
    /// Bind `pairs` into `list`.
    ///
    /// Offending parameters are dropped and returned as recoverable errors;
    /// the outer `Err` is reserved for resource exhaustion.
    pub fn bind(
        &mut self,
        list: &mut ParameterList,
        pairs: &[(&str, &RawParameter)],
        counts: &ParamCounts,
        scope: BindScope<'_>,
        merge: Merge,
    ) -> Result<Vec<RibError>, RibError> {
        if merge == Merge::Set {
            list.clear();
        }
        let mut errors = Vec::new();
        for (position, (name, raw)) in pairs.iter().enumerate() {
            match self.bind_one(name, raw, position, counts, scope) {
                Ok(param) => list.insert(param),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => errors.push(e.at_line(raw.line)),
            }
        }
        Ok(errors)
    }

    fn bind_one(
        &mut self,
        name: &str,
        raw: &RawParameter,
        position: usize,
        counts: &ParamCounts,
        scope: BindScope<'_>,
    ) -> Result<Parameter, RibError> {
        let decl_ref = if declaration::is_inline(name) {
            DeclRef::Owned(Box::new(declaration::parse_inline(
                self.tokens,
                name,
                self.color_samples,
            )?))
        } else {
            DeclRef::Registered(self.resolve(name, scope)?)
        };
        let decl = match &decl_ref {
            DeclRef::Owned(d) => d.as_ref(),
            DeclRef::Registered(id) => self
                .registry
                .get(*id)
                .ok_or_else(|| RibError::bad(raw.line, format!("dangling declaration for '{}'", name)))?,
        };

        let values = convert(decl, raw, name)?;
        if self.strict {
            let expected = decl
                .class
                .count(counts)
                .checked_mul(decl.elem_size)
                .ok_or_else(|| {
                    RibError::type_error(
                        raw.line,
                        format!("parameter '{}' expects more values than can be counted", name),
                    )
                })?;
            if values.len() != expected {
                return Err(RibError::type_error(
                    raw.line,
                    format!(
                        "parameter '{}' ({} {}) expects {} values, got {}",
                        name,
                        decl.class,
                        decl.ty,
                        expected,
                        values.len()
                    ),
                ));
            }
        }

        let token = decl.token;
        let spelling = match &decl_ref {
            DeclRef::Owned(_) => self.tokens.find_or_create(name.trim())?,
            DeclRef::Registered(_) => token,
        };
        Ok(Parameter {
            token,
            spelling,
            decl: decl_ref,
            position,
            values,
        })
    }

    fn resolve(&mut self, name: &str, scope: BindScope<'_>) -> Result<DeclId, RibError> {
        let q = QualifiedName::parse(name)?;
        let (namespace, table) = if q.table.is_some() {
            (q.namespace, q.table)
        } else {
            (scope.namespace, scope.table)
        };
        self.registry
            .lookup(self.tokens, namespace, table, q.var, self.color_samples)?
            .ok_or_else(|| RibError::type_error(0, format!("undeclared parameter '{}'", name)))
    }
}

fn convert(decl: &Declaration, raw: &RawParameter, name: &str) -> Result<Values, RibError> {
    let mismatch = || {
        RibError::type_error(
            raw.line,
            format!(
                "parameter '{}' is declared {} but was given {} values",
                name,
                decl.basic,
                raw.basic_type()
            ),
        )
    };
    match decl.basic {
        BasicType::Float => raw.as_floats().map(Values::Floats).ok_or_else(mismatch),
        BasicType::Integer => raw.as_ints().map(Values::Integers).ok_or_else(mismatch),
        BasicType::String => raw
            .as_strings()
            .map(|s| Values::Strings(s.to_vec()))
            .ok_or_else(mismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageClass;

    fn setup() -> (TokenMap, DeclarationRegistry) {
        let mut tokens = TokenMap::new();
        let reg = DeclarationRegistry::with_defaults(&mut tokens, 3).unwrap();
        (tokens, reg)
    }

    #[test]
    fn set_replaces_and_add_merges() {
        let (mut tokens, mut registry) = setup();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: true,
        };
        let mut list = ParameterList::new();
        let kd = RawParameter::float(0.5, 1);
        let ks = RawParameter::float(0.25, 1);
        let kd2 = RawParameter::float(0.75, 2);
        let counts = ParamCounts::default();

        let errs = binder
            .bind(&mut list, &[("Kd", &kd)], &counts, BindScope::default(), Merge::Set)
            .unwrap();
        assert!(errs.is_empty());
        binder
            .bind(&mut list, &[("Ks", &ks), ("Kd", &kd2)], &counts, BindScope::default(), Merge::Add)
            .unwrap();
        assert_eq!(list.len(), 2);
        let kd_tok = binder.tokens.find("Kd").unwrap();
        assert_eq!(list.get(kd_tok).unwrap().values, Values::Floats(vec![0.75]));

        binder
            .bind(&mut list, &[("Ks", &ks)], &counts, BindScope::default(), Merge::Set)
            .unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.get(kd_tok).is_none());
    }

    #[test]
    fn inline_declarations_are_owned() {
        let (mut tokens, mut registry) = setup();
        let before = registry.history_len();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: true,
        };
        let mut list = ParameterList::new();
        let raw = RawParameter::floats(vec![1.0, 2.0], 1);
        let errs = binder
            .bind(
                &mut list,
                &[("constant float[2] myparam", &raw)],
                &ParamCounts::default(),
                BindScope::default(),
                Merge::Set,
            )
            .unwrap();
        assert!(errs.is_empty());
        let p = list.iter().next().unwrap();
        match &p.decl {
            DeclRef::Owned(d) => {
                assert!(d.inline);
                assert_eq!(d.class, StorageClass::Constant);
            }
            DeclRef::Registered(_) => panic!("inline declaration was registered"),
        }
        assert_eq!(registry.history_len(), before);
    }

    #[test]
    fn string_declaration_rejects_numbers() {
        let (mut tokens, mut registry) = setup();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: true,
        };
        let mut list = ParameterList::new();
        let raw = RawParameter::float(1.0, 5);
        let errs = binder
            .bind(&mut list, &[("texturename", &raw)], &ParamCounts::default(), BindScope::default(), Merge::Set)
            .unwrap();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line(), 5);
        assert!(list.is_empty());
    }

    #[test]
    fn qualified_names_are_distinct_parameters() {
        let (mut tokens, mut registry) = setup();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: true,
        };
        let mut list = ParameterList::new();
        let a = RawParameter::string("a", 1);
        let b = RawParameter::string("b", 1);
        let errs = binder
            .bind(
                &mut list,
                &[("name", &a), ("identifier:name", &b)],
                &ParamCounts::default(),
                BindScope::default(),
                Merge::Set,
            )
            .unwrap();
        assert!(errs.is_empty());
        assert_eq!(list.len(), 2);
        let qualified = binder.tokens.find("identifier:name").unwrap();
        assert_eq!(list.get(qualified).unwrap().values, Values::Strings(vec!["b".into()]));
    }

    #[test]
    fn oversized_expected_count_is_a_type_error() {
        let (mut tokens, mut registry) = setup();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: true,
        };
        let mut list = ParameterList::new();
        let raw = RawParameter::floats(vec![1.0], 3);
        let errs = binder
            .bind(
                &mut list,
                &[("vertex float[10000000000] q", &raw)],
                &ParamCounts::uniform(usize::MAX / 2, usize::MAX / 2),
                BindScope::default(),
                Merge::Set,
            )
            .unwrap();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code(), crate::error::ErrorCode::Type);
        assert_eq!(errs[0].line(), 3);
        assert!(list.is_empty());
    }

    #[test]
    fn lenient_binding_skips_count_check() {
        let (mut tokens, mut registry) = setup();
        let mut binder = Binder {
            tokens: &mut tokens,
            registry: &mut registry,
            color_samples: 3,
            strict: false,
        };
        let mut list = ParameterList::new();
        let raw = RawParameter::floats(vec![0.0, 1.0], 1);
        let errs = binder
            .bind(&mut list, &[("P", &raw)], &ParamCounts::quadric(), BindScope::default(), Merge::Set)
            .unwrap();
        assert!(errs.is_empty());
        assert_eq!(list.len(), 1);
    }
}
