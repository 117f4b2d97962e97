//! Declaration grammar and the per-context declaration registry.
//!
//! Grammar: `[class] type ['[' n ']'] [name]`, where `name` is
//! `[namespace:][table:]var`. Declarations are stored in an arena so that a
//! parameter bound against an older declaration keeps a valid reference after
//! the name is redeclared (or corrected for a new color sample count).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::RibError;
use crate::token::{TokenId, TokenMap};
use crate::types::{BasicType, DeclType, StorageClass};

/// Index of a declaration in its registry's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeclId(usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    /// Fully qualified name as registered, e.g. `limits:bucketsize`.
    pub token: TokenId,
    pub namespace: Option<TokenId>,
    pub table: Option<TokenId>,
    pub var: TokenId,
    pub class: StorageClass,
    pub ty: DeclType,
    pub basic: BasicType,
    pub array_size: usize,
    pub elem_size: usize,
    pub inline: bool,
    pub default: bool,
}

impl Declaration {
    /// Rebuild the element size for `color_samples`, if the type depends on it.
    fn resized(&self, color_samples: usize) -> Result<Declaration, RibError> {
        let elem_size = elem_size(self.ty, self.array_size, color_samples).ok_or_else(|| {
            RibError::type_error(
                0,
                format!(
                    "{}[{}] is too large for {} color samples",
                    self.ty, self.array_size, color_samples
                ),
            )
        })?;
        Ok(Declaration {
            elem_size,
            ..self.clone()
        })
    }

    pub fn matches_color(&self, color_samples: usize) -> bool {
        self.ty != DeclType::Color
            || color_samples.checked_mul(self.array_size) == Some(self.elem_size)
    }
}

fn elem_size(ty: DeclType, array_size: usize, color_samples: usize) -> Option<usize> {
    ty.size(color_samples).checked_mul(array_size)
}

/// The parsed pieces of a grammar string, before names are interned.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclGrammar {
    pub class: StorageClass,
    pub ty: DeclType,
    pub array_size: usize,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName<'a> {
    pub namespace: Option<&'a str>,
    pub table: Option<&'a str>,
    pub var: &'a str,
}

impl<'a> QualifiedName<'a> {
    pub fn parse(name: &'a str) -> Result<Self, RibError> {
        let parts: Vec<&str> = name.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(RibError::syntax(
                0,
                format!("malformed qualified name '{}'", name),
            ));
        }
        match parts.as_slice() {
            [var] => Ok(QualifiedName {
                namespace: None,
                table: None,
                var: *var,
            }),
            [table, var] => Ok(QualifiedName {
                namespace: None,
                table: Some(*table),
                var: *var,
            }),
            [namespace, table, var] => Ok(QualifiedName {
                namespace: Some(*namespace),
                table: Some(*table),
                var: *var,
            }),
            _ => Err(RibError::syntax(
                0,
                format!("too many ':' separators in '{}'", name),
            )),
        }
    }

    pub fn joined(&self) -> String {
        match (self.namespace, self.table) {
            (Some(ns), Some(table)) => format!("{}:{}:{}", ns, table, self.var),
            (None, Some(table)) => format!("{}:{}", table, self.var),
            _ => self.var.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Word(&'a str),
    Open,
    Close,
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() || c == '[' || c == ']' {
            if let Some(s) = start.take() {
                out.push(Piece::Word(&text[s..i]));
            }
            match c {
                '[' => out.push(Piece::Open),
                ']' => out.push(Piece::Close),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Piece::Word(&text[s..]));
    }
    out
}

impl DeclGrammar {
    pub fn parse(text: &str) -> Result<Self, RibError> {
        let pieces = pieces(text);
        let mut it = pieces.iter().peekable();

        let mut class = StorageClass::Uniform;
        if let Some(Piece::Word(w)) = it.peek() {
            if let Some(c) = StorageClass::from_keyword(w) {
                class = c;
                it.next();
            }
        }

        let ty = match it.next() {
            Some(Piece::Word(w)) => DeclType::from_keyword(w).ok_or_else(|| {
                RibError::syntax(0, format!("unknown type '{}' in declaration '{}'", w, text))
            })?,
            _ => {
                return Err(RibError::syntax(
                    0,
                    format!("missing type in declaration '{}'", text),
                ))
            }
        };

        let mut array_size = 1;
        if it.peek() == Some(&&Piece::Open) {
            it.next();
            array_size = match it.next() {
                Some(Piece::Word(n)) => n.parse::<usize>().map_err(|_| {
                    RibError::syntax(0, format!("invalid array size '{}' in '{}'", n, text))
                })?,
                _ => {
                    return Err(RibError::syntax(
                        0,
                        format!("missing array size in '{}'", text),
                    ))
                }
            };
            if it.next() != Some(&Piece::Close) {
                return Err(RibError::syntax(0, format!("missing ']' in '{}'", text)));
            }
            if array_size == 0 {
                return Err(RibError::syntax(
                    0,
                    format!("array size must be at least 1 in '{}'", text),
                ));
            }
        }

        let name = match it.next() {
            Some(Piece::Word(w)) => Some((*w).to_owned()),
            None => None,
            Some(_) => {
                return Err(RibError::syntax(
                    0,
                    format!("unexpected bracket in declaration '{}'", text),
                ))
            }
        };
        if it.next().is_some() {
            return Err(RibError::syntax(
                0,
                format!("trailing input in declaration '{}'", text),
            ));
        }

        Ok(DeclGrammar {
            class,
            ty,
            array_size,
            name,
        })
    }
}

/// True if a parameter name carries its own declaration.
pub fn is_inline(name: &str) -> bool {
    name.trim().contains(|c: char| c.is_whitespace() || c == '[')
}

fn build(
    tokens: &mut TokenMap,
    grammar: &DeclGrammar,
    name: &str,
    color_samples: usize,
    inline: bool,
    default: bool,
) -> Result<Declaration, RibError> {
    let qualified = QualifiedName::parse(name)?;
    let token = tokens.find_or_create(&qualified.joined())?;
    let namespace = qualified
        .namespace
        .map(|n| tokens.find_or_create(n))
        .transpose()?;
    let table = qualified
        .table
        .map(|t| tokens.find_or_create(t))
        .transpose()?;
    let var = tokens.find_or_create(qualified.var)?;
    let elem_size =
        elem_size(grammar.ty, grammar.array_size, color_samples).ok_or_else(|| {
            RibError::syntax(
                0,
                format!(
                    "array size {} of '{}' is too large",
                    grammar.array_size, name
                ),
            )
        })?;
    Ok(Declaration {
        token,
        namespace,
        table,
        var,
        class: grammar.class,
        ty: grammar.ty,
        basic: grammar.ty.basic_type(),
        array_size: grammar.array_size,
        elem_size,
        inline,
        default,
    })
}

/// Parse an inline declaration such as `"varying float[2] st"`.
///
/// The result is not registered; it belongs to the parameter that named it.
pub fn parse_inline(
    tokens: &mut TokenMap,
    text: &str,
    color_samples: usize,
) -> Result<Declaration, RibError> {
    let grammar = DeclGrammar::parse(text)?;
    let name = grammar.name.clone().ok_or_else(|| {
        RibError::syntax(0, format!("inline declaration '{}' has no name", text))
    })?;
    build(tokens, &grammar, &name, color_samples, true, false)
}

#[derive(Debug, Default)]
pub struct DeclarationRegistry {
    arena: Vec<Declaration>,
    active: HashMap<TokenId, DeclId>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard parameter declarations.
    pub fn with_defaults(tokens: &mut TokenMap, color_samples: usize) -> Result<Self, RibError> {
        let mut reg = Self::new();
        for (name, grammar) in DEFAULT_DECLARATIONS {
            reg.declare(tokens, name, grammar, color_samples, true)?;
        }
        Ok(reg)
    }

    /// Register a standalone declaration, replacing the active entry for
    /// `name`. The replaced declaration stays in the arena.
    pub fn declare(
        &mut self,
        tokens: &mut TokenMap,
        name: &str,
        grammar: &str,
        color_samples: usize,
        default: bool,
    ) -> Result<TokenId, RibError> {
        if name.trim().is_empty() {
            return Err(RibError::syntax(
                0,
                format!("declaration '{}' needs a name", grammar),
            ));
        }
        let parsed = DeclGrammar::parse(grammar)?;
        if let Some(embedded) = &parsed.name {
            if embedded != name {
                return Err(RibError::syntax(
                    0,
                    format!(
                        "declaration of '{}' names a different parameter '{}'",
                        name, embedded
                    ),
                ));
            }
        }
        let decl = build(tokens, &parsed, name, color_samples, false, default)?;
        let token = decl.token;
        let id = self.push(decl);
        self.active.insert(token, id);
        Ok(token)
    }

    fn push(&mut self, decl: Declaration) -> DeclId {
        self.arena.push(decl);
        DeclId(self.arena.len() - 1)
    }

    pub fn get(&self, id: DeclId) -> Option<&Declaration> {
        self.arena.get(id.0)
    }

    /// Active declaration for an exact (already qualified) name.
    pub fn find(&self, token: TokenId) -> Option<DeclId> {
        self.active.get(&token).copied()
    }

    /// Active declaration for `token`, corrected for `color_samples`.
    ///
    /// If the stored declaration was sized for a different color sample count
    /// a corrected copy is registered and returned; the old one stays alive.
    pub fn find_for_color(
        &mut self,
        token: TokenId,
        color_samples: usize,
    ) -> Result<Option<DeclId>, RibError> {
        let Some(id) = self.find(token) else {
            return Ok(None);
        };
        let decl = &self.arena[id.0];
        if decl.matches_color(color_samples) {
            return Ok(Some(id));
        }
        let corrected = decl.resized(color_samples)?;
        let new_id = self.push(corrected);
        self.active.insert(token, new_id);
        Ok(Some(new_id))
    }

    /// Resolve `var` in the scope of `namespace` and `table`.
    ///
    /// Tries `namespace:table:var`, then `table:var`, then `var`; the first
    /// registered name wins.
    pub fn lookup(
        &mut self,
        tokens: &TokenMap,
        namespace: Option<&str>,
        table: Option<&str>,
        var: &str,
        color_samples: usize,
    ) -> Result<Option<DeclId>, RibError> {
        let mut candidates = Vec::with_capacity(3);
        if let (Some(ns), Some(t)) = (namespace, table) {
            candidates.push(format!("{}:{}:{}", ns, t, var));
        }
        if let Some(t) = table {
            candidates.push(format!("{}:{}", t, var));
        }
        candidates.push(var.to_owned());
        for token in candidates.iter().filter_map(|c| tokens.find(c)) {
            if let Some(id) = self.find_for_color(token, color_samples)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Every declaration ever created in this registry, superseded ones
    /// included.
    pub fn history(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.arena.iter().enumerate().map(|(i, d)| (DeclId(i), d))
    }

    pub fn history_len(&self) -> usize {
        self.arena.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

const DEFAULT_DECLARATIONS: &[(&str, &str)] = &[
    ("P", "vertex point"),
    ("Pz", "vertex float"),
    ("Pw", "vertex hpoint"),
    ("N", "varying normal"),
    ("Np", "uniform normal"),
    ("Cs", "varying color"),
    ("Os", "varying color"),
    ("s", "varying float"),
    ("t", "varying float"),
    ("st", "varying float[2]"),
    ("width", "varying float"),
    ("constantwidth", "constant float"),
    ("Ka", "uniform float"),
    ("Kd", "uniform float"),
    ("Ks", "uniform float"),
    ("Kr", "uniform float"),
    ("roughness", "uniform float"),
    ("intensity", "uniform float"),
    ("coneangle", "uniform float"),
    ("conedeltaangle", "uniform float"),
    ("beamdistribution", "uniform float"),
    ("fov", "uniform float"),
    ("lightcolor", "uniform color"),
    ("specularcolor", "uniform color"),
    ("from", "uniform point"),
    ("to", "uniform point"),
    ("texturename", "uniform string"),
    ("name", "uniform string"),
    ("origin", "uniform integer[2]"),
    ("searchpath:shader", "uniform string"),
    ("searchpath:texture", "uniform string"),
    ("searchpath:archive", "uniform string"),
    ("limits:bucketsize", "uniform integer[2]"),
    ("limits:gridsize", "uniform integer"),
    ("identifier:name", "uniform string"),
    ("trimcurve:sense", "uniform string"),
    ("dice:binary", "uniform integer"),
];
