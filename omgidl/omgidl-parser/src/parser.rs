//! OMG IDL parser.
//!
//! Hand-rolled statement structure over nom terminal parsers (see
//! [`crate::lex`]), producing the `omgidl-common` definition tree.
//!
//! # Supported grammar subset
//!
//! - `module`, `struct`, `enum`, `typedef`, `union … switch`, `const`
//! - primitive types including multi-word spellings (`unsigned long long`),
//!   `sequence<T>` / `sequence<T, N>`, `string<N>` / `wstring<N>`,
//!   multi-dimensional fixed arrays (`uint8 data[2][3]`)
//! - constant expressions: integers with `+`-sums over earlier constants
//!   and enumerators, floats, booleans, string literals
//! - annotations (`@id`, `@default`, `@value`, `@optional`, `@mutable`,
//!   `@appendable`, `@topic`); unknown annotations are kept but ignored
//! - `#include` and `import` directives (skipped)
//!
//! Interfaces, value types, bitmasks, and fixed-point types are not
//! supported and fail with a parse error.

use std::collections::HashMap;

use omgidl_common::{
    AnnotationValue, Annotations, CasePredicate, ConstValue, Constant, Definition, Enum, Field,
    Module, SchemaError, Struct, Typedef, Union, UnionCase, normalize_primitive,
    resolve_definitions,
};

use crate::lex::{
    float_lit, identifier, is_ident_continue, number, signed_int, skip_ws, string_lit,
};

/// Parse IDL source text into a resolved definition tree.
///
/// All type references are rewritten to fully qualified `::` names before
/// returning (see [`omgidl_common::resolve_definitions`]).
pub fn parse_idl(source: &str) -> Result<Vec<Definition>, SchemaError> {
    let mut parser = Parser::new(source);
    let mut definitions = parser.parse_definitions(true)?;
    resolve_definitions(&mut definitions);
    Ok(definitions)
}

/// A type expression as written at a field, typedef, or switch site.
struct TypeSpec {
    name: String,
    is_sequence: bool,
    sequence_bound: Option<usize>,
    string_upper_bound: Option<usize>,
}

struct Parser<'a> {
    src: &'a str,
    rest: &'a str,
    /// Constant environment for `const`/enumerator references in
    /// expressions. Enumerators register both `NAME` and `Enum::NAME`.
    constants: HashMap<String, ConstValue>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            src: source,
            rest: source,
            constants: HashMap::new(),
        }
    }

    // ── cursor helpers ───────────────────────────────────────────────────

    fn skip(&mut self) {
        self.rest = skip_ws(self.rest);
    }

    fn line(&self) -> usize {
        let consumed = self.src.len() - self.rest.len();
        self.src[..consumed].matches('\n').count() + 1
    }

    fn fail<T>(&self, msg: impl AsRef<str>) -> Result<T, SchemaError> {
        Err(SchemaError::Parse(format!(
            "line {}: {}",
            self.line(),
            msg.as_ref()
        )))
    }

    fn eat_char(&mut self, c: char) -> bool {
        self.skip();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), SchemaError> {
        if self.eat_char(c) {
            Ok(())
        } else {
            self.fail(format!("expected '{c}'"))
        }
    }

    /// Consume `kw` only when followed by a non-identifier character.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        self.skip();
        if let Some(rest) = self.rest.strip_prefix(kw)
            && !rest.chars().next().is_some_and(is_ident_continue)
        {
            self.rest = rest;
            return true;
        }
        false
    }

    fn take_identifier(&mut self) -> Result<String, SchemaError> {
        self.skip();
        match identifier(self.rest) {
            Ok((rest, id)) => {
                self.rest = rest;
                Ok(id.to_string())
            }
            Err(_) => self.fail("expected identifier"),
        }
    }

    fn take_number(&mut self) -> Result<usize, SchemaError> {
        self.skip();
        match number(self.rest) {
            Ok((rest, n)) => {
                self.rest = rest;
                Ok(n)
            }
            Err(_) => self.fail("expected number"),
        }
    }

    // ── definitions ──────────────────────────────────────────────────────

    fn parse_definitions(&mut self, top_level: bool) -> Result<Vec<Definition>, SchemaError> {
        let mut defs = Vec::new();
        loop {
            self.skip();
            if self.rest.is_empty() {
                if top_level {
                    return Ok(defs);
                }
                return self.fail("unexpected end of input inside module");
            }
            if self.rest.starts_with('}') {
                if top_level {
                    return self.fail("unmatched closing brace");
                }
                return Ok(defs);
            }
            if let Some(def) = self.parse_definition()? {
                defs.push(def);
            }
        }
    }

    fn parse_definition(&mut self) -> Result<Option<Definition>, SchemaError> {
        self.skip();
        if self.rest.starts_with("#include") {
            self.skip_include()?;
            return Ok(None);
        }
        if self.eat_keyword("import") {
            self.skip();
            match string_lit(self.rest) {
                Ok((rest, _)) => self.rest = rest,
                Err(_) => return self.fail("expected string after 'import'"),
            }
            self.expect_char(';')?;
            return Ok(None);
        }

        let annotations = self.parse_annotations()?;
        if self.eat_keyword("module") {
            self.parse_module().map(Some)
        } else if self.eat_keyword("struct") {
            self.parse_struct(annotations).map(Some)
        } else if self.eat_keyword("enum") {
            self.parse_enum().map(Some)
        } else if self.eat_keyword("union") {
            self.parse_union(annotations).map(Some)
        } else if self.eat_keyword("typedef") {
            self.parse_typedef().map(Some)
        } else if self.eat_keyword("const") {
            self.parse_const().map(Some)
        } else {
            let token: String = self.rest.chars().take(24).collect();
            self.fail(format!("expected a definition, found '{token}'"))
        }
    }

    fn skip_include(&mut self) -> Result<(), SchemaError> {
        self.rest = &self.rest["#include".len()..];
        self.skip();
        if self.rest.starts_with('"') {
            match string_lit(self.rest) {
                Ok((rest, _)) => self.rest = rest,
                Err(_) => return self.fail("malformed #include"),
            }
        } else if let Some(rest) = self.rest.strip_prefix('<') {
            match rest.find('>') {
                Some(i) => self.rest = &rest[i + 1..],
                None => return self.fail("malformed #include"),
            }
        } else {
            return self.fail("malformed #include");
        }
        Ok(())
    }

    fn parse_module(&mut self) -> Result<Definition, SchemaError> {
        let name = self.take_identifier()?;
        self.expect_char('{')?;
        let definitions = self.parse_definitions(false)?;
        self.expect_char('}')?;
        self.eat_char(';');
        Ok(Definition::Module(Module { name, definitions }))
    }

    fn parse_struct(&mut self, annotations: Annotations) -> Result<Definition, SchemaError> {
        let name = self.take_identifier()?;
        self.expect_char('{')?;
        let mut fields = Vec::new();
        loop {
            self.skip();
            if self.eat_char('}') {
                break;
            }
            let member_annotations = self.parse_annotations()?;
            fields.push(self.parse_field(member_annotations)?);
        }
        self.eat_char(';');
        Ok(Definition::Struct(Struct {
            name,
            fields,
            annotations,
        }))
    }

    fn parse_enum(&mut self) -> Result<Definition, SchemaError> {
        let name = self.take_identifier()?;
        self.expect_char('{')?;
        let mut enumerators = Vec::new();
        let mut current: i64 = -1;
        loop {
            self.skip();
            if self.eat_char('}') {
                break;
            }
            let mut annotations = self.parse_annotations()?;
            let member = self.take_identifier()?;
            // Some generators write `@value(n)` after the name.
            for (key, value) in self.parse_annotations()? {
                annotations.insert(key, value);
            }
            let explicit = annotations.get("value").and_then(|v| match v {
                AnnotationValue::Const(c) => c.as_int(),
                AnnotationValue::Flag => None,
            });
            current = match explicit {
                Some(v) => v,
                None => current + 1,
            };
            self.constants
                .insert(member.clone(), ConstValue::Int(current));
            self.constants
                .insert(format!("{name}::{member}"), ConstValue::Int(current));
            enumerators.push(Constant {
                name: member,
                ty: "uint32".to_string(),
                value: ConstValue::Int(current),
                annotations,
            });
            if self.eat_char(',') {
                continue;
            }
            self.expect_char('}')?;
            break;
        }
        self.eat_char(';');
        Ok(Definition::Enum(Enum { name, enumerators }))
    }

    fn parse_typedef(&mut self) -> Result<Definition, SchemaError> {
        let ty = self.parse_type()?;
        let name = self.take_identifier()?;
        let array_lengths = self.parse_array_dims()?;
        self.expect_char(';')?;
        Ok(Definition::Typedef(Typedef {
            name,
            ty: ty.name,
            array_lengths,
            is_sequence: ty.is_sequence,
            sequence_bound: ty.sequence_bound,
            string_upper_bound: ty.string_upper_bound,
        }))
    }

    fn parse_union(&mut self, annotations: Annotations) -> Result<Definition, SchemaError> {
        let name = self.take_identifier()?;
        if !self.eat_keyword("switch") {
            return self.fail("expected 'switch'");
        }
        self.expect_char('(')?;
        let switch = self.parse_type()?;
        if switch.is_sequence || switch.string_upper_bound.is_some() {
            return self.fail("union switch type must be a scalar");
        }
        self.expect_char(')')?;
        self.expect_char('{')?;

        let mut cases = Vec::new();
        let mut default = None;
        loop {
            self.skip();
            if self.eat_char('}') {
                break;
            }
            let mut predicates = Vec::new();
            let mut is_default = false;
            loop {
                if self.eat_keyword("case") {
                    let value = self.const_expr()?;
                    predicates.push(match value {
                        ConstValue::Int(v) => CasePredicate::Int(v),
                        ConstValue::Bool(v) => CasePredicate::Bool(v),
                        _ => return self.fail("union case label must be an integer or boolean"),
                    });
                    self.expect_char(':')?;
                } else if self.eat_keyword("default") {
                    self.expect_char(':')?;
                    if is_default || default.is_some() {
                        return self.fail("duplicate default case");
                    }
                    is_default = true;
                } else {
                    break;
                }
            }
            if predicates.is_empty() && !is_default {
                return self.fail("expected 'case' or 'default'");
            }
            let member_annotations = self.parse_annotations()?;
            let field = self.parse_field(member_annotations)?;
            if is_default {
                default = Some(field.clone());
            }
            if !predicates.is_empty() {
                cases.push(UnionCase { predicates, field });
            }
        }
        self.eat_char(';');
        Ok(Definition::Union(Union {
            name,
            switch_type: switch.name,
            cases,
            default,
            annotations,
        }))
    }

    fn parse_const(&mut self) -> Result<Definition, SchemaError> {
        let ty = self.parse_type()?;
        let name = self.take_identifier()?;
        self.expect_char('=')?;
        let value = self.const_expr()?;
        self.expect_char(';')?;
        self.constants.insert(name.clone(), value.clone());
        Ok(Definition::Constant(Constant {
            name,
            ty: ty.name,
            value,
            annotations: Annotations::new(),
        }))
    }

    // ── members ──────────────────────────────────────────────────────────

    fn parse_field(&mut self, annotations: Annotations) -> Result<Field, SchemaError> {
        let ty = self.parse_type()?;
        let name = self.take_identifier()?;
        let array_lengths = self.parse_array_dims()?;
        self.expect_char(';')?;
        Ok(Field {
            name,
            ty: ty.name,
            array_lengths,
            is_sequence: ty.is_sequence,
            sequence_bound: ty.sequence_bound,
            string_upper_bound: ty.string_upper_bound,
            annotations,
        })
    }

    fn parse_array_dims(&mut self) -> Result<Vec<usize>, SchemaError> {
        let mut dims = Vec::new();
        while self.eat_char('[') {
            dims.push(self.take_number()?);
            self.expect_char(']')?;
        }
        Ok(dims)
    }

    // ── types ────────────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<TypeSpec, SchemaError> {
        self.skip();
        if self.eat_keyword("sequence") {
            self.expect_char('<')?;
            let elem = self.parse_type()?;
            if elem.is_sequence {
                // A sequence of sequences cannot be represented (nor can
                // it be composed through typedefs).
                return Err(SchemaError::UnsupportedComposition("sequence".to_string()));
            }
            let bound = if self.eat_char(',') {
                Some(self.take_number()?)
            } else {
                None
            };
            self.expect_char('>')?;
            return Ok(TypeSpec {
                name: elem.name,
                is_sequence: true,
                sequence_bound: bound,
                string_upper_bound: elem.string_upper_bound,
            });
        }
        if self.eat_keyword("string") {
            return self.string_spec("string");
        }
        if self.eat_keyword("wstring") {
            return self.string_spec("wstring");
        }

        // Multi-word primitive spellings, longest first.
        if self.eat_keyword("unsigned") {
            let spelling = if self.eat_keyword("short") {
                "unsigned short"
            } else if self.eat_keyword("long") {
                if self.eat_keyword("long") {
                    "unsigned long long"
                } else {
                    "unsigned long"
                }
            } else {
                return self.fail("expected 'short' or 'long' after 'unsigned'");
            };
            return Ok(scalar_spec(normalize_primitive(spelling)));
        }
        if self.eat_keyword("long") {
            let spelling = if self.eat_keyword("long") {
                "long long"
            } else if self.eat_keyword("double") {
                "long double"
            } else {
                "long"
            };
            return Ok(scalar_spec(normalize_primitive(spelling)));
        }
        for spelling in ["short", "double", "float"] {
            if self.eat_keyword(spelling) {
                return Ok(scalar_spec(normalize_primitive(spelling)));
            }
        }

        let name = self.take_scoped_name(true)?;
        Ok(scalar_spec(normalize_primitive(&name)))
    }

    fn string_spec(&mut self, base: &str) -> Result<TypeSpec, SchemaError> {
        let bound = if self.eat_char('<') {
            let n = self.take_number()?;
            self.expect_char('>')?;
            Some(n)
        } else {
            None
        };
        Ok(TypeSpec {
            name: base.to_string(),
            is_sequence: false,
            sequence_bound: None,
            string_upper_bound: bound,
        })
    }

    /// Parse `A`, `A::B::C`, and (when `allow_global`) `::A::B`.
    fn take_scoped_name(&mut self, allow_global: bool) -> Result<String, SchemaError> {
        self.skip();
        let mut name = String::new();
        if allow_global && let Some(rest) = self.rest.strip_prefix("::") {
            name.push_str("::");
            self.rest = rest;
        }
        loop {
            name.push_str(&self.take_identifier()?);
            self.skip();
            match self.rest.strip_prefix("::") {
                Some(rest) => {
                    name.push_str("::");
                    self.rest = rest;
                }
                None => break,
            }
        }
        Ok(name)
    }

    // ── annotations ──────────────────────────────────────────────────────

    fn parse_annotations(&mut self) -> Result<Annotations, SchemaError> {
        let mut annotations = Annotations::new();
        loop {
            self.skip();
            let Some(rest) = self.rest.strip_prefix('@') else {
                return Ok(annotations);
            };
            self.rest = rest;
            let name = self.take_identifier()?;
            if self.eat_char('(') {
                let value = self.parse_annotation_arg()?;
                annotations.insert(name, AnnotationValue::Const(value));
            } else {
                annotations.insert(name, AnnotationValue::Flag);
            }
        }
    }

    /// Parse an annotation argument up to and including the closing paren.
    ///
    /// Arguments that do not evaluate as constant expressions (e.g. named
    /// parameter lists of vendor annotations) are preserved as raw text.
    fn parse_annotation_arg(&mut self) -> Result<ConstValue, SchemaError> {
        let checkpoint = self.rest;
        if let Ok(value) = self.const_expr() {
            self.skip();
            if let Some(rest) = self.rest.strip_prefix(')') {
                self.rest = rest;
                return Ok(value);
            }
        }
        self.rest = checkpoint;

        let mut depth = 1usize;
        for (i, c) in self.rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let raw = self.rest[..i].trim().to_string();
                        self.rest = &self.rest[i + 1..];
                        return Ok(ConstValue::String(raw));
                    }
                }
                _ => {}
            }
        }
        self.fail("unterminated annotation argument")
    }

    // ── constant expressions ─────────────────────────────────────────────

    fn const_expr(&mut self) -> Result<ConstValue, SchemaError> {
        self.skip();
        if self.rest.starts_with('"') {
            match string_lit(self.rest) {
                Ok((rest, s)) => {
                    self.rest = rest;
                    return Ok(ConstValue::String(s));
                }
                Err(_) => return self.fail("malformed string literal"),
            }
        }
        if self.eat_keyword("TRUE") {
            return Ok(ConstValue::Bool(true));
        }
        if self.eat_keyword("FALSE") {
            return Ok(ConstValue::Bool(false));
        }
        if let Ok((rest, f)) = float_lit(self.rest) {
            self.rest = rest;
            return Ok(ConstValue::Float(f));
        }

        // Integer atoms joined by '+'.
        let mut total = self.const_atom()?;
        loop {
            self.skip();
            if self.eat_char('+') {
                total += self.const_atom()?;
            } else {
                return Ok(ConstValue::Int(total));
            }
        }
    }

    fn const_atom(&mut self) -> Result<i64, SchemaError> {
        self.skip();
        if let Ok((rest, v)) = signed_int(self.rest) {
            self.rest = rest;
            return Ok(v);
        }
        let name = self.take_scoped_name(false)?;
        match self.constants.get(&name) {
            Some(ConstValue::Int(v)) => Ok(*v),
            Some(_) => self.fail(format!("identifier '{name}' does not evaluate to an integer")),
            None => self.fail(format!("unknown identifier '{name}'")),
        }
    }
}

fn scalar_spec(name: &str) -> TypeSpec {
    TypeSpec {
        name: name.to_string(),
        is_sequence: false,
        sequence_bound: None,
        string_upper_bound: None,
    }
}
