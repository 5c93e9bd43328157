//! Single-pass recursive-descent parser and code generator.
//!
//! There is no separate AST, semantic-analysis, or optimization pass: every
//! production emits bytecode into the [`Program`] as it recognizes the
//! grammar, exactly as the original tool's `parse_*` functions do. Forward
//! jumps are backpatched by code-arena index instead of by raw pointer.

use mcc_lex::{Token, TokenKind};
use mcc_util::{DataType, McccError, Opcode, Program, Symbol, SymbolClass};

use crate::listing::Listing;
use crate::symtab::{install_sys_calls, SymbolTable};

/// Result of a successful parse: the compiled program, plus the `-s`
/// disassembly text when a listing was requested.
pub struct ParseOutput {
    pub program: Program,
    pub listing: Option<String>,
}

/// Parses a complete token stream into a [`Program`].
///
/// `want_listing` mirrors the `-s` flag: when set, a disassembly is
/// accumulated alongside code generation and returned in
/// [`ParseOutput::listing`].
pub fn parse(tokens: Vec<Token>, want_listing: bool) -> Result<ParseOutput, McccError> {
    let mut parser = Parser::new(tokens, want_listing);
    parser.parse_program()?;
    let Parser {
        program, listing, ..
    } = parser;
    let listing = listing.map(|l| l.finish(&program.code));
    Ok(ParseOutput { program, listing })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    table: SymbolTable,
    program: Program,
    expr_type: DataType,
    bp_index: i64,
    listing: Option<Listing>,
}

impl Parser {
    fn new(tokens: Vec<Token>, want_listing: bool) -> Self {
        let mut table = SymbolTable::new();
        install_sys_calls(&mut table);
        Parser {
            tokens,
            pos: 0,
            table,
            program: Program::new(),
            expr_type: DataType::INT,
            bp_index: 0,
            listing: if want_listing {
                Some(Listing::new())
            } else {
                None
            },
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn cur_lexeme(&self) -> String {
        self.cur().lexeme.clone().unwrap_or_default()
    }

    fn advance(&mut self) {
        let prev_line = self.cur_line();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        let new_line = self.cur_line();
        if new_line != prev_line {
            if let Some(listing) = self.listing.as_mut() {
                listing.on_advance(new_line, &self.program.code);
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), McccError> {
        if self.cur_kind() == kind {
            self.advance();
            Ok(())
        } else {
            Err(McccError::UnexpectedToken {
                line: self.cur_line(),
                expected: kind.to_string(),
                actual: self.cur_kind().to_string(),
            })
        }
    }

    fn is_type_start(&self) -> bool {
        matches!(self.cur_kind(), TokenKind::Char | TokenKind::Int | TokenKind::Void)
    }

    // ---- top level -----------------------------------------------------

    fn parse_program(&mut self) -> Result<(), McccError> {
        if let Some(listing) = self.listing.as_mut() {
            listing.on_advance(self.cur_line(), &self.program.code);
        }

        while self.cur_kind() != TokenKind::Eof {
            if self.cur_kind() == TokenKind::Enum {
                self.parse_enum()?;
                continue;
            }

            let base = self.get_basetype()?;
            loop {
                let dt = self.get_datatype(base);
                if self.cur_kind() != TokenKind::Id {
                    return Err(McccError::BadGlobalDeclaration(self.cur_kind().to_string()));
                }
                let name = self.cur_lexeme();
                let line = self.cur_line();
                self.advance();

                if self.cur_kind() == TokenKind::LeftParen {
                    self.parse_function(name, dt, line)?;
                    break;
                }

                self.declare_global(&name, dt, line)?;

                match self.cur_kind() {
                    TokenKind::Comma => {
                        self.advance();
                        continue;
                    }
                    TokenKind::Semicolon => {
                        self.advance();
                        break;
                    }
                    other => return Err(McccError::BadGlobalDeclaration(other.to_string())),
                }
            }
        }

        if self.program.main_entry.is_none() {
            return Err(McccError::MainNotDefined);
        }
        Ok(())
    }

    fn get_basetype(&mut self) -> Result<DataType, McccError> {
        let dt = match self.cur_kind() {
            TokenKind::Char => DataType::CHAR,
            TokenKind::Int => DataType::INT,
            TokenKind::Void => DataType::VOID,
            other => {
                return Err(McccError::UnsupportedDataType {
                    line: self.cur_line(),
                    lexeme: other.to_string(),
                })
            }
        };
        self.advance();
        Ok(dt)
    }

    fn get_datatype(&mut self, base: DataType) -> DataType {
        let mut dt = base;
        while self.cur_kind() == TokenKind::Star {
            dt = dt.pointer_to();
            self.advance();
        }
        dt
    }

    fn declare_global(&mut self, name: &str, dt: DataType, line: u32) -> Result<(), McccError> {
        if self.table.lookup_global(name).is_some() {
            return Err(McccError::DuplicateSymbol {
                line,
                name: name.to_string(),
            });
        }
        let offset = self.program.alloc_global();
        self.table.insert_global(
            name,
            Symbol {
                name: name.to_string(),
                datatype: dt,
                class: SymbolClass::Global,
                value: offset,
            },
        );
        Ok(())
    }

    fn parse_enum(&mut self) -> Result<(), McccError> {
        self.advance(); // `enum`
        if self.cur_kind() == TokenKind::Id {
            self.advance(); // optional tag, unused
        }
        if self.cur_kind() != TokenKind::LeftBrace {
            return self.expect(TokenKind::Semicolon);
        }
        self.advance(); // `{`

        let mut value: i64 = 0;
        while self.cur_kind() != TokenKind::RightBrace {
            if self.cur_kind() != TokenKind::Id {
                return Err(McccError::BadEnumInitializer(self.cur_kind().to_string()));
            }
            let name = self.cur_lexeme();
            let line = self.cur_line();
            self.advance();

            if self.cur_kind() == TokenKind::Assign {
                self.advance();
                if self.cur_kind() != TokenKind::Number {
                    return Err(McccError::BadEnumInitializer(self.cur_kind().to_string()));
                }
                value = parse_integer_literal(&self.cur_lexeme())?;
                self.advance();
            }

            if self.table.lookup_global(&name).is_some() {
                return Err(McccError::DuplicateSymbol { line, name });
            }
            self.table.insert_global(
                &name,
                Symbol {
                    name: name.clone(),
                    datatype: DataType::INT,
                    class: SymbolClass::Enum,
                    value,
                },
            );
            value += 1;

            if self.cur_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.advance(); // `}`
        self.expect(TokenKind::Semicolon)
    }

    // ---- functions -------------------------------------------------

    fn parse_function(&mut self, name: String, return_type: DataType, line: u32) -> Result<(), McccError> {
        if self.table.lookup_global(&name).is_some() {
            return Err(McccError::DuplicateSymbol { line, name });
        }
        let entry = self.program.here();
        self.table.insert_global(
            &name,
            Symbol {
                name: name.clone(),
                datatype: return_type,
                class: SymbolClass::Func,
                value: entry as i64,
            },
        );
        if name == "main" {
            self.program.main_entry = Some(entry);
        }

        self.advance(); // `(`
        self.table.clear_locals();
        self.bp_index = self.parse_function_params()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;
        self.parse_function_body()?;
        self.table.clear_locals();
        Ok(())
    }

    fn parse_function_params(&mut self) -> Result<i64, McccError> {
        let mut i: i64 = 0;
        while self.cur_kind() != TokenKind::RightParen {
            let base = self.get_basetype()?;
            let dt = self.get_datatype(base);
            if self.cur_kind() != TokenKind::Id {
                return Err(McccError::BadParameterList {
                    line: self.cur_line(),
                    lexeme: self.cur_kind().to_string(),
                });
            }
            let name = self.cur_lexeme();
            let line = self.cur_line();
            self.advance();

            if self.table.has_local(&name) {
                return Err(McccError::DuplicateSymbol { line, name });
            }
            self.table.insert_local(
                &name,
                Symbol {
                    name: name.clone(),
                    datatype: dt,
                    class: SymbolClass::Local,
                    value: i,
                },
            );
            i += 1;

            if self.cur_kind() == TokenKind::Comma {
                self.advance();
                if self.cur_kind() == TokenKind::RightParen {
                    return Err(McccError::BadParameterList {
                        line: self.cur_line(),
                        lexeme: self.cur_kind().to_string(),
                    });
                }
            }
        }
        Ok(i + 1)
    }

    fn parse_function_body(&mut self) -> Result<(), McccError> {
        let mut local_count: i64 = 0;

        while matches!(self.cur_kind(), TokenKind::Int | TokenKind::Char) {
            let base = self.get_basetype()?;
            loop {
                let dt = self.get_datatype(base);
                if self.cur_kind() != TokenKind::Id {
                    return Err(McccError::BadLocalDeclaration {
                        line: self.cur_line(),
                        kind: self.cur_kind().to_string(),
                    });
                }
                let name = self.cur_lexeme();
                let line = self.cur_line();
                self.advance();

                if self.table.has_local(&name) {
                    return Err(McccError::DuplicateSymbol { line, name });
                }
                self.bp_index += 1;
                local_count += 1;
                self.table.insert_local(
                    &name,
                    Symbol {
                        name: name.clone(),
                        datatype: dt,
                        class: SymbolClass::Local,
                        value: self.bp_index,
                    },
                );

                match self.cur_kind() {
                    TokenKind::Comma => {
                        self.advance();
                        continue;
                    }
                    TokenKind::Semicolon => {
                        self.advance();
                        break;
                    }
                    other => {
                        return Err(McccError::BadLocalDeclaration {
                            line: self.cur_line(),
                            kind: other.to_string(),
                        })
                    }
                }
            }
        }

        self.program.emit(Opcode::Ent);
        self.program.emit_word(local_count);

        while self.cur_kind() != TokenKind::RightBrace {
            self.parse_stmt()?;
        }
        self.advance(); // `}`

        self.program.emit(Opcode::Lev);
        Ok(())
    }

    // ---- statements --------------------------------------------------

    fn parse_stmt(&mut self) -> Result<(), McccError> {
        match self.cur_kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            _ => {
                self.parse_expr(TokenKind::Assign)?;
                self.expect(TokenKind::Semicolon)
            }
        }
    }

    fn parse_block(&mut self) -> Result<(), McccError> {
        self.advance(); // `{`
        while self.cur_kind() != TokenKind::RightBrace {
            self.parse_stmt()?;
        }
        self.advance(); // `}`
        Ok(())
    }

    fn parse_if(&mut self) -> Result<(), McccError> {
        self.advance(); // `if`
        self.expect(TokenKind::LeftParen)?;
        self.parse_expr(TokenKind::Assign)?;
        self.expect(TokenKind::RightParen)?;

        self.program.emit(Opcode::Jz);
        let jz_operand = self.program.emit_word(0);

        self.parse_stmt()?;

        if self.cur_kind() == TokenKind::Else {
            self.program.emit(Opcode::Jmp);
            let jmp_operand = self.program.emit_word(0);
            self.program.patch(jz_operand, self.program.here() as i64);

            self.advance(); // `else`
            self.parse_stmt()?;

            self.program.patch(jmp_operand, self.program.here() as i64);
        } else {
            self.program.patch(jz_operand, self.program.here() as i64);
        }
        Ok(())
    }

    fn parse_while(&mut self) -> Result<(), McccError> {
        self.advance(); // `while`
        let loop_start = self.program.here() as i64;

        self.expect(TokenKind::LeftParen)?;
        self.parse_expr(TokenKind::Assign)?;
        self.expect(TokenKind::RightParen)?;

        self.program.emit(Opcode::Jz);
        let jz_operand = self.program.emit_word(0);

        self.parse_stmt()?;

        self.program.emit(Opcode::Jmp);
        self.program.emit_word(loop_start);
        self.program.patch(jz_operand, self.program.here() as i64);
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), McccError> {
        self.advance(); // `return`
        if self.cur_kind() != TokenKind::Semicolon {
            self.parse_expr(TokenKind::Assign)?;
        }
        self.expect(TokenKind::Semicolon)?;
        self.program.emit(Opcode::Lev);
        Ok(())
    }

    // ---- expressions ---------------------------------------------------

    /// Parses one expression whose outermost operator binds at least as
    /// tightly as `level` (a `TokenKind`'s declaration position doubles as
    /// its precedence, per the shared enum ordering).
    fn parse_expr(&mut self, level: TokenKind) -> Result<(), McccError> {
        self.parse_unary()?;
        self.parse_binary(level)
    }

    fn parse_unary(&mut self) -> Result<(), McccError> {
        let line = self.cur_line();
        match self.cur_kind() {
            TokenKind::Number => {
                let value = parse_integer_literal(&self.cur_lexeme())?;
                self.program.emit(Opcode::Imm);
                self.program.emit_word(value);
                self.expr_type = DataType::INT;
                self.advance();
            }
            TokenKind::String => {
                let bytes = translate_newlines(&self.cur_lexeme());
                let offset = self.program.push_string_literal(&bytes);
                self.program.emit(Opcode::Imm);
                self.program.emit_word(offset);
                self.expr_type = DataType::CHAR.pointer_to();
                self.advance();
            }
            TokenKind::Sizeof => {
                self.advance();
                self.expect(TokenKind::LeftParen)?;
                let base = self.get_basetype()?;
                let dt = self.get_datatype(base);
                self.expect(TokenKind::RightParen)?;
                self.program.emit(Opcode::Imm);
                self.program.emit_word(dt.size_of());
                self.expr_type = DataType::INT;
            }
            TokenKind::Id => {
                let name = self.cur_lexeme();
                self.advance();
                if self.cur_kind() == TokenKind::LeftParen {
                    self.parse_call(&name, line)?;
                } else {
                    self.parse_variable(&name, line)?;
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                if self.is_type_start() {
                    let base = self.get_basetype()?;
                    let dt = self.get_datatype(base);
                    self.expect(TokenKind::RightParen)?;
                    self.parse_expr(TokenKind::Inc)?;
                    self.expr_type = dt;
                } else {
                    self.parse_expr(TokenKind::Assign)?;
                    self.expect(TokenKind::RightParen)?;
                }
            }
            TokenKind::Star => {
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                self.expr_type = self
                    .expr_type
                    .dereferenced()
                    .ok_or(McccError::BadDereference { line })?;
                self.program
                    .emit(if self.expr_type.is_char() { Opcode::Lc } else { Opcode::Li });
            }
            TokenKind::And => {
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                match self.program.last_opcode() {
                    Some(Opcode::Lc) | Some(Opcode::Li) => self.program.drop_last(),
                    _ => return Err(McccError::BadAddressOf { line }),
                }
                self.expr_type = self.expr_type.pointer_to();
            }
            TokenKind::Not => {
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                self.program.emit(Opcode::Push);
                self.program.emit(Opcode::Imm);
                self.program.emit_word(0);
                self.program.emit(Opcode::Eq);
                self.expr_type = DataType::INT;
            }
            TokenKind::Tilde => {
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                self.program.emit(Opcode::Push);
                self.program.emit(Opcode::Imm);
                self.program.emit_word(-1);
                self.program.emit(Opcode::Xor);
                self.expr_type = DataType::INT;
            }
            TokenKind::Plus => {
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                self.expr_type = DataType::INT;
            }
            TokenKind::Minus => {
                self.advance();
                if self.cur_kind() == TokenKind::Number {
                    let value = parse_integer_literal(&self.cur_lexeme())?;
                    self.program.emit(Opcode::Imm);
                    self.program.emit_word(-value);
                    self.advance();
                } else {
                    self.program.emit(Opcode::Imm);
                    self.program.emit_word(-1);
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Inc)?;
                    self.program.emit(Opcode::Mul);
                }
                self.expr_type = DataType::INT;
            }
            TokenKind::Inc | TokenKind::Dec => {
                let is_inc = self.cur_kind() == TokenKind::Inc;
                self.advance();
                self.parse_expr(TokenKind::Inc)?;
                match self.program.last_opcode() {
                    Some(load @ (Opcode::Lc | Opcode::Li)) => {
                        self.program.drop_last();
                        self.program.emit(Opcode::Push);
                        self.program.emit(load);
                    }
                    _ => return Err(McccError::BadLvaluePreIncrement { line }),
                }
                let step = if self.expr_type.scales_as_pointer() { 8 } else { 1 };
                self.program.emit(Opcode::Push);
                self.program.emit(Opcode::Imm);
                self.program.emit_word(step);
                self.program.emit(if is_inc { Opcode::Add } else { Opcode::Sub });
                self.program
                    .emit(if self.expr_type.is_char() { Opcode::Sc } else { Opcode::Si });
            }
            _ => return Err(McccError::BadExpression { line }),
        }
        Ok(())
    }

    fn parse_variable(&mut self, name: &str, line: u32) -> Result<(), McccError> {
        let symbol = self
            .table
            .lookup(name)
            .cloned()
            .ok_or_else(|| McccError::UndefinedVariable {
                line,
                name: name.to_string(),
            })?;

        match symbol.class {
            SymbolClass::Enum => {
                self.program.emit(Opcode::Imm);
                self.program.emit_word(symbol.value);
            }
            SymbolClass::Local => {
                self.program.emit(Opcode::Lea);
                self.program.emit_word(self.bp_index - symbol.value);
            }
            SymbolClass::Global | SymbolClass::Func => {
                self.program.emit(Opcode::Imm);
                self.program.emit_word(symbol.value);
            }
            SymbolClass::Sys => {
                return Err(McccError::UndefinedVariable {
                    line,
                    name: name.to_string(),
                })
            }
        }

        self.expr_type = symbol.datatype;
        if symbol.class != SymbolClass::Enum {
            self.program
                .emit(if self.expr_type.is_char() { Opcode::Lc } else { Opcode::Li });
        }
        Ok(())
    }

    fn parse_call(&mut self, name: &str, line: u32) -> Result<(), McccError> {
        let symbol = self
            .table
            .lookup(name)
            .cloned()
            .ok_or_else(|| McccError::UndefinedFunction {
                line,
                name: name.to_string(),
            })?;

        self.advance(); // `(`
        let mut argc = 0i64;
        while self.cur_kind() != TokenKind::RightParen {
            self.parse_expr(TokenKind::Assign)?;
            self.program.emit(Opcode::Push);
            argc += 1;
            if self.cur_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.advance(); // `)`

        match symbol.class {
            SymbolClass::Sys => {
                let op = Opcode::from_word(symbol.value).expect("sys symbol value is a valid opcode");
                self.program.emit(op);
                // PRTF reads its argument count from the immediate of the
                // ADJ that must follow, even when there are no arguments.
                if argc > 0 || op == Opcode::Prtf {
                    self.program.emit(Opcode::Adj);
                    self.program.emit_word(argc);
                }
            }
            SymbolClass::Func => {
                self.program.emit(Opcode::Jsr);
                self.program.emit_word(symbol.value);
                if argc > 0 {
                    self.program.emit(Opcode::Adj);
                    self.program.emit_word(argc);
                }
            }
            _ => {
                return Err(McccError::UndefinedFunction {
                    line,
                    name: name.to_string(),
                })
            }
        }

        self.expr_type = symbol.datatype;
        Ok(())
    }

    fn parse_binary(&mut self, level: TokenKind) -> Result<(), McccError> {
        while self.cur_kind() >= level {
            let tmp = self.expr_type;
            let line = self.cur_line();

            match self.cur_kind() {
                TokenKind::Assign => {
                    match self.program.last_opcode() {
                        Some(Opcode::Lc) | Some(Opcode::Li) => self.program.drop_last(),
                        _ => return Err(McccError::BadLvalueAssignment { line }),
                    }
                    self.program.emit(Opcode::Push);
                    self.advance();
                    self.parse_expr(TokenKind::Assign)?;
                    self.program.emit(if tmp.is_char() { Opcode::Sc } else { Opcode::Si });
                    self.expr_type = tmp;
                }
                TokenKind::Condition => {
                    self.advance();
                    self.program.emit(Opcode::Jz);
                    let jz_operand = self.program.emit_word(0);
                    self.parse_expr(TokenKind::Assign)?;
                    if self.cur_kind() != TokenKind::Colon {
                        return Err(McccError::MissingColon { line });
                    }
                    self.advance();
                    self.program.emit(Opcode::Jmp);
                    let jmp_operand = self.program.emit_word(0);
                    self.program.patch(jz_operand, self.program.here() as i64);
                    self.parse_expr(TokenKind::Condition)?;
                    self.program.patch(jmp_operand, self.program.here() as i64);
                }
                TokenKind::Lor => {
                    self.advance();
                    self.program.emit(Opcode::Jnz);
                    let operand = self.program.emit_word(0);
                    self.parse_expr(TokenKind::Land)?;
                    self.program.patch(operand, self.program.here() as i64);
                    self.expr_type = DataType::INT;
                }
                TokenKind::Land => {
                    self.advance();
                    self.program.emit(Opcode::Jz);
                    let operand = self.program.emit_word(0);
                    self.parse_expr(TokenKind::Or)?;
                    self.program.patch(operand, self.program.here() as i64);
                    self.expr_type = DataType::INT;
                }
                TokenKind::Or => self.emit_logic_op(Opcode::Or, TokenKind::Xor)?,
                TokenKind::Xor => self.emit_logic_op(Opcode::Xor, TokenKind::And)?,
                TokenKind::And => self.emit_logic_op(Opcode::And, TokenKind::Equal)?,
                TokenKind::Equal => self.emit_logic_op(Opcode::Eq, TokenKind::Lt)?,
                TokenKind::Ne => self.emit_logic_op(Opcode::Ne, TokenKind::Lt)?,
                TokenKind::Lt => self.emit_logic_op(Opcode::Lt, TokenKind::Shl)?,
                TokenKind::Gt => self.emit_logic_op(Opcode::Gt, TokenKind::Shl)?,
                TokenKind::Le => self.emit_logic_op(Opcode::Le, TokenKind::Shl)?,
                TokenKind::Ge => self.emit_logic_op(Opcode::Ge, TokenKind::Shl)?,
                TokenKind::Shl => self.emit_logic_op(Opcode::Shl, TokenKind::Plus)?,
                TokenKind::Shr => self.emit_logic_op(Opcode::Shr, TokenKind::Plus)?,
                TokenKind::Plus => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Star)?;
                    if tmp.scales_as_pointer() {
                        self.program.emit(Opcode::Push);
                        self.program.emit(Opcode::Imm);
                        self.program.emit_word(8);
                        self.program.emit(Opcode::Mul);
                    }
                    self.program.emit(Opcode::Add);
                    self.expr_type = tmp;
                }
                TokenKind::Minus => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Star)?;
                    if tmp.scales_as_pointer() && self.expr_type == tmp {
                        self.program.emit(Opcode::Sub);
                        self.program.emit(Opcode::Push);
                        self.program.emit(Opcode::Imm);
                        self.program.emit_word(8);
                        self.program.emit(Opcode::Div);
                        self.expr_type = DataType::INT;
                    } else if tmp.scales_as_pointer() {
                        self.program.emit(Opcode::Push);
                        self.program.emit(Opcode::Imm);
                        self.program.emit_word(8);
                        self.program.emit(Opcode::Mul);
                        self.program.emit(Opcode::Sub);
                        self.expr_type = tmp;
                    } else {
                        self.program.emit(Opcode::Sub);
                        self.expr_type = tmp;
                    }
                }
                TokenKind::Star => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Inc)?;
                    self.program.emit(Opcode::Mul);
                    self.expr_type = tmp;
                }
                TokenKind::Slash => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Inc)?;
                    self.program.emit(Opcode::Div);
                    self.expr_type = tmp;
                }
                TokenKind::Mod => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Inc)?;
                    self.program.emit(Opcode::Mod);
                    self.expr_type = tmp;
                }
                TokenKind::Inc | TokenKind::Dec => {
                    let is_inc = self.cur_kind() == TokenKind::Inc;
                    self.advance();
                    match self.program.last_opcode() {
                        Some(load @ (Opcode::Lc | Opcode::Li)) => {
                            self.program.drop_last();
                            self.program.emit(Opcode::Push);
                            self.program.emit(load);
                        }
                        _ => return Err(McccError::BadLvaluePostIncrement { line }),
                    }
                    let step = if tmp.scales_as_pointer() { 8 } else { 1 };
                    self.program.emit(Opcode::Push);
                    self.program.emit(Opcode::Imm);
                    self.program.emit_word(step);
                    self.program.emit(if is_inc { Opcode::Add } else { Opcode::Sub });
                    self.program.emit(if tmp.is_char() { Opcode::Sc } else { Opcode::Si });
                    self.program.emit(Opcode::Push);
                    self.program.emit(Opcode::Imm);
                    self.program.emit_word(step);
                    self.program.emit(if is_inc { Opcode::Sub } else { Opcode::Add });
                    self.expr_type = tmp;
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    self.program.emit(Opcode::Push);
                    self.parse_expr(TokenKind::Assign)?;
                    self.expect(TokenKind::RightBracket)?;
                    if !tmp.is_pointer() {
                        return Err(McccError::NotAPointer { line });
                    }
                    if tmp.scales_as_pointer() {
                        self.program.emit(Opcode::Push);
                        self.program.emit(Opcode::Imm);
                        self.program.emit_word(8);
                        self.program.emit(Opcode::Mul);
                    }
                    self.program.emit(Opcode::Add);
                    self.expr_type = tmp.dereferenced().expect("checked is_pointer above");
                    self.program
                        .emit(if self.expr_type.is_char() { Opcode::Lc } else { Opcode::Li });
                }
                other => {
                    return Err(McccError::BadOperatorToken {
                        line,
                        kind: other.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Shared shape for the purely-`INT`-typed binary operators: `PUSH`,
    /// recurse at the next tighter level, emit `op`.
    fn emit_logic_op(&mut self, op: Opcode, next_level: TokenKind) -> Result<(), McccError> {
        self.advance();
        self.program.emit(Opcode::Push);
        self.parse_expr(next_level)?;
        self.program.emit(op);
        self.expr_type = DataType::INT;
        Ok(())
    }
}

/// Parses a numeric lexeme the way `strtoll(lexeme, &end, 0)` would, except
/// a leading zero never switches to octal — only an explicit `0x`/`0X`
/// prefix selects a base other than 10.
fn parse_integer_literal(lexeme: &str) -> Result<i64, McccError> {
    let (radix, digits) = if let Some(hex) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        (16, hex)
    } else {
        (10, lexeme)
    };
    i64::from_str_radix(digits, radix).map_err(|_| McccError::BadNumber(lexeme.to_string()))
}

/// Translates only `\n` two-character sequences to a literal newline byte;
/// every other backslash sequence (including the backslash itself) is
/// copied through unchanged, matching the original string-literal handling.
fn translate_newlines(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b'n' {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcc_lex::tokenize;

    fn compile(source: &str) -> Program {
        let tokens = tokenize(source).unwrap();
        parse(tokens, false).unwrap().program
    }

    #[test]
    fn fibonacci_style_program_defines_main_and_jumps() {
        let program = compile(
            "int fib(int n) { if (n <= 1) return n; return fib(n - 1) + fib(n - 2); } \
             int main() { return fib(10); }",
        );
        assert!(program.main_entry.is_some());
        assert!(program.code.iter().any(|&w| w == Opcode::Jsr.as_word()));
    }

    #[test]
    fn string_literal_is_stored_with_newline_translated() {
        let program = compile("int main() { printf(\"hi\\n\"); return 0; }");
        assert!(program.data.starts_with(b"hi\n\0"));
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let tokens = tokenize("int main() { return y; }").unwrap();
        let err = parse(tokens, false).unwrap_err();
        assert!(matches!(err, McccError::UndefinedVariable { .. }));
    }

    #[test]
    fn missing_main_is_an_error() {
        let tokens = tokenize("int f() { return 0; }").unwrap();
        let err = parse(tokens, false).unwrap_err();
        assert!(matches!(err, McccError::MainNotDefined));
    }

    #[test]
    fn enum_constants_do_not_load_from_memory() {
        let program = compile("enum { A, B = 17, C }; int main() { return B; }");
        // an Enum reference is IMM only, never followed by LC/LI
        let imm = Opcode::Imm.as_word();
        let pos = program.code.iter().position(|&w| w == imm && program.code.len() > 0);
        assert!(pos.is_some());
    }

    #[test]
    fn printf_call_always_gets_an_adj() {
        let program = compile("int main() { printf(\"x\"); return 0; }");
        let prtf = Opcode::Prtf.as_word();
        let idx = program.code.iter().position(|&w| w == prtf).unwrap();
        assert_eq!(program.code[idx + 1], Opcode::Adj.as_word());
    }

    #[test]
    fn source_listing_is_produced_when_requested() {
        let tokens = tokenize("int main() { return 0; }").unwrap();
        let out = parse(tokens, true).unwrap();
        let listing = out.listing.unwrap();
        assert!(listing.contains("1:"));
        assert!(listing.contains("ENT"));
        assert!(listing.contains("LEV"));
    }
}
