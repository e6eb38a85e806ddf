// File: src/lexer.rs
//
// Tokenizer for RookScript source text.
// Produces a flat token list; malformed input is collected as parse
// messages rather than stopping the scan, so the parser can report
// everything at once.

use ahash::AHashMap;
use once_cell::sync::Lazy;

use crate::errors::ParseMessage;

/// Reserved words. Keywords are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Main,
    Entry,
    Function,
    Pragma,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Return,
    True,
    False,
    Infinity,
    Nan,
}

static KEYWORDS: Lazy<AHashMap<&'static str, Keyword>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    map.insert("main", Keyword::Main);
    map.insert("entry", Keyword::Entry);
    map.insert("function", Keyword::Function);
    map.insert("pragma", Keyword::Pragma);
    map.insert("if", Keyword::If);
    map.insert("else", Keyword::Else);
    map.insert("while", Keyword::While);
    map.insert("for", Keyword::For);
    map.insert("break", Keyword::Break);
    map.insert("continue", Keyword::Continue);
    map.insert("return", Keyword::Return);
    map.insert("true", Keyword::True);
    map.insert("false", Keyword::False);
    map.insert("infinity", Keyword::Infinity);
    map.insert("nan", Keyword::Nan);
    map
});

/// The operator set of the language, one variant per spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Bang,
    DoubleAmpersand,
    DoublePipe,
    LeftShift,
    RightShift,
    RightShiftPadded,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpersandAssign,
    PipeAssign,
    LeftShiftAssign,
    RightShiftAssign,
    RightShiftPaddedAssign,
}

impl Operator {
    pub fn text(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percent => "%",
            Operator::Ampersand => "&",
            Operator::Pipe => "|",
            Operator::Caret => "^",
            Operator::Tilde => "~",
            Operator::Bang => "!",
            Operator::DoubleAmpersand => "&&",
            Operator::DoublePipe => "||",
            Operator::LeftShift => "<<",
            Operator::RightShift => ">>",
            Operator::RightShiftPadded => ">>>",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Equal => "==",
            Operator::StrictEqual => "===",
            Operator::NotEqual => "!=",
            Operator::StrictNotEqual => "!==",
            Operator::Assign => "=",
            Operator::PlusAssign => "+=",
            Operator::MinusAssign => "-=",
            Operator::StarAssign => "*=",
            Operator::SlashAssign => "/=",
            Operator::PercentAssign => "%=",
            Operator::AmpersandAssign => "&=",
            Operator::PipeAssign => "|=",
            Operator::LeftShiftAssign => "<<=",
            Operator::RightShiftAssign => ">>=",
            Operator::RightShiftPaddedAssign => ">>>=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(Keyword),
    Integer(i64),
    Float(f64),
    Str(String),
    Operator(Operator),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<ParseMessage>,
}

/// Tokenizes a whole source file. Lexical errors do not stop the scan.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseMessage>) {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.errors)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn error(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.errors.push(ParseMessage::new(line, column, message));
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.advance() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(ch) = self.advance() {
                        if ch == '*' && self.peek() == Some('/') {
                            self.advance();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.error(line, column, "unterminated block comment");
                    }
                }
                '"' => self.scan_string(line, column),
                '0'..='9' => self.scan_number(line, column),
                'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(line, column),
                '#' => {
                    // Include directives are resolved by the preprocessor
                    // before source reaches this tokenizer.
                    self.error(line, column, "unexpected \"#\" (was this meant for the preprocessor?)");
                    self.advance();
                }
                '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | ':' | '?' | '.' => {
                    self.advance();
                    self.push(TokenKind::Punct(c), line, column);
                }
                _ => self.scan_operator(line, column),
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, line, column);
    }

    fn scan_string(&mut self, line: usize, column: usize) {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    self.error(line, column, "unterminated string literal");
                    break;
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    None => {
                        self.error(line, column, "unterminated string literal");
                        break;
                    }
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('b') => text.push('\u{0008}'),
                    Some('f') => text.push('\u{000C}'),
                    Some('0') => text.push('\0'),
                    Some('u') => {
                        let mut code = 0u32;
                        let mut ok = true;
                        for _ in 0..4 {
                            match self.advance().and_then(|d| d.to_digit(16)) {
                                Some(digit) => code = code * 16 + digit,
                                None => {
                                    ok = false;
                                    break;
                                }
                            }
                        }
                        match char::from_u32(code).filter(|_| ok) {
                            Some(ch) => text.push(ch),
                            None => self.error(line, column, "bad unicode escape in string"),
                        }
                    }
                    // Unknown escapes keep the escaped character.
                    Some(other) => text.push(other),
                },
                Some(ch) => text.push(ch),
            }
        }
        self.push(TokenKind::Str(text), line, column);
    }

    fn scan_number(&mut self, line: usize, column: usize) {
        if self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x') | Some('X'))
            && self.peek_at(2).map(|c| c.is_ascii_hexdigit()).unwrap_or(false)
        {
            self.advance();
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            // Parse through u64 so full-width bit patterns like
            // 0xFFFFFFFFFFFFFFFF land on the signed value.
            match u64::from_str_radix(&digits, 16) {
                Ok(bits) => self.push(TokenKind::Integer(bits as i64), line, column),
                Err(_) => self.error(line, column, format!("bad hex literal \"0x{}\"", digits)),
            }
            return;
        }

        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !is_float && self.peek_at(1).map(|d| d.is_ascii_digit()).unwrap_or(false) {
                is_float = true;
                text.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E')
                && !text.is_empty()
                && self
                    .peek_at(1)
                    .map(|d| d.is_ascii_digit() || d == '+' || d == '-')
                    .unwrap_or(false)
            {
                is_float = true;
                text.push(c);
                self.advance();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.advance();
                    }
                }
            } else {
                break;
            }
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.push(TokenKind::Float(value), line, column),
                Err(_) => self.error(line, column, format!("bad float literal \"{}\"", text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => self.push(TokenKind::Integer(value), line, column),
                Err(_) => self.error(line, column, format!("bad integer literal \"{}\"", text)),
            }
        }
    }

    fn scan_identifier(&mut self, line: usize, column: usize) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match KEYWORDS.get(text.to_ascii_lowercase().as_str()) {
            Some(&keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(text),
        };
        self.push(kind, line, column);
    }

    fn scan_operator(&mut self, line: usize, column: usize) {
        use Operator::*;
        let c = self.peek().unwrap_or('\0');
        let next = self.peek_at(1);
        let third = self.peek_at(2);
        let fourth = self.peek_at(3);

        let (op, len) = match c {
            '+' if next == Some('=') => (PlusAssign, 2),
            '+' => (Plus, 1),
            '-' if next == Some('=') => (MinusAssign, 2),
            '-' => (Minus, 1),
            '*' if next == Some('=') => (StarAssign, 2),
            '*' => (Star, 1),
            '/' if next == Some('=') => (SlashAssign, 2),
            '/' => (Slash, 1),
            '%' if next == Some('=') => (PercentAssign, 2),
            '%' => (Percent, 1),
            '~' => (Tilde, 1),
            '^' => (Caret, 1),
            '&' if next == Some('&') => (DoubleAmpersand, 2),
            '&' if next == Some('=') => (AmpersandAssign, 2),
            '&' => (Ampersand, 1),
            '|' if next == Some('|') => (DoublePipe, 2),
            '|' if next == Some('=') => (PipeAssign, 2),
            '|' => (Pipe, 1),
            '!' if next == Some('=') && third == Some('=') => (StrictNotEqual, 3),
            '!' if next == Some('=') => (NotEqual, 2),
            '!' => (Bang, 1),
            '=' if next == Some('=') && third == Some('=') => (StrictEqual, 3),
            '=' if next == Some('=') => (Equal, 2),
            '=' => (Assign, 1),
            '<' if next == Some('<') && third == Some('=') => (LeftShiftAssign, 3),
            '<' if next == Some('<') => (LeftShift, 2),
            '<' if next == Some('=') => (LessOrEqual, 2),
            '<' => (Less, 1),
            '>' if next == Some('>') && third == Some('>') && fourth == Some('=') => {
                (RightShiftPaddedAssign, 4)
            }
            '>' if next == Some('>') && third == Some('>') => (RightShiftPadded, 3),
            '>' if next == Some('>') && third == Some('=') => (RightShiftAssign, 3),
            '>' if next == Some('>') => (RightShift, 2),
            '>' if next == Some('=') => (GreaterOrEqual, 2),
            '>' => (Greater, 1),
            other => {
                self.error(line, column, format!("unexpected character \"{}\"", other));
                self.advance();
                return;
            }
        };

        for _ in 0..len {
            self.advance();
        }
        self.push(TokenKind::Operator(op), line, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("WHILE While while"),
            vec![
                TokenKind::Keyword(Keyword::While),
                TokenKind::Keyword(Keyword::While),
                TokenKind::Keyword(Keyword::While),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 0x1F 1.5 2e3 0xFFFFFFFFFFFFFFFF"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(31),
                TokenKind::Float(1.5),
                TokenKind::Float(2000.0),
                TokenKind::Integer(-1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\nA""#),
            vec![TokenKind::Str("a\tb\nA".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds(">>>= >>> >>= >> >= > === == = !== !="),
            vec![
                TokenKind::Operator(Operator::RightShiftPaddedAssign),
                TokenKind::Operator(Operator::RightShiftPadded),
                TokenKind::Operator(Operator::RightShiftAssign),
                TokenKind::Operator(Operator::RightShift),
                TokenKind::Operator(Operator::GreaterOrEqual),
                TokenKind::Operator(Operator::Greater),
                TokenKind::Operator(Operator::StrictEqual),
                TokenKind::Operator(Operator::Equal),
                TokenKind::Operator(Operator::Assign),
                TokenKind::Operator(Operator::StrictNotEqual),
                TokenKind::Operator(Operator::NotEqual),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("1 // line comment\n/* block\ncomment */ 2"),
            vec![TokenKind::Integer(1), TokenKind::Integer(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let (_, errors) = tokenize("\"oops");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated string"));
    }

    #[test]
    fn test_line_and_column_tracking() {
        let (tokens, _) = tokenize("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }
}
