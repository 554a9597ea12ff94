use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    None_,
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Eq2,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    End,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value: f64 = text
                .parse()
                .map_err(|_| ExpressionError::Syntax(format!("invalid numeric literal '{text}'")))?;
            tokens.push(Token::Number(value));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            if i >= chars.len() {
                return Err(ExpressionError::Syntax("unterminated string literal".to_string()));
            }
            let text: String = chars[start..i].iter().collect();
            i += 1;
            tokens.push(Token::Str(text));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "True" => Token::True,
                "False" => Token::False,
                "None" => Token::None_,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "is" => Token::Is,
                "if" => Token::If,
                "else" => Token::Else,
                "for" => Token::For,
                _ => Token::Ident(word),
            });
            continue;
        }

        macro_rules! two_char {
            ($next:expr, $two:expr, $one:expr) => {{
                if i + 1 < chars.len() && chars[i + 1] == $next {
                    i += 2;
                    $two
                } else {
                    i += 1;
                    $one
                }
            }};
        }

        let token = match c {
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '{' => {
                i += 1;
                Token::LBrace
            }
            '}' => {
                i += 1;
                Token::RBrace
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            ':' => {
                i += 1;
                Token::Colon
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '*' => two_char!('*', Token::DoubleStar, Token::Star),
            '/' => two_char!('/', Token::DoubleSlash, Token::Slash),
            '%' => {
                i += 1;
                Token::Percent
            }
            '=' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    i += 2;
                    Token::Eq2
                } else {
                    return Err(ExpressionError::Syntax("assignment is not a valid expression".to_string()));
                }
            }
            '!' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    i += 2;
                    Token::NotEq
                } else {
                    return Err(ExpressionError::Syntax("unexpected '!'".to_string()));
                }
            }
            '<' => two_char!('=', Token::LtE, Token::Lt),
            '>' => two_char!('=', Token::GtE, Token::Gt),
            other => {
                return Err(ExpressionError::Syntax(format!("unexpected character '{other}'")));
            }
        };
        tokens.push(token);
    }

    tokens.push(Token::End);
    Ok(tokens)
}
