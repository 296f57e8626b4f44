use super::PredicateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; the parser tells them apart
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    // Punctuation
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Dot,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Unary minus on numeric literals
    Minus,
    /// Single `=`, binds a name
    Assign,
    /// Statement separator: `;` or a newline outside brackets
    Sep,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, PredicateError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    // Newlines inside (...) or [...] do not end a statement.
    let mut depth = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        // Line comment
        if c == '#' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        if c == '\n' {
            if depth == 0 {
                tokens.push(Spanned {
                    token: Token::Sep,
                    line,
                });
            }
            line += 1;
            pos += 1;
            continue;
        }

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let tok_line = line;

        // String literal, either quote style
        if c == '"' || c == '\'' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return Err(PredicateError::syntax(
                        tok_line,
                        "unterminated string literal",
                    ));
                }
                let sc = chars[pos];
                if sc == quote {
                    pos += 1;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    if pos >= chars.len() {
                        return Err(PredicateError::syntax(
                            tok_line,
                            "unterminated escape in string",
                        ));
                    }
                    match chars[pos] {
                        '"' => s.push('"'),
                        '\'' => s.push('\''),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    pos += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
            });
            continue;
        }

        // Number (sign is handled by the parser as unary minus)
        if c.is_ascii_digit() {
            let start = pos;
            pos = scan_digits(&chars, pos);
            let mut is_float = false;
            // `5.` is a float, but `5.x` is attribute access on 5
            if chars.get(pos) == Some(&'.')
                && !chars
                    .get(pos + 1)
                    .is_some_and(|n| n.is_alphabetic() || *n == '_')
            {
                is_float = true;
                pos = scan_digits(&chars, pos + 1);
            }
            if matches!(chars.get(pos), Some('e' | 'E')) {
                let mut exp = pos + 1;
                if matches!(chars.get(exp), Some('+' | '-')) {
                    exp += 1;
                }
                if chars.get(exp).is_some_and(|d| d.is_ascii_digit()) {
                    is_float = true;
                    pos = scan_digits(&chars, exp);
                }
            }
            let s: String = chars[start..pos].iter().collect();
            let token = match (is_float, s.parse::<i64>()) {
                (false, Ok(n)) => Token::Int(n),
                // Integers past the i64 range widen to floats
                _ => Token::Float(s.parse().map_err(|_| {
                    PredicateError::syntax(tok_line, format!("invalid number '{}'", s))
                })?),
            };
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
            continue;
        }

        // Identifier or keyword
        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let w: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Word(w),
                line: tok_line,
            });
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::Gte, 2),
            ('>', _) => (Token::Gt, 1),
            ('-', _) => (Token::Minus, 1),
            (';', _) => (Token::Sep, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('(', _) => {
                depth += 1;
                (Token::LParen, 1)
            }
            (')', _) => {
                depth = depth.saturating_sub(1);
                (Token::RParen, 1)
            }
            ('[', _) => {
                depth += 1;
                (Token::LBracket, 1)
            }
            (']', _) => {
                depth = depth.saturating_sub(1);
                (Token::RBracket, 1)
            }
            _ => {
                return Err(PredicateError::syntax(
                    tok_line,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        tokens.push(Spanned {
            token,
            line: tok_line,
        });
        pos += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

fn scan_digits(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    pos
}
