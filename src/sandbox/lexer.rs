//! Lexer for the snippet language.

use super::SandboxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    /// Statement separator: newline or `;`.
    Separator,
}

/// Tokenize a snippet. `#` starts a comment that runs to end of line.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SandboxError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '\n' => {
                chars.next();
                line += 1;
                tokens.push(Token::Separator);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Separator);
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    return Err(SandboxError::Syntax(format!(
                        "line {line}: comparison operators are not supported"
                    )));
                }
                tokens.push(Token::Assign);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                // A dot starting a number (`.5`) vs attribute access.
                chars.next();
                if chars.peek().is_some_and(char::is_ascii_digit) {
                    let mut text = String::from("0.");
                    read_digits(&mut chars, &mut text);
                    tokens.push(parse_number(&text, line)?);
                } else {
                    tokens.push(Token::Dot);
                }
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(read_string(&mut chars, c, line)?));
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                read_digits(&mut chars, &mut text);
                if chars.peek() == Some(&'.') {
                    // Only consume the dot when digits follow; `2.sqrt` stays
                    // an attribute access on 2 (and fails later, clearly).
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                        text.push('.');
                        read_digits(&mut chars, &mut text);
                    }
                }
                if chars.peek() == Some(&'e') || chars.peek() == Some(&'E') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let sign = matches!(lookahead.peek(), Some('+' | '-'));
                    if sign {
                        lookahead.next();
                    }
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        text.push(chars.next().unwrap_or('e'));
                        if sign {
                            text.push(chars.next().unwrap_or('+'));
                        }
                        read_digits(&mut chars, &mut text);
                    }
                }
                tokens.push(parse_number(&text, line)?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => {
                return Err(SandboxError::Syntax(format!(
                    "line {line}: unexpected character {other:?}"
                )));
            }
        }
    }

    Ok(tokens)
}

fn read_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
}

fn parse_number(text: &str, line: usize) -> Result<Token, SandboxError> {
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| SandboxError::Syntax(format!("line {line}: invalid number {text:?}")))
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
    line: usize,
) -> Result<String, SandboxError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None | Some('\n') => {
                return Err(SandboxError::Syntax(format!(
                    "line {line}: unterminated string"
                )));
            }
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('\\') => value.push('\\'),
                Some('\'') => value.push('\''),
                Some('"') => value.push('"'),
                Some(other) => {
                    return Err(SandboxError::Syntax(format!(
                        "line {line}: unknown escape \\{other}"
                    )));
                }
                None => {
                    return Err(SandboxError::Syntax(format!(
                        "line {line}: unterminated string"
                    )));
                }
            },
            Some(c) if c == quote => return Ok(value),
            Some(c) => value.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_tokens() {
        let tokens = tokenize("2 + 3 * 4").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(2.0),
                Token::Plus,
                Token::Number(3.0),
                Token::Star,
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"'a\nb' "c\"d""#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Str("a\nb".into()), Token::Str("c\"d".into())]
        );
    }

    #[test]
    fn test_attribute_and_call() {
        let tokens = tokenize("math.sin(x)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("math".into()),
                Token::Dot,
                Token::Ident("sin".into()),
                Token::LParen,
                Token::Ident("x".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(tokenize("1.5").unwrap(), vec![Token::Number(1.5)]);
        assert_eq!(tokenize(".25").unwrap(), vec![Token::Number(0.25)]);
        assert_eq!(tokenize("1e3").unwrap(), vec![Token::Number(1000.0)]);
        assert_eq!(tokenize("2.5e-1").unwrap(), vec![Token::Number(0.25)]);
    }

    #[test]
    fn test_comment_skipped() {
        let tokens = tokenize("1 # the rest is ignored\n2").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Number(1.0), Token::Separator, Token::Number(2.0)]
        );
    }

    #[test]
    fn test_separators() {
        let tokens = tokenize("a; b\nc").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Separator,
                Token::Ident("b".into()),
                Token::Separator,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("'abc").is_err());
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("a @ b").is_err());
    }
}
