//! Scene text parsing.
//!
//! The format is line oriented but braces and `;` may share a line with a
//! directive, so the source is first split into tokens and then grouped into
//! [`Statement`]s. Nothing here touches the registry; the loader walks the
//! statements and instantiates entities.

use cgmath::Vector3;

/// A recognised body directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Object {
        name: String,
        class: String,
        subclass: String,
        offset: Vector3<i32>,
    },
    Scene {
        path: String,
        offset: Vector3<i32>,
    },
    Tilemap {
        path: String,
        offset: Vector3<i32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `closed` is set when the directive ended with `;`.
    Directive {
        directive: Directive,
        closed: bool,
        line: usize,
    },
    /// A directive that was malformed or unknown.
    Ignored { line: usize },
    Open { line: usize },
    /// `owner_closed` is set for `};`.
    Close { owner_closed: bool, line: usize },
}

/// A parsed scene file.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneDocument {
    /// Name from the header, `None` if the header was missing.
    pub name: Option<String>,
    pub body: Vec<Statement>,
    /// Whether the body ended with its closing brace rather than EOF.
    pub terminated: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semi,
    Newline,
}

fn tokenize(source: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    for (n, line) in source.lines().enumerate() {
        let line_no = n + 1;
        let mut word = String::new();
        for c in line.chars() {
            let symbol = match c {
                '{' => Some(Token::Open),
                '}' => Some(Token::Close),
                ';' => Some(Token::Semi),
                c if c.is_whitespace() => None,
                c => {
                    word.push(c);
                    continue;
                }
            };
            if !word.is_empty() {
                tokens.push((Token::Word(std::mem::take(&mut word)), line_no));
            }
            if let Some(symbol) = symbol {
                tokens.push((symbol, line_no));
            }
        }
        if !word.is_empty() {
            tokens.push((Token::Word(word), line_no));
        }
        tokens.push((Token::Newline, line_no));
    }
    tokens
}

/// Directive words grouped with the token that ended them.
#[derive(Debug)]
enum RawStatement {
    Words { words: Vec<String>, closed: bool, line: usize },
    Open { line: usize },
    Close { owner_closed: bool, line: usize },
}

fn group(tokens: Vec<(Token, usize)>) -> Vec<RawStatement> {
    let mut out = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut words_line = 0;

    let flush = |words: &mut Vec<String>, closed: bool, line: usize, out: &mut Vec<RawStatement>| {
        if !words.is_empty() {
            out.push(RawStatement::Words {
                words: std::mem::take(words),
                closed,
                line,
            });
        }
    };

    for (token, line) in tokens {
        match token {
            Token::Word(w) => {
                if words.is_empty() {
                    words_line = line;
                }
                words.push(w);
            }
            Token::Newline => flush(&mut words, false, words_line, &mut out),
            Token::Open => {
                flush(&mut words, false, words_line, &mut out);
                out.push(RawStatement::Open { line });
            }
            Token::Close => {
                flush(&mut words, false, words_line, &mut out);
                out.push(RawStatement::Close {
                    owner_closed: false,
                    line,
                });
            }
            Token::Semi => {
                if !words.is_empty() {
                    flush(&mut words, true, words_line, &mut out);
                } else if let Some(RawStatement::Close { owner_closed, .. }) = out.last_mut() {
                    *owner_closed = true;
                }
            }
        }
    }
    flush(&mut words, false, words_line, &mut out);
    out
}

fn parse_offset(words: &[String]) -> Option<Vector3<i32>> {
    match words {
        [x, y, z] => Some(Vector3::new(x.parse().ok()?, y.parse().ok()?, z.parse().ok()?)),
        _ => None,
    }
}

/// Split `class.subclass`; the subclass may be empty.
pub fn split_class(qualified: &str) -> (String, String) {
    match qualified.split_once('.') {
        Some((class, subclass)) => (class.to_string(), subclass.to_string()),
        None => (qualified.to_string(), String::new()),
    }
}

/// Interpret one directive. Unknown keywords yield `None` silently,
/// malformed known ones yield `None` with a warning.
pub fn parse_directive(words: &[String], line: usize) -> Option<Directive> {
    let (keyword, args) = words.split_first()?;
    let directive = match keyword.as_str() {
        "OBJECT" => match args {
            [name, class, rest @ ..] if rest.len() == 3 => {
                parse_offset(rest).map(|offset| {
                    let (class, subclass) = split_class(class);
                    Directive::Object {
                        name: name.clone(),
                        class,
                        subclass,
                        offset,
                    }
                })
            }
            // legacy nameless form
            [class, rest @ ..] if rest.len() == 3 => parse_offset(rest).map(|offset| {
                let (class, subclass) = split_class(class);
                Directive::Object {
                    name: String::new(),
                    class,
                    subclass,
                    offset,
                }
            }),
            _ => None,
        },
        "SCENE" => match args {
            [path, rest @ ..] => parse_offset(rest).map(|offset| Directive::Scene {
                path: path.clone(),
                offset,
            }),
            _ => None,
        },
        "TILEMAP" => match args {
            [path, rest @ ..] => parse_offset(rest).map(|offset| Directive::Tilemap {
                path: path.clone(),
                offset,
            }),
            _ => None,
        },
        other => {
            log::debug!("line {}: ignoring unknown directive '{}'", line, other);
            return None;
        }
    };
    if directive.is_none() {
        log::warn!("line {}: malformed {} directive skipped", line, keyword);
    }
    directive
}

/// Parse a whole scene file. Never fails: damaged input degrades to a
/// shorter body and warnings.
pub fn parse_scene(source: &str) -> SceneDocument {
    let mut statements = group(tokenize(source)).into_iter().peekable();

    let name = match statements.peek() {
        Some(RawStatement::Words { words, .. }) if words.first().is_some_and(|w| w == "SCENE") => {
            let name = words[1..].join(" ");
            statements.next();
            Some(name)
        }
        _ => {
            log::warn!("scene file has no SCENE header");
            None
        }
    };
    if let Some(RawStatement::Open { .. }) = statements.peek() {
        statements.next();
    } else {
        log::debug!("scene body has no opening brace");
    }

    let mut body = Vec::new();
    let mut depth = 0usize;
    let mut terminated = false;
    for statement in statements {
        match statement {
            RawStatement::Words {
                words,
                closed,
                line,
            } => match parse_directive(&words, line) {
                Some(directive) => body.push(Statement::Directive {
                    directive,
                    closed,
                    line,
                }),
                None => body.push(Statement::Ignored { line }),
            },
            RawStatement::Open { line } => {
                depth += 1;
                body.push(Statement::Open { line });
            }
            RawStatement::Close { owner_closed, line } => {
                if depth == 0 {
                    terminated = true;
                    break;
                }
                depth -= 1;
                body.push(Statement::Close { owner_closed, line });
            }
        }
    }
    if !terminated {
        log::warn!("scene body is missing its closing brace, stopped at end of file");
    }
    SceneDocument {
        name,
        body,
        terminated,
    }
}
