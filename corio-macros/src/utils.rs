use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`.
/// Commas at the top level are used as separators; commas nested in a
/// group (parentheses, brackets, braces) belong to that group's single
/// token and never split.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts a slice of tokens into a Rust source string.
///
/// Inserts spaces between consecutive identifiers to avoid accidental
/// token merging (e.g. `move x` vs `movex`).
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let is_ident = matches!(t, TokenTree::Ident(_) | TokenTree::Literal(_));

        if prev_was_ident && is_ident {
            out.push(' ');
        }

        out.push_str(&t.to_string());
        prev_was_ident = is_ident;
    }

    out
}

/// Returns `true` if the tokens at position `i` form a `=>` arrow.
fn is_arrow(tokens: &[TokenTree], i: usize) -> bool {
    if i + 1 >= tokens.len() {
        return false;
    }

    matches!(
        (&tokens[i], &tokens[i + 1]),
        (TokenTree::Punct(p1), TokenTree::Punct(p2))
            if p1.as_char() == '=' && p2.as_char() == '>'
    )
}

/// Parses `race`-style branches from a token stream.
///
/// Each branch is expected to have the form:
///
/// ```text
/// future_expr => handler_expr
/// ```
///
/// Multiple branches must be separated by commas.
///
/// The result is a list of `(future, handler)` pairs, both returned as
/// source strings. Branches missing either side are ignored.
pub(crate) fn parse_race_branches(input: TokenStream) -> Vec<(String, String)> {
    let mut branches = Vec::new();

    for tokens in split_args(input) {
        let split = (0..tokens.len()).find(|&i| is_arrow(&tokens, i));

        let Some(split) = split else {
            continue;
        };

        let future = tokens_to_string(&tokens[..split]);
        let handler = tokens_to_string(&tokens[split + 2..]);

        if !future.trim().is_empty() && !handler.trim().is_empty() {
            branches.push((future, handler));
        }
    }

    branches
}

/// Runtime options accepted by `#[corio::main]` and `#[corio::test]`.
#[derive(Default)]
pub(crate) struct EntryOptions {
    pub(crate) event_capacity: Option<usize>,
    pub(crate) task_capacity: Option<usize>,
}

impl EntryOptions {
    /// Parses `key = value` pairs such as `event_capacity = 256`.
    ///
    /// Unknown keys and malformed values are ignored.
    pub(crate) fn parse(attr: TokenStream) -> Self {
        let mut options = Self::default();
        let attr = attr.to_string();

        for part in attr.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            let value = value.trim().parse::<usize>().ok();

            match key.trim() {
                "event_capacity" => options.event_capacity = value,
                "task_capacity" => options.task_capacity = value,
                _ => {}
            }
        }

        options
    }

    /// Source for an expression building the configured runtime.
    pub(crate) fn builder(&self) -> String {
        let mut builder = String::from("::corio::Builder::new()");

        if let Some(n) = self.event_capacity {
            builder.push_str(&format!(".event_capacity({n})"));
        }

        if let Some(n) = self.task_capacity {
            builder.push_str(&format!(".task_capacity({n})"));
        }

        builder.push_str(".build()");
        builder
    }
}

/// Position of a function's body: its last brace-delimited group.
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// The declared return type of a function, or `()` if it has none.
///
/// Only the tokens between `->` and the body are considered, which is
/// enough for entry points since they take no generics.
pub(crate) fn return_type(tokens: &[TokenTree], body: usize) -> String {
    let arrow = (0..body).find(|&i| {
        matches!(
            (&tokens[i], tokens.get(i + 1)),
            (TokenTree::Punct(p1), Some(TokenTree::Punct(p2)))
                if p1.as_char() == '-' && p2.as_char() == '>'
        )
    });

    match arrow {
        Some(i) => tokens[i + 2..body]
            .iter()
            .cloned()
            .collect::<TokenStream>()
            .to_string(),
        None => String::from("()"),
    }
}

/// Removes the `async` keyword from a function signature.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) {
    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }
}
