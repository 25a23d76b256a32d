//! Procedural macros for the corio runtime.
//!
//! These are re-exported from `corio` and are meant to be used through it:
//! `#[corio::main]`, `#[corio::test]`, `corio::join!` and `corio::race!`.

mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Parses generated source, turning a parse failure into a
/// `compile_error!` that names the macro.
fn emit(source: String, name: &str) -> TokenStream {
    match source.parse::<TokenStream>() {
        Ok(ts) => ts,
        Err(err) => {
            let msg = format!("{name} macro error: {err}");
            format!("compile_error!({msg:?});").parse().unwrap()
        }
    }
}

/// Runs heterogeneous futures concurrently and waits for all of them.
///
/// Every argument must be a `'static` future producing a
/// `corio::Result<_>`. The expansion awaits, so it must be used inside an
/// async context, and evaluates to `corio::Result<(A, B, ...)>`. If any
/// branch fails, the whole join fails with the first failure observed,
/// once every branch has finished.
///
/// ```rust,ignore
/// let (a, b) = corio::join!(
///     async { Ok(1) },
///     async { Ok("two") },
/// )?;
/// ```
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);
    let count = args.len();

    if count == 0 {
        return "::core::result::Result::Ok::<(), ::corio::Error>(())"
            .parse()
            .unwrap();
    }

    if count == 1 {
        let expr = utils::tokens_to_string(&args[0]);
        return emit(format!("{{ ({expr}).await }}"), "join");
    }

    let mut output = String::new();
    output.push_str("{\n");

    for i in 1..=count {
        output.push_str(&format!("let __s{i} = ::corio::__private::slot();\n"));
    }

    output.push_str("match ::corio::task::join_all(::std::vec![\n");
    for (i, expr_tokens) in args.iter().enumerate() {
        let idx = i + 1;
        let expr = utils::tokens_to_string(expr_tokens);
        output.push_str(&format!("    ::corio::__private::fill(&__s{idx}, {expr}),\n"));
    }
    output.push_str("]).await {\n");

    output.push_str("    ::core::result::Result::Ok(_) => ::core::result::Result::Ok((\n");
    for i in 1..=count {
        output.push_str(&format!("        ::corio::__private::take(&__s{i}),\n"));
    }
    output.push_str("    )),\n");
    output.push_str("    ::core::result::Result::Err(err) => ::core::result::Result::Err(err),\n");
    output.push_str("}\n");
    output.push_str("}\n");

    emit(output, "join")
}

/// Waits for the first of several heterogeneous futures and runs its
/// handler.
///
/// Each branch has the form `future => handler`, where the handler is
/// called with the winning future's value. Every future must be
/// `'static` and produce a `corio::Result<_>`; the handlers must agree on
/// a return type `H`. The expansion awaits and evaluates to
/// `corio::Result<H>`.
///
/// Losing branches are destroyed as soon as the winner finishes. A
/// failing winner makes the whole race fail without running a handler.
///
/// ```rust,ignore
/// let label = corio::race! {
///     sleep_then(10, "fast") => |v| v,
///     sleep_then(1_000, "slow") => |v| v,
/// }?;
/// ```
#[proc_macro]
pub fn race(input: TokenStream) -> TokenStream {
    let branches = utils::parse_race_branches(input);
    let count = branches.len();

    if count == 0 {
        return "::core::result::Result::Err::<(), ::corio::Error>(::corio::Error::EmptyRace)"
            .parse()
            .unwrap();
    }

    let mut out = String::new();
    out.push_str("{\n");

    let generics = (1..=count)
        .map(|i| format!("__T{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    out.push_str(&format!("enum __RaceResult<{generics}> {{\n"));
    for i in 1..=count {
        out.push_str(&format!("    __F{i}(__T{i}),\n"));
    }
    out.push_str("}\n\n");

    out.push_str("let __res = ::corio::task::race(::std::vec![\n");
    for (i, (future, _handler)) in branches.iter().enumerate() {
        let idx = i + 1;
        out.push_str(&format!(
            "    ::corio::__private::map({future}, __RaceResult::__F{idx}),\n"
        ));
    }
    out.push_str("]).await;\n\n");

    out.push_str("match __res {\n");
    out.push_str("    ::core::result::Result::Ok(__raced) => ::core::result::Result::Ok(match __raced.value {\n");
    for (i, (_future, handler)) in branches.iter().enumerate() {
        let idx = i + 1;
        out.push_str(&format!(
            "        __RaceResult::__F{idx}(val) => {{ ({handler})(val) }},\n"
        ));
    }
    out.push_str("    }),\n");
    out.push_str("    ::core::result::Result::Err(err) => ::core::result::Result::Err(err),\n");
    out.push_str("}\n");
    out.push_str("}\n");

    emit(out, "race")
}

/// Rewrites an `async fn` so its body runs as the root task of a fresh
/// runtime.
///
/// A failure surfacing from the runtime itself (a panicking body, a
/// stalled root) panics with the error message. The body's own return
/// value, `Result` or not, is passed through unchanged.
fn entry(attr: TokenStream, item: TokenStream, is_test: bool) -> TokenStream {
    let options = utils::EntryOptions::parse(attr);
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    utils::strip_async(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return TokenStream::new();
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let output = utils::return_type(&tokens, pos);
    let builder = options.builder();

    let new_block = format!(
        "{{
            let runtime = {builder}.expect(\"failed to build the corio runtime\");
            let body = ::corio::__private::returning::<{output}, _>(async move {{ {block} }});

            match runtime.block_on(async move {{
                ::core::result::Result::Ok::<_, ::corio::Error>(body.await)
            }}) {{
                ::core::result::Result::Ok(value) => value,
                ::core::result::Result::Err(err) => ::core::panic!(\"{{}}\", err),
            }}
        }}"
    );

    let Ok(body) = new_block.parse::<TokenStream>() else {
        return emit(String::from("compile_error!(\"invalid entry point body\");"), "entry");
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, body));

    let mut result: Vec<TokenTree> = Vec::new();
    if is_test {
        result.extend("#[test]".parse::<TokenStream>().unwrap());
    }
    result.extend(tokens);

    result.into_iter().collect()
}

/// Marks an `async fn main` as the program entry point.
///
/// Builds a runtime (optionally configured with `event_capacity = N` and
/// `task_capacity = N`) and blocks on the body.
///
/// ```rust,ignore
/// #[corio::main]
/// async fn main() -> corio::Result<()> {
///     corio::time::sleep(Duration::from_millis(10)).await;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    entry(attr, item, false)
}

/// Marks an `async fn` as a test that runs on its own runtime.
///
/// Accepts the same options as [`macro@main`].
///
/// ```rust,ignore
/// #[corio::test]
/// async fn sleeps() {
///     corio::time::sleep(Duration::from_millis(10)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    entry(attr, item, true)
}
