//! Call-site pattern sets for the Python analyzer.
//!
//! A call whose target expression matches one of these produces an
//! `ApiCall` or `DatabaseQuery` node in addition to the plain relationship
//! stub, carrying the URL or query string when the first argument is a
//! string literal.

use std::sync::OnceLock;

use regex::RegexSet;

const API_CALL_PATTERNS: [&str; 5] = [
    r"(?:^|\.)requests\.(?:get|post|put|delete|patch|head|options)$",
    r"(?:^|\.)httpx\.(?:get|post|put|delete|patch|head|options)$",
    r"urllib\.request\.urlopen$",
    r"(?:^|\.)session\.(?:get|post|put|delete|patch)$",
    r"(?:^|\.)fetch$",
];

const DB_CALL_PATTERNS: [&str; 4] = [
    r"(?:^|\.)cursor\.execute(?:many)?$",
    r"(?:^|\.)connection\.execute$",
    r"(?:^|\.)session\.(?:query|execute)$",
    r"(?:^|\.)db\.execute$",
];

/// HTTP route decorators that declare an endpoint.
const ROUTE_DECORATOR_PATTERN: &str =
    r"^@?\s*\w+\.(?:route|get|post|put|delete|patch|head|options|websocket)\s*\(";

pub fn is_api_call(call_target: &str) -> bool {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(API_CALL_PATTERNS).expect("api patterns compile"))
        .is_match(call_target)
}

pub fn is_db_call(call_target: &str) -> bool {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(DB_CALL_PATTERNS).expect("db patterns compile"))
        .is_match(call_target)
}

/// Extract the HTTP method and route path from a decorator's source text,
/// e.g. `@app.get("/items/list")` → `("get", "/items/list")`.
pub fn route_decorator(decorator_text: &str) -> Option<(String, String)> {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(ROUTE_DECORATOR_PATTERN).expect("route pattern"));
    if !re.is_match(decorator_text) {
        return None;
    }

    let method = decorator_text
        .split('(')
        .next()?
        .rsplit('.')
        .next()?
        .trim()
        .to_lowercase();

    // First string literal argument is the path.
    let args = &decorator_text[decorator_text.find('(')? + 1..];
    let quote = args.find(['"', '\''])?;
    let quote_char = args.as_bytes()[quote] as char;
    let rest = &args[quote + 1..];
    let end = rest.find(quote_char)?;
    let path = &rest[..end];
    if !path.starts_with('/') {
        return None;
    }
    Some((method, path.to_string()))
}
