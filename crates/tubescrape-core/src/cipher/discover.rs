//! Recovering a transform program from player script text
//!
//! Helper names in the player script are minified and change with every
//! release, so nothing here matches on names. Discovery goes:
//!
//! 1. find the decode function from the short call expression that feeds
//!    the signature into `encodeURIComponent` (falling back to the
//!    `x=function(a){a=a.split("")` definition shape);
//! 2. read its body as `split`, a list of `OBJ.member(a, N)` calls, `join`;
//! 3. locate `OBJ`'s object literal and classify each member by the shape
//!    of its body after parameter names are normalized.
//!
//! Anything that deviates from this shape is reported as
//! `UnrecognizedCipherScheme` rather than guessed at.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use tracing::debug;

use crate::cipher::program::{TransformOp, TransformProgram};
use crate::error::{Result, TubeError};
use crate::parser::embedded::extract_json_object;

/// Call sites of the decode function
const CALL_SITE_PATTERNS: &[&str] = &[
    r#"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*([a-zA-Z0-9$]+)\("#,
    r#"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*([a-zA-Z0-9$]+)\("#,
    r#"\bc\s*&&\s*d\.set\([^,]+\s*,\s*\([^)]*\)\s*\(\s*([a-zA-Z0-9$]+)\("#,
];

/// Definitions shaped like the decode function
const DEFINITION_PATTERNS: &[&str] = &[
    r#"(?:^|[^a-zA-Z0-9$.])([a-zA-Z0-9$]+)\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*(?:""|'')\s*\)"#,
    r#"function\s+([a-zA-Z0-9$]+)\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*(?:""|'')\s*\)"#,
];

const IDENT: &str = r"[a-zA-Z_$][a-zA-Z0-9_$]*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Reverse,
    Splice,
    Swap,
}

/// One `OBJ.member(param, arg)` statement of the decode function
#[derive(Debug, PartialEq, Eq)]
struct HelperCall {
    object: String,
    member: String,
    arg: Option<usize>,
}

fn unrecognized(message: impl Into<String>) -> TubeError {
    TubeError::UnrecognizedCipherScheme(message.into())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| unrecognized(format!("pattern error: {}", e)))
}

fn distinct_captures(script: &str, patterns: &[&str]) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for pattern in patterns {
        let re = compile(pattern)?;
        for caps in re.captures_iter(script) {
            names.insert(caps[1].to_string());
        }
    }
    Ok(names)
}

/// Name of the function applied to the signature
fn find_decode_function_name(script: &str) -> Result<String> {
    let mut names = distinct_captures(script, CALL_SITE_PATTERNS)?;
    if names.is_empty() {
        debug!("no decode call site found, trying definition shapes");
        names = distinct_captures(script, DEFINITION_PATTERNS)?;
    }

    match names.len() {
        0 => Err(unrecognized("decode function not found")),
        1 => names
            .pop_first()
            .ok_or_else(|| unrecognized("decode function not found")),
        _ => Err(unrecognized(format!(
            "ambiguous decode function candidates: {}",
            names.into_iter().collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// `(parameter, body)` of the function named `name`
fn find_function_definition(script: &str, name: &str) -> Result<(String, String)> {
    let escaped = regex::escape(name);
    let patterns = [
        format!(
            r"(?:^|[^a-zA-Z0-9$.]){}\s*=\s*function\s*\(\s*([a-zA-Z0-9$]+)\s*\)\s*\{{([^}}]*)\}}",
            escaped
        ),
        format!(
            r"function\s+{}\s*\(\s*([a-zA-Z0-9$]+)\s*\)\s*\{{([^}}]*)\}}",
            escaped
        ),
    ];

    let mut found: Vec<(String, String)> = Vec::new();
    for pattern in &patterns {
        let re = compile(pattern)?;
        for caps in re.captures_iter(script) {
            let candidate = (caps[1].to_string(), caps[2].to_string());
            if !found.contains(&candidate) {
                found.push(candidate);
            }
        }
    }

    match found.len() {
        0 => Err(unrecognized(format!("definition of {} not found", name))),
        1 => Ok(found.remove(0)),
        n => Err(unrecognized(format!("{} conflicting definitions of {}", n, name))),
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Splits the decode body into helper calls, checking the split/join frame
fn parse_decode_body(param: &str, body: &str) -> Result<Vec<HelperCall>> {
    let statements: Vec<String> = body
        .split(';')
        .map(strip_whitespace)
        .filter(|s| !s.is_empty())
        .collect();

    let split_forms = [format!("{p}={p}.split(\"\")", p = param), format!("{p}={p}.split('')", p = param)];
    let join_forms = [format!("return{}.join(\"\")", param), format!("return{}.join('')", param)];

    let (first, rest) = statements
        .split_first()
        .ok_or_else(|| unrecognized("decode function body is empty"))?;
    if !split_forms.contains(first) {
        return Err(unrecognized("decode function does not start with split"));
    }
    let (last, middle) = rest
        .split_last()
        .ok_or_else(|| unrecognized("decode function has no join"))?;
    if !join_forms.contains(last) {
        return Err(unrecognized("decode function does not end with join"));
    }

    let call_re = compile(r#"^([a-zA-Z0-9$]+)(?:\.([a-zA-Z0-9$]+)|\[["']([a-zA-Z0-9$]+)["']\])\(([a-zA-Z0-9$]+)(?:,(\d+))?\)$"#)?;

    let mut calls = Vec::with_capacity(middle.len());
    for statement in middle {
        let caps = call_re
            .captures(statement)
            .ok_or_else(|| unrecognized(format!("unexpected statement in decode function: {}", statement)))?;
        if &caps[4] != param {
            return Err(unrecognized(format!("helper call on foreign value: {}", statement)));
        }
        let member = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| unrecognized(format!("helper call without member: {}", statement)))?;
        let arg = match caps.get(5) {
            Some(m) => Some(
                m.as_str()
                    .parse::<usize>()
                    .map_err(|_| unrecognized(format!("argument out of range: {}", statement)))?,
            ),
            None => None,
        };
        calls.push(HelperCall {
            object: caps[1].to_string(),
            member,
            arg,
        });
    }

    if calls.is_empty() {
        return Err(unrecognized("decode function calls no helpers"));
    }
    if calls.iter().any(|c| c.object != calls[0].object) {
        return Err(unrecognized("decode function uses more than one helper object"));
    }
    Ok(calls)
}

/// Source text of the `OBJ = {...}` literal, braces included
fn find_helper_object<'a>(script: &'a str, object: &str) -> Result<&'a str> {
    let re = compile(&format!(
        r"(?:^|var\s+|let\s+|const\s+|[;,{{(\s]){}\s*=\s*\{{",
        regex::escape(object)
    ))?;

    let mut literals: Vec<&str> = Vec::new();
    for m in re.find_iter(script) {
        let from = m.end() - 1;
        if let Some(literal) = extract_json_object(&script[from..])
            && !literals.contains(&literal)
        {
            literals.push(literal);
        }
    }

    match literals.len() {
        0 => Err(unrecognized(format!("helper object {} not found", object))),
        1 => Ok(literals[0]),
        n => Err(unrecognized(format!("{} conflicting definitions of helper object {}", n, object))),
    }
}

/// Rewrites parameter identifiers to `A`, `B`, ... and drops whitespace
fn normalize_body(params: &[&str], body: &str) -> String {
    let ident = match Regex::new(IDENT) {
        Ok(re) => re,
        Err(_) => return strip_whitespace(body),
    };
    let renamed = ident.replace_all(body, |caps: &regex::Captures<'_>| {
        match params.iter().position(|p| *p == &caps[0]) {
            Some(0) => "A".to_string(),
            Some(1) => "B".to_string(),
            _ => caps[0].to_string(),
        }
    });
    strip_whitespace(&renamed).trim_end_matches(';').to_string()
}

fn is_swap_shape(normalized: &str) -> bool {
    let pattern = format!(
        r"^var({id})=A\[0\];A\[0\]=A\[(B%A\.length|B)\];A\[(B%A\.length|B)\]=({id})$",
        id = IDENT
    );
    let Ok(re) = Regex::new(&pattern) else {
        return false;
    };
    re.captures(normalized)
        .is_some_and(|caps| caps[1] == caps[4] && caps[2] == caps[3])
}

fn classify_member(params: &[&str], body: &str) -> Option<OpKind> {
    let normalized = normalize_body(params, body);
    match normalized.as_str() {
        "A.reverse()" => Some(OpKind::Reverse),
        "A.splice(0,B)" => Some(OpKind::Splice),
        other if is_swap_shape(other) => Some(OpKind::Swap),
        _ => None,
    }
}

/// Classifies every function member of a helper object literal
fn classify_members(literal: &str) -> Result<HashMap<String, Option<OpKind>>> {
    let re = compile(
        r#"(?:^|[{,])\s*["']?([a-zA-Z0-9$]+)["']?\s*:\s*function\s*\(([^)]*)\)\s*\{([^}]*)\}"#,
    )?;

    let mut members = HashMap::new();
    for caps in re.captures_iter(literal) {
        let params: Vec<&str> = caps[2].split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        members.insert(caps[1].to_string(), classify_member(&params, &caps[3]));
    }
    Ok(members)
}

/// Derives the transform program used by a player script
///
/// # Errors
/// Returns `UnrecognizedCipherScheme` if the script does not follow the
/// split / helper calls / join shape, or if more than one candidate
/// matches at any step.
pub fn discover_program(script: &str) -> Result<TransformProgram> {
    let name = find_decode_function_name(script)?;
    let (param, body) = find_function_definition(script, &name)?;
    let calls = parse_decode_body(&param, &body)?;

    let object = &calls[0].object;
    let literal = find_helper_object(script, object)?;
    let members = classify_members(literal)?;
    debug!(function = %name, helper = %object, members = members.len(), "located cipher helpers");

    let mut ops = Vec::with_capacity(calls.len());
    for call in &calls {
        let kind = match members.get(&call.member) {
            Some(Some(kind)) => *kind,
            Some(None) => {
                return Err(unrecognized(format!(
                    "helper {}.{} has an unrecognized body",
                    object, call.member
                )));
            }
            None => {
                return Err(unrecognized(format!(
                    "helper {}.{} is not defined",
                    object, call.member
                )));
            }
        };

        let op = match (kind, call.arg) {
            (OpKind::Reverse, _) => TransformOp::Reverse,
            (OpKind::Splice, Some(n)) => TransformOp::Splice(n),
            (OpKind::Swap, Some(n)) => TransformOp::Swap(n),
            (_, None) => {
                return Err(unrecognized(format!(
                    "helper {}.{} called without an argument",
                    object, call.member
                )));
            }
        };
        ops.push(op);
    }

    Ok(TransformProgram::new(ops))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal player script in the usual minified layout
    pub(crate) const PLAYER_SCRIPT: &str = r#"
var _yt_player={};(function(g){var window=this;
var Xy={ab:function(a,b){a.splice(0,b)},
cd:function(a){a.reverse()},
Ef:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
Ti=function(a){a=a.split("");Xy.Ef(a,3);Xy.cd(a,45);Xy.ab(a,2);Xy.Ef(a,47);return a.join("")};
g.Lk=function(a){var b=a.split("");return b.length};
var Wq=function(a,b,c,d){c&&d.set(b,encodeURIComponent(Ti(decodeURIComponent(c))))};
})(_yt_player);
"#;

    /// Expected output of `PLAYER_SCRIPT`'s program for "abcdefghij"
    pub(crate) const DECODED_SAMPLE: &str = "dgfeacbh";

    #[test]
    fn test_discover_program() {
        let program = discover_program(PLAYER_SCRIPT).unwrap();
        assert_eq!(
            program.ops(),
            &[
                TransformOp::Swap(3),
                TransformOp::Reverse,
                TransformOp::Splice(2),
                TransformOp::Swap(47),
            ]
        );
        assert_eq!(program.apply("abcdefghij"), DECODED_SAMPLE);
    }

    #[test]
    fn test_discover_with_renamed_helpers() {
        let script = r#"
var $Q={"Rv":function(x){x.reverse()},Sp:function(x,n){x.splice(0,n)},
Sw:function(x,n){var t=x[0];x[0]=x[n];x[n]=t}};
var dk=function(z){z=z.split('');$Q["Rv"](z,1);$Q.Sw(z,5);$Q.Sp(z,1);return z.join('')};
s&&f.set(k,encodeURIComponent(dk(s)))
"#;
        let program = discover_program(script).unwrap();
        assert_eq!(
            program.ops(),
            &[TransformOp::Reverse, TransformOp::Swap(5), TransformOp::Splice(1)]
        );
    }

    #[test]
    fn test_falls_back_to_definition_shape() {
        let script = r#"
var Zz={r:function(a){a.reverse()}};
Qa=function(a){a=a.split("");Zz.r(a,0);return a.join("")};
"#;
        let program = discover_program(script).unwrap();
        assert_eq!(program.ops(), &[TransformOp::Reverse]);
    }

    #[test]
    fn test_no_decode_function() {
        let err = discover_program("var a=1;function b(){return 2}").unwrap_err();
        assert!(matches!(err, TubeError::UnrecognizedCipherScheme(_)));
    }

    #[test]
    fn test_ambiguous_call_sites() {
        let script = r#"
var Xy={cd:function(a){a.reverse()}};
Ti=function(a){a=a.split("");Xy.cd(a,1);return a.join("")};
Tj=function(a){a=a.split("");Xy.cd(a,1);return a.join("")};
c&&d.set(b,encodeURIComponent(Ti(c)));
c&&d.set(b,encodeURIComponent(Tj(c)));
"#;
        let err = discover_program(script).unwrap_err();
        match err {
            TubeError::UnrecognizedCipherScheme(msg) => assert!(msg.contains("ambiguous")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_helper_body() {
        let script = r#"
var Xy={cd:function(a,b){a.push(b)}};
Ti=function(a){a=a.split("");Xy.cd(a,1);return a.join("")};
c&&d.set(b,encodeURIComponent(Ti(c)));
"#;
        assert!(matches!(
            discover_program(script),
            Err(TubeError::UnrecognizedCipherScheme(_))
        ));
    }

    #[test]
    fn test_unexpected_statement_in_decode_body() {
        let script = r#"
var Xy={cd:function(a){a.reverse()}};
Ti=function(a){a=a.split("");Xy.cd(a,1);a=a.slice(1);return a.join("")};
c&&d.set(b,encodeURIComponent(Ti(c)));
"#;
        assert!(matches!(
            discover_program(script),
            Err(TubeError::UnrecognizedCipherScheme(_))
        ));
    }

    #[test]
    fn test_missing_helper_object() {
        let script = r#"
Ti=function(a){a=a.split("");Xy.cd(a,1);return a.join("")};
c&&d.set(b,encodeURIComponent(Ti(c)));
"#;
        assert!(matches!(
            discover_program(script),
            Err(TubeError::UnrecognizedCipherScheme(_))
        ));
    }

    #[test]
    fn test_classify_member_shapes() {
        assert_eq!(classify_member(&["q"], " q.reverse() "), Some(OpKind::Reverse));
        assert_eq!(classify_member(&["q", "w"], "q.splice(0, w)"), Some(OpKind::Splice));
        assert_eq!(
            classify_member(&["q", "w"], "var e=q[0];q[0]=q[w%q.length];q[w%q.length]=e"),
            Some(OpKind::Swap)
        );
        // temp variable mismatch
        assert_eq!(
            classify_member(&["q", "w"], "var e=q[0];q[0]=q[w];q[w]=r"),
            None
        );
        assert_eq!(classify_member(&["q", "w"], "q.splice(1,w)"), None);
    }
}
