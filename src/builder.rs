//! Build entry points.
//!
//! [`build_text`] normalizes source, runs the parser and hands the raw
//! tree to the rebuilder; [`build_file`] first detects the file's
//! encoding from a byte-order mark or a declaration comment, failing the
//! build on unknown or contradictory declarations. A failed build yields
//! no tree at all; the error carries module name, path and the offending
//! source.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{position_span, ArborError, ErrorKind, SourceContext, SourceInfo};
use crate::nodes::Dialect;
use crate::parse::{self, ParseError};
use crate::rebuild::Rebuilder;
use crate::tree::Tree;

/// Builds a tree from source text.
pub fn build_text(
    code: &str,
    module_name: &str,
    path: Option<&Path>,
) -> Result<Tree, ArborError> {
    let code = dedent(code);
    let raw = match parse::parse_module(&code) {
        Ok(raw) => raw,
        Err(error) => return Err(syntax_error(error, &code, module_name, path)),
    };
    let (module_name, package) = package_split(module_name, path);
    let mut rebuilder = Rebuilder::new(Dialect::Python3);
    let module = rebuilder.module(
        &raw,
        &module_name,
        path.map(Path::to_path_buf),
        package,
        Some(code.clone().into_bytes()),
        Some("utf-8".to_string()),
    )?;
    Ok(Tree::new(module, Dialect::Python3))
}

/// Convenience wrapper for anonymous source snippets.
pub fn parse(code: &str) -> Result<Tree, ArborError> {
    build_text(code, "", None)
}

/// Builds a tree from a file on disk, honoring its declared encoding.
pub fn build_file(path: &Path, module_name: &str) -> Result<Tree, ArborError> {
    let bytes = fs::read(path).map_err(|error| {
        ArborError::bare(ErrorKind::Building {
            detail: format!("unable to read {}: {}", path.display(), error),
        })
        .with_module(module_name.to_string())
        .with_path(path.to_path_buf())
    })?;
    let (text, encoding) = decode_source(&bytes, module_name, path)?;
    let code = dedent(&text);
    let raw = match parse::parse_module(&code) {
        Ok(raw) => raw,
        Err(error) => return Err(syntax_error(error, &code, module_name, Some(path))),
    };
    let (module_name, package) = package_split(module_name, Some(path));
    let mut rebuilder = Rebuilder::new(Dialect::Python3);
    let module = rebuilder.module(
        &raw,
        &module_name,
        Some(path.to_path_buf()),
        package,
        Some(code.into_bytes()),
        Some(encoding),
    )?;
    Ok(Tree::new(module, Dialect::Python3))
}

fn syntax_error(
    error: ParseError,
    code: &str,
    module_name: &str,
    path: Option<&Path>,
) -> ArborError {
    let (line, column) = error.position();
    let name = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| {
            if module_name.is_empty() {
                "<string>".to_string()
            } else {
                module_name.to_string()
            }
        });
    ArborError::new(
        ErrorKind::Syntax {
            detail: error.to_string(),
        },
        SourceInfo {
            source: Some(SourceContext::new(name, code).to_named_source()),
            span: position_span(code, line, column),
            module: Some(module_name.to_string()),
            path: path.map(|p| p.to_path_buf()),
        },
    )
}

/// A module named `pkg.__init__` is the package `pkg`; a file named
/// `__init__.py` marks its module as a package too.
fn package_split(module_name: &str, path: Option<&Path>) -> (String, bool) {
    if let Some(stripped) = module_name.strip_suffix(".__init__") {
        return (stripped.to_string(), true);
    }
    let from_path = path
        .map(|p| {
            p.file_name()
                .map(|f| f == "__init__.py")
                .unwrap_or(false)
        })
        .unwrap_or(false);
    (module_name.to_string(), from_path)
}

static CODING_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"coding[:=]\s*([-\w.]+)").expect("coding declaration pattern"));

/// Finds a declaration comment in the first two lines.
fn declared_encoding(text: &str) -> Option<String> {
    for line in text.lines().take(2) {
        if !line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(captures) = CODING_DECLARATION.captures(line) {
            return Some(captures[1].to_string());
        }
    }
    None
}

fn decode_source(
    bytes: &[u8],
    module_name: &str,
    path: &Path,
) -> Result<(String, String), ArborError> {
    let context = |error: ArborError| {
        error
            .with_module(module_name.to_string())
            .with_path(path.to_path_buf())
    };
    let (body, bom_encoding) = if let Some(rest) = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        (rest, Some("utf-8"))
    } else if bytes.starts_with(&[0xff, 0xfe]) {
        (bytes, Some("utf-16le"))
    } else if bytes.starts_with(&[0xfe, 0xff]) {
        (bytes, Some("utf-16be"))
    } else {
        (bytes, None)
    };
    // Sniff the declaration from a permissive ASCII view of the prologue.
    let prologue: String = body
        .iter()
        .take(256)
        .map(|&b| if b.is_ascii() { b as char } else { ' ' })
        .collect();
    let declared = declared_encoding(&prologue);
    if let (Some(declared), Some(detected)) = (declared.as_deref(), bom_encoding) {
        let declared_canonical = encoding_rs::Encoding::for_label(declared.as_bytes());
        let detected_canonical = encoding_rs::Encoding::for_label(detected.as_bytes());
        if declared_canonical != detected_canonical {
            return Err(context(ArborError::bare(ErrorKind::EncodingMismatch {
                declared: declared.to_string(),
                detected: detected.to_string(),
            })));
        }
    }
    let label = declared
        .as_deref()
        .or(bom_encoding)
        .unwrap_or("utf-8")
        .to_string();
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        context(ArborError::bare(ErrorKind::UnknownEncoding {
            declared: label.clone(),
        }))
    })?;
    let (decoded, _, had_errors) = encoding.decode(body);
    if had_errors {
        return Err(context(ArborError::bare(ErrorKind::Building {
            detail: format!("source is not valid {}", encoding.name()),
        })));
    }
    Ok((decoded.into_owned(), label))
}

/// Strips the longest common leading whitespace from every non-blank
/// line, so indented snippet literals parse as top-level code.
pub fn dedent(code: &str) -> String {
    let mut common: Option<usize> = None;
    for line in code.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        common = Some(common.map_or(indent, |current| current.min(indent)));
    }
    let cut = common.unwrap_or(0);
    if cut == 0 {
        return code.to_string();
    }
    let mut out: Vec<&str> = Vec::new();
    for line in code.lines() {
        if line.len() >= cut {
            out.push(&line[cut..]);
        } else {
            out.push("");
        }
    }
    let mut joined = out.join("\n");
    if code.ends_with('\n') {
        joined.push('\n');
    }
    joined
}
