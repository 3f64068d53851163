//! Patch model and engine.
//!
//! A [`PatchSet`] lists target files. Each [`FilePatch`] carries a signature
//! string that only the patched form contains, plus ordered [`Rewrite`]s.
//! A file whose text already contains the signature is left alone, which
//! makes applying a set twice a no-op.
//!
//! Rewrites are computed in memory for every file first. Nothing is written
//! unless every rewrite of every file matched and each result carries its
//! signature.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PatchError, Result};

/// One textual rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Rewrite {
    /// Every `<expr> == SENTINEL` becomes
    /// `(<expr> == SENTINEL || <expr> == ALTERNATE)`.
    BroadenSentinel { sentinel: String, alternate: String },
    /// Insert `guard` before each line matching the `call` pattern, at
    /// that line's indentation.
    GuardBeforeCall { call: String, guard: String },
    /// Replace the body of the first function whose declaration matches
    /// `function` with `body`.
    NeutralizeBody { function: String, body: String },
    /// Insert `block` after the first line matching `anchor`.
    BlockAfterAnchor { anchor: String, block: String },
    /// Replace every literal occurrence of `find`.
    Replace { find: String, replace: String },
}

impl fmt::Display for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rewrite::BroadenSentinel { sentinel, .. } => write!(f, "broaden-sentinel `{sentinel}`"),
            Rewrite::GuardBeforeCall { call, .. } => write!(f, "guard-before-call `{call}`"),
            Rewrite::NeutralizeBody { function, .. } => write!(f, "neutralize-body `{function}`"),
            Rewrite::BlockAfterAnchor { anchor, .. } => write!(f, "block-after-anchor `{anchor}`"),
            Rewrite::Replace { find, .. } => {
                let first = find.lines().next().unwrap_or_default();
                write!(f, "replace `{first}`")
            }
        }
    }
}

fn compile(rewrite: &Rewrite, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| PatchError::InvalidPattern {
        rewrite: rewrite.to_string(),
        source,
    })
}

/// Indent each non-empty line of `text` with `indent`.
fn indent_lines(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

impl Rewrite {
    /// Apply to `text`. `Ok(None)` means the anchor did not match.
    pub fn apply(&self, text: &str) -> Result<Option<String>> {
        match self {
            Rewrite::BroadenSentinel {
                sentinel,
                alternate,
            } => {
                // `\b` only holds after a word character.
                let ends_in_word = sentinel
                    .chars()
                    .last()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_');
                let pattern = format!(
                    r"(?P<lhs>[A-Za-z_][\w.\->\[\]]*)\s*==\s*{}{}",
                    regex::escape(sentinel),
                    if ends_in_word { r"\b" } else { "" }
                );
                let re = compile(self, &pattern)?;
                if !re.is_match(text) {
                    return Ok(None);
                }
                let out = re.replace_all(text, |caps: &Captures| {
                    let lhs = &caps["lhs"];
                    format!("({lhs} == {sentinel} || {lhs} == {alternate})")
                });
                Ok(Some(out.into_owned()))
            }
            Rewrite::GuardBeforeCall { call, guard } => {
                let pattern = format!(r"(?m)^(?P<indent>[ \t]*)(?P<line>.*(?:{call}).*)$");
                let re = compile(self, &pattern)?;
                if !re.is_match(text) {
                    return Ok(None);
                }
                let out = re.replace_all(text, |caps: &Captures| {
                    let indent = &caps["indent"];
                    format!("{}\n{indent}{}", indent_lines(guard, indent), &caps["line"])
                });
                Ok(Some(out.into_owned()))
            }
            Rewrite::NeutralizeBody { function, body } => {
                let re = compile(self, function)?;
                let Some(m) = re.find(text) else {
                    return Ok(None);
                };
                let Some(open) = text[m.end()..].find('{').map(|i| m.end() + i) else {
                    return Ok(None);
                };
                let Some(close) = matching_brace(text, open) else {
                    return Ok(None);
                };
                Ok(Some(format!(
                    "{}{{\n{}\n{}",
                    &text[..open],
                    body.trim_end_matches('\n'),
                    &text[close..]
                )))
            }
            Rewrite::BlockAfterAnchor { anchor, block } => {
                let re = compile(self, &format!("(?m){anchor}"))?;
                let Some(m) = re.find(text) else {
                    return Ok(None);
                };
                let line_end = text[m.end()..]
                    .find('\n')
                    .map(|i| m.end() + i)
                    .unwrap_or(text.len());
                Ok(Some(format!(
                    "{}\n{}{}",
                    &text[..line_end],
                    block.trim_end_matches('\n'),
                    &text[line_end..]
                )))
            }
            Rewrite::Replace { find, replace } => {
                if find.is_empty() || !text.contains(find.as_str()) {
                    return Ok(None);
                }
                Ok(Some(text.replace(find.as_str(), replace)))
            }
        }
    }
}

/// Whether a file already carries its patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Unpatched,
    Patched,
}

/// Rewrites for one file, relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatch {
    pub path: PathBuf,
    /// Substring present only in the patched form.
    pub signature: String,
    #[serde(default, rename = "rewrite")]
    pub rewrites: Vec<Rewrite>,
}

impl FilePatch {
    pub fn state(&self, text: &str) -> PatchState {
        if text.contains(&self.signature) {
            PatchState::Patched
        } else {
            PatchState::Unpatched
        }
    }

    /// Run every rewrite over `text`. Any miss is an error naming the file
    /// and the rewrite.
    pub fn rewrite(&self, text: &str) -> Result<String> {
        let mut current = text.to_string();
        for rewrite in &self.rewrites {
            match rewrite.apply(&current)? {
                Some(next) => {
                    debug!("{}: applied {rewrite}", self.path.display());
                    current = next;
                }
                None => {
                    return Err(PatchError::AnchorNotFound {
                        path: self.path.clone(),
                        rewrite: rewrite.to_string(),
                    })
                }
            }
        }
        if self.state(&current) != PatchState::Patched {
            return Err(PatchError::SignatureMissing {
                path: self.path.clone(),
                signature: self.signature.clone(),
            });
        }
        Ok(current)
    }
}

/// A named group of file patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "file")]
    pub files: Vec<FilePatch>,
}

/// What happened (or would happen) to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub before: PatchState,
    /// Number of rewrites applied; zero when already patched.
    pub rewrites: usize,
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.before {
            PatchState::Patched => write!(f, "{}: already patched", self.path.display()),
            PatchState::Unpatched => write!(
                f,
                "{}: {} rewrite(s)",
                self.path.display(),
                self.rewrites
            ),
        }
    }
}

impl PatchSet {
    /// Parse a patch set from TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a patch set from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PatchError::MissingFile {
                    path: path.to_path_buf(),
                }
            } else {
                PatchError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_toml(&text)
    }

    /// Patch every file under `root`.
    pub fn apply(&self, root: &Path) -> Result<Vec<FileOutcome>> {
        let planned = self.plan(root)?;
        let mut outcomes = Vec::with_capacity(planned.len());
        for (outcome, patched) in planned {
            if let Some(text) = patched {
                let path = root.join(&outcome.path);
                std::fs::write(&path, text).map_err(|source| PatchError::Io {
                    path: path.clone(),
                    source,
                })?;
                info!("patched {}", outcome.path.display());
            } else {
                info!("{} already patched", outcome.path.display());
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Report what [`PatchSet::apply`] would do without writing.
    pub fn check(&self, root: &Path) -> Result<Vec<FileOutcome>> {
        Ok(self.plan(root)?.into_iter().map(|(o, _)| o).collect())
    }

    fn plan(&self, root: &Path) -> Result<Vec<(FileOutcome, Option<String>)>> {
        let mut texts = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = root.join(&file.path);
            if !path.is_file() {
                return Err(PatchError::MissingFile { path });
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|source| PatchError::Io { path, source })?;
            texts.push(text);
        }

        self.files
            .iter()
            .zip(texts)
            .map(|(file, text)| -> Result<(FileOutcome, Option<String>)> {
                let before = file.state(&text);
                let patched = match before {
                    PatchState::Patched => None,
                    PatchState::Unpatched => Some(file.rewrite(&text)?),
                };
                let outcome = FileOutcome {
                    path: file.path.clone(),
                    before,
                    rewrites: if patched.is_some() {
                        file.rewrites.len()
                    } else {
                        0
                    },
                };
                Ok((outcome, patched))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str = "PATCHED_MARKER";

    fn sample_set() -> PatchSet {
        PatchSet {
            name: "sample".into(),
            description: String::new(),
            files: vec![FilePatch {
                path: "src/Caps.cpp".into(),
                signature: SIGNATURE.into(),
                rewrites: vec![
                    Rewrite::BroadenSentinel {
                        sentinel: "LIMIT_UNDEFINED".into(),
                        alternate: "UINT32_MAX".into(),
                    },
                    Rewrite::GuardBeforeCall {
                        call: r"\.GetLimits\(".into(),
                        guard: "if (!device) { return; }".into(),
                    },
                    Rewrite::BlockAfterAnchor {
                        anchor: r#"^#include "Caps.h""#.into(),
                        block: "// PATCHED_MARKER\n#if defined(__EMSCRIPTEN__)\n#include <emscripten.h>\n#endif".into(),
                    },
                ],
            }],
        }
    }

    const CAPS_SRC: &str = r#"#include "Caps.h"
#include <cstdint>

void Caps::init(Device device) {
    Limits limits;
    device.GetLimits(&limits);
    if (limits.maxBindGroups == LIMIT_UNDEFINED) {
        fMaxBindGroups = 4;
    }
}
"#;

    fn write_tree(root: &Path) {
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/Caps.cpp"), CAPS_SRC).unwrap();
    }

    #[test]
    fn broaden_sentinel_rewrites_comparison() {
        let rw = Rewrite::BroadenSentinel {
            sentinel: "LIMIT_UNDEFINED".into(),
            alternate: "UINT32_MAX".into(),
        };
        let out = rw.apply("if (l.max == LIMIT_UNDEFINED) {").unwrap().unwrap();
        assert_eq!(
            out,
            "if ((l.max == LIMIT_UNDEFINED || l.max == UINT32_MAX)) {"
        );
        assert!(rw.apply("if (l.max == OTHER) {").unwrap().is_none());
        assert!(rw.apply("if (l.max == LIMIT_UNDEFINED_2) {").unwrap().is_none());
    }

    #[test]
    fn broaden_sentinel_ending_in_punctuation() {
        let rw = Rewrite::BroadenSentinel {
            sentinel: "limit(0)".into(),
            alternate: "limit(1)".into(),
        };
        let out = rw.apply("if (x == limit(0)) {").unwrap().unwrap();
        assert_eq!(out, "if ((x == limit(0) || x == limit(1))) {");
    }

    #[test]
    fn guard_keeps_indentation() {
        let rw = Rewrite::GuardBeforeCall {
            call: r"sk_free\(".into(),
            guard: "if (!p) {\n    return;\n}".into(),
        };
        let out = rw.apply("void f() {\n    sk_free(p);\n}\n").unwrap().unwrap();
        assert_eq!(
            out,
            "void f() {\n    if (!p) {\n        return;\n    }\n    sk_free(p);\n}\n"
        );
    }

    #[test]
    fn neutralize_replaces_whole_body() {
        let rw = Rewrite::NeutralizeBody {
            function: r"void\s+sk_abort_no_print\s*\(\s*\)".into(),
            body: "    // no-op".into(),
        };
        let src = "void sk_abort_no_print() {\n    if (x) { y(); }\n    abort();\n}\nint g() { return 1; }\n";
        let out = rw.apply(src).unwrap().unwrap();
        assert_eq!(
            out,
            "void sk_abort_no_print() {\n    // no-op\n}\nint g() { return 1; }\n"
        );
    }

    #[test]
    fn block_goes_after_anchor_line() {
        let rw = Rewrite::BlockAfterAnchor {
            anchor: r"^  enable_vulkan = .*$".into(),
            block: "\n  target_platform = \"\"".into(),
        };
        let out = rw
            .apply("declare_args() {\n  enable_vulkan = is_linux\n}\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            "declare_args() {\n  enable_vulkan = is_linux\n\n  target_platform = \"\"\n}\n"
        );
    }

    #[test]
    fn literal_replace() {
        let rw = Rewrite::Replace {
            find: "a, b".into(),
            replace: "a, c, b".into(),
        };
        assert_eq!(rw.apply("import a, b").unwrap().unwrap(), "import a, c, b");
        assert!(rw.apply("import x").unwrap().is_none());
    }

    #[test]
    fn apply_then_reapply_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let set = sample_set();

        let first = set.apply(dir.path()).unwrap();
        assert_eq!(first[0].before, PatchState::Unpatched);
        assert_eq!(first[0].rewrites, 3);
        let once = std::fs::read(dir.path().join("src/Caps.cpp")).unwrap();

        let second = set.apply(dir.path()).unwrap();
        assert_eq!(second[0].before, PatchState::Patched);
        let twice = std::fs::read(dir.path().join("src/Caps.cpp")).unwrap();
        assert_eq!(once, twice);

        let text = String::from_utf8(once).unwrap();
        assert!(text.contains("|| limits.maxBindGroups == UINT32_MAX"));
        assert!(text.contains("    if (!device) { return; }\n    device.GetLimits"));
    }

    #[test]
    fn anchor_miss_is_an_error_and_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let mut set = sample_set();
        set.files[0].rewrites.push(Rewrite::Replace {
            find: "text that is not there".into(),
            replace: "x".into(),
        });

        let err = set.apply(dir.path()).unwrap_err();
        assert!(matches!(err, PatchError::AnchorNotFound { .. }));
        assert!(err.to_string().contains("src/Caps.cpp"));
        let text = std::fs::read_to_string(dir.path().join("src/Caps.cpp")).unwrap();
        assert_eq!(text, CAPS_SRC);
    }

    #[test]
    fn missing_signature_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let mut set = sample_set();
        set.files[0].rewrites.pop();
        assert!(matches!(
            set.apply(dir.path()).unwrap_err(),
            PatchError::SignatureMissing { .. }
        ));
    }

    #[test]
    fn missing_file_fails_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let mut set = sample_set();
        set.files.push(FilePatch {
            path: "src/Gone.cpp".into(),
            signature: "x".into(),
            rewrites: Vec::new(),
        });
        assert!(matches!(
            set.apply(dir.path()).unwrap_err(),
            PatchError::MissingFile { .. }
        ));
        let text = std::fs::read_to_string(dir.path().join("src/Caps.cpp")).unwrap();
        assert_eq!(text, CAPS_SRC);
    }

    #[test]
    fn check_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let outcomes = sample_set().check(dir.path()).unwrap();
        assert_eq!(outcomes[0].rewrites, 3);
        let text = std::fs::read_to_string(dir.path().join("src/Caps.cpp")).unwrap();
        assert_eq!(text, CAPS_SRC);
    }

    #[test]
    fn invalid_pattern_reported() {
        let rw = Rewrite::GuardBeforeCall {
            call: "(".into(),
            guard: "x".into(),
        };
        assert!(matches!(
            rw.apply("x").unwrap_err(),
            PatchError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn toml_round_trip_of_kinds() {
        let set = PatchSet::from_toml(
            r#"
name = "demo"

[[file]]
path = "a.cpp"
signature = "SIG"

[[file.rewrite]]
kind = "neutralize-body"
function = 'void\s+f\(\)'
body = "    // SIG"

[[file.rewrite]]
kind = "replace"
find = "x"
replace = "y"
"#,
        )
        .unwrap();
        assert_eq!(set.files[0].rewrites.len(), 2);
        assert!(matches!(
            set.files[0].rewrites[0],
            Rewrite::NeutralizeBody { .. }
        ));
    }
}
