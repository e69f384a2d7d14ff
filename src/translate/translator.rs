//! Line-by-line translation driver.
//!
//! `compile` opens a file through the filesystem collaborator and pushes it
//! onto the active-file stack; `parse` reads logical lines (joining explicit
//! continuations), classifies each as a directive or content, and either
//! mutates translator state or writes expanded content to the output sink.
//! An `#include` recurses into the target stream with the same state, so
//! definitions and conditional context persist across file boundaries.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TranslateError};

use super::cond::{self, CondStack};
use super::diag::{DiagSink, Diagnostic, LogSink};
use super::expand::expand;
use super::file::{OsVfs, Vfs};
use super::scan;
use super::table::MacroTable;

/// Non-cyclic include nesting is still bounded, so a runaway chain surfaces
/// as an error instead of exhausting the call stack.
const MAX_INCLUDE_LEVELS: usize = 64;

/// Directive keyword at the head of a logical line. Matching is
/// case-insensitive; any other `#`-line is ordinary content, since SQL
/// dialects use `#` comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Include,
    Define,
    If,
    Else,
    EndIf,
}

impl Directive {
    fn classify(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "include" => Some(Self::Include),
            "define" => Some(Self::Define),
            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "endif" => Some(Self::EndIf),
            _ => None,
        }
    }
}

pub struct Translator<W: Write> {
    out: W,
    table: MacroTable,
    conds: CondStack,
    /// include paths currently being parsed, outermost first
    active: Vec<PathBuf>,
    /// physical lines consumed so far; diagnostics are zero-based
    line: usize,
    vfs: Box<dyn Vfs>,
    diag: Box<dyn DiagSink>,
}

impl<W: Write> Translator<W> {
    pub fn new(out: W) -> Self {
        Self::with_collaborators(out, Box::new(OsVfs), Box::new(LogSink))
    }

    pub fn with_collaborators(out: W, vfs: Box<dyn Vfs>, diag: Box<dyn DiagSink>) -> Self {
        Self {
            out,
            table: MacroTable::default(),
            conds: CondStack::default(),
            active: Vec::new(),
            line: 0,
            vfs,
            diag,
        }
    }

    /// Clears definitions, conditional state, active files and the line
    /// counter; the output sink and collaborators are retained.
    pub fn reset(&mut self) {
        self.table.clear();
        self.conds.clear();
        self.active.clear();
        self.line = 0;
    }

    pub fn table(&self) -> &MacroTable {
        &self.table
    }

    pub fn into_sink(self) -> W {
        self.out
    }

    /// Entry point for a file: begins a new active-file stack frame for
    /// recursion detection.
    pub fn compile(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = normalize(path.as_ref());
        let dir = parent_dir(&path);
        log::debug!("compiling {}", path.display());
        let stream = self.vfs.open(&path)?;
        self.active.push(path);
        let result = self.parse_stream(stream, &dir);
        self.active.pop();
        result
    }

    /// Translates a stream against the current state; include targets
    /// resolve relative to the working directory.
    pub fn parse(&mut self, stream: impl Read) -> Result<()> {
        self.parse_stream(stream, Path::new("."))
    }

    fn parse_stream<R: Read>(&mut self, stream: R, dir: &Path) -> Result<()> {
        let mut reader = BufReader::new(stream);
        // conditional frames opened by this stream must be closed by it
        let floor = self.conds.depth();
        loop {
            let Some(mut logical) = self.read_physical(&mut reader)? else {
                break;
            };
            while let Some(stem) = continuation_stem(&logical) {
                let stem = stem.to_owned();
                match self.read_physical(&mut reader)? {
                    Some(next) => logical = stem + &next,
                    None => {
                        logical = stem;
                        break;
                    }
                }
            }
            let line = self.line.saturating_sub(1);
            self.handle_line(&logical, line, dir, floor)?;
        }
        if self.conds.depth() != floor {
            return Err(TranslateError::CondMismatch {
                line: self.line.saturating_sub(1),
            });
        }
        Ok(())
    }

    fn read_physical<R: Read>(&mut self, reader: &mut BufReader<R>) -> Result<Option<String>> {
        let mut buf = String::new();
        if reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }

    fn handle_line(&mut self, logical: &str, line: usize, dir: &Path, floor: usize) -> Result<()> {
        let trimmed = logical.trim_start();
        if let Some(rest) = trimmed.strip_prefix('#') {
            let rest = rest.trim_start();
            let word_end = rest
                .char_indices()
                .find(|(_, c)| !scan::is_ident(*c))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            if let Some(directive) = Directive::classify(&rest[..word_end]) {
                return self.handle_directive(directive, &rest[word_end..], line, dir, floor);
            }
        }
        if self.conds.active() {
            let expanded = expand(&self.table, logical, line)?;
            self.out.write_all(expanded.as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn handle_directive(
        &mut self,
        directive: Directive,
        rest: &str,
        line: usize,
        dir: &Path,
        floor: usize,
    ) -> Result<()> {
        match directive {
            Directive::If => {
                if self.conds.active() {
                    let expanded = expand(&self.table, rest.trim(), line)?;
                    self.conds.push(cond::eval(&expanded));
                } else {
                    // dead region: track nesting without evaluating
                    self.conds.push(false);
                }
            }
            Directive::Else => self.conds.flip(line)?,
            Directive::EndIf => {
                if self.conds.depth() == floor {
                    return Err(TranslateError::CondMismatch { line });
                }
                self.conds.pop(line)?;
            }
            Directive::Define => {
                if self.conds.active() {
                    self.handle_define(rest, line)?;
                }
            }
            Directive::Include => {
                if self.conds.active() {
                    self.handle_include(rest, line, dir)?;
                }
            }
        }
        Ok(())
    }

    fn handle_define(&mut self, rest: &str, line: usize) -> Result<()> {
        let rest = rest.trim_start();
        let name_end = rest
            .char_indices()
            .find(|(_, c)| !scan::is_ident(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if name_end == 0 {
            return Err(TranslateError::Syntax {
                line,
                message: "malformed #define: missing name".to_owned(),
            });
        }
        let name = &rest[..name_end];
        let after = &rest[name_end..];
        if after.starts_with('(') {
            let close =
                super::args::matching_paren(after, 0).ok_or_else(|| TranslateError::Syntax {
                    line,
                    message: format!("unterminated parameter list for macro {}", name),
                })?;
            let params = parse_params(&after[1..close], name, line)?;
            let body = after[close + 1..].trim().to_owned();
            self.table
                .define_macro(name, params, body, line, self.diag.as_mut());
        } else {
            self.table
                .define_variable(name, after.trim(), line, self.diag.as_mut());
        }
        Ok(())
    }

    fn handle_include(&mut self, rest: &str, line: usize, dir: &Path) -> Result<()> {
        let requested = quoted_path(rest).ok_or_else(|| TranslateError::Syntax {
            line,
            message: "malformed #include: expected a quoted path".to_owned(),
        })?;
        let requested = expand(&self.table, requested, line)?;
        let target = fold_dots(&dir.join(&requested));
        let parent = parent_dir(&target);
        let name = match target.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                return Err(TranslateError::Syntax {
                    line,
                    message: format!("malformed include path: {}", target.display()),
                })
            }
        };
        // a listing failure reads as an empty directory
        let entries = self.vfs.list_dir(&parent).unwrap_or_default();
        let mut matched = false;
        for entry in entries.into_iter().filter(|entry| *entry == name) {
            matched = true;
            self.include_file(parent.join(entry), &parent, line)?;
        }
        if !matched {
            self.diag.report(Diagnostic::new(
                line,
                format!("There is no include files: {}", target.display()),
            ));
        }
        Ok(())
    }

    fn include_file(&mut self, path: PathBuf, dir: &Path, line: usize) -> Result<()> {
        if self.active.iter().any(|open| *open == path) {
            return Err(TranslateError::Recursion { path });
        }
        if self.active.len() >= MAX_INCLUDE_LEVELS {
            return Err(TranslateError::MaxIncludeLevels { line, path });
        }
        log::debug!("including {}", path.display());
        let stream = self.vfs.open(&path)?;
        self.active.push(path);
        let result = self.parse_stream(stream, dir);
        self.active.pop();
        result
    }
}

/// A physical line whose text after the last `\` is only whitespace
/// continues on the next line; the stem before the `\` is kept.
fn continuation_stem(line: &str) -> Option<&str> {
    let idx = line.rfind('\\')?;
    line[idx + 1..].trim().is_empty().then(|| &line[..idx])
}

/// Bare file names resolve through `.`, so every active path carries its
/// directory (`recursive.sql` becomes `./recursive.sql`).
fn normalize(path: &Path) -> PathBuf {
    let path = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new(".").join(path),
        _ => path.to_path_buf(),
    };
    fold_dots(&path)
}

/// Collapses inner `.` and `..` segments lexically so one file has one
/// spelling on the active stack; a leading `.` is kept.
fn fold_dots(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for part in path.components() {
        match part {
            Component::CurDir => {
                if parts.is_empty() {
                    parts.push(part);
                }
            }
            Component::ParentDir => match parts.last().copied() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::CurDir) => {
                    parts.pop();
                    parts.push(part);
                }
                Some(Component::RootDir) => {}
                _ => parts.push(part),
            },
            part => parts.push(part),
        }
    }
    parts.into_iter().collect()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn quoted_path(rest: &str) -> Option<&str> {
    let open = rest.find('"')?;
    let rest = &rest[open + 1..];
    let close = rest.find('"')?;
    Some(&rest[..close])
}

fn parse_params(raw: &str, name: &str, line: usize) -> Result<Vec<String>> {
    let mut params = Vec::new();
    if raw.trim().is_empty() {
        return Ok(params);
    }
    for part in raw.split(',') {
        let part = part.trim();
        let mut chars = part.chars();
        let valid = chars.next().is_some_and(scan::is_ident_lead) && chars.all(scan::is_ident);
        if !valid {
            return Err(TranslateError::Syntax {
                line,
                message: format!("malformed parameter list for macro {}", name),
            });
        }
        if params.iter().any(|p| p == part) {
            return Err(TranslateError::Syntax {
                line,
                message: format!("duplicate parameter {} in macro {}", part, name),
            });
        }
        params.push(part.to_owned());
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::diag::CollectSink;
    use crate::translate::file::MemVfs;

    const MAIN_SQL: &str = "\n#include \"common/func.sql\"\n\nselect $var1 from $var2 where ${var3};\n$f1(MAX(*), `test2`);\n$f2(*, as23!@#%4);\n";
    const FUNC_SQL: &str = "\n#include \"vars.sql\"\n#define f1(a,b) select $a from $b\n#define f2(d, e) select $e from $d;\\\n select $d from $e\n";
    const VARS_SQL: &str =
        "\n#define var1 \"var1\"\n#define var2 'var2'\n#define var3 `var3`\n#define var4 1\n";
    const RECURSIVE_SQL: &str = "#include \"recursive.sql\"\n\n";

    fn mem_vfs() -> MemVfs {
        MemVfs::with(&[
            ("./main.sql", MAIN_SQL),
            ("./common/func.sql", FUNC_SQL),
            ("./common/vars.sql", VARS_SQL),
            ("./recursive.sql", RECURSIVE_SQL),
        ])
    }

    fn translator() -> (Translator<Vec<u8>>, CollectSink) {
        let sink = CollectSink::default();
        let trans = Translator::with_collaborators(
            Vec::new(),
            Box::new(mem_vfs()),
            Box::new(sink.clone()),
        );
        (trans, sink)
    }

    fn output(trans: Translator<Vec<u8>>) -> String {
        String::from_utf8(trans.into_sink()).unwrap()
    }

    #[test]
    fn define_variable_keeps_quotes() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#DEFINE a \"1\" ".as_bytes())?;
        assert_eq!(Some("\"1\""), trans.table().variable("a"));
        trans.parse("#DEFINE b `12%&89qa@`".as_bytes())?;
        assert_eq!(Some("`12%&89qa@`"), trans.table().variable("b"));
        trans.parse("#DEFINE d '*'".as_bytes())?;
        assert_eq!(Some("'*'"), trans.table().variable("d"));
        Ok(())
    }

    #[test]
    fn expand_variable_both_forms() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#define var1 `12%&89qa@`\nselect $var1; select ${var1};".as_bytes())?;
        assert_eq!(
            "select `12%&89qa@`; select `12%&89qa@`;\n",
            output(trans)
        );
        Ok(())
    }

    #[test]
    fn define_macro_with_continuation() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#DEFINE f1(a) select * \\ \nfrom $a".as_bytes())?;
        let def = trans.table().lookup_macro("f1").unwrap();
        assert_eq!(vec!["a".to_owned()], def.params);
        assert_eq!("select * from $a", def.body);
        assert_eq!(14, def.refs[0].span.start);
        assert_eq!(16, def.refs[0].span.end);
        Ok(())
    }

    #[test]
    fn expand_macro_call() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#DEFINE f1(a) select * \\ \nfrom $a\n$f1(`table1`);".as_bytes())?;
        assert_eq!("select * from `table1`;\n", output(trans));
        Ok(())
    }

    #[test]
    fn wrong_argument_count_fails() {
        let (mut trans, _) = translator();
        let err = trans
            .parse("#DEFINE f2(a,b) select * \\ \nfrom $a\n$f2(`table1`);".as_bytes())
            .unwrap_err();
        assert!(matches!(err, TranslateError::WrongArgCount { .. }));
    }

    #[test]
    fn include_chain() -> Result<()> {
        let (mut trans, sink) = translator();
        trans.compile("main.sql")?;
        let expected = "select \"var1\" from 'var2' where `var3`;\n\
                        select MAX(*) from `test2`;\n\
                        select as23!@#%4 from *; select * from as23!@#%4;";
        assert_eq!(expected, output(trans).trim());
        assert!(sink.is_empty());
        Ok(())
    }

    #[test]
    fn conditional_branches() -> Result<()> {
        let (mut trans, sink) = translator();
        trans.parse(
            "#define var4 1\n\
             #if var4 == 0\n\
             select $var4 from t1;\n\
             #define var5 2\n\
             #include \"./var1.sql\"\n\
             #else\n\
             select $var4 from t2;\n\
             #endif"
                .as_bytes(),
        )?;
        assert_eq!("select 1 from t2;\n", output(trans));
        // the dead branch had no side effects: no definition, no missing-
        // include diagnostic
        assert!(sink.is_empty());
        Ok(())
    }

    #[test]
    fn dead_branch_defines_nothing() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#if 0\n#define var5 2\n#endif".as_bytes())?;
        assert_eq!(None, trans.table().variable("var5"));
        Ok(())
    }

    #[test]
    fn unterminated_if_fails() {
        let (mut trans, _) = translator();
        let err = trans.parse("#if 1\n select * from t;".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("mismatch if/endif"));
    }

    #[test]
    fn stray_endif_fails() {
        let (mut trans, _) = translator();
        let err = trans
            .parse("select * from t;\n#endif\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("mismatch if/endif"));
    }

    #[test]
    fn nested_conditionals() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse(
            "#if 1\n\
             #if 0\n\
             a;\n\
             #else\n\
             b;\n\
             #endif\n\
             #else\n\
             #if 1\n\
             c;\n\
             #endif\n\
             #endif"
                .as_bytes(),
        )?;
        assert_eq!("b;\n", output(trans));
        Ok(())
    }

    #[test]
    fn redefinition_warns() -> Result<()> {
        let (mut trans, sink) = translator();
        trans.parse("#define var4 1\n#define var4 2\n".as_bytes())?;
        let diags = sink.take();
        assert_eq!(1, diags.len());
        assert_eq!("1: macro var4 already defined!", diags[0].to_string());

        trans.reset();
        trans.parse("#define f(a) 1\n#define f(a) 2\n".as_bytes())?;
        let diags = sink.take();
        assert_eq!(1, diags.len());
        assert_eq!("1: macro f already defined!", diags[0].to_string());
        Ok(())
    }

    #[test]
    fn recursive_include_fails() {
        let (mut trans, _) = translator();
        let err = trans.compile("recursive.sql").unwrap_err();
        assert_eq!("Recursion detected: ./recursive.sql", err.to_string());
    }

    #[test]
    fn cycle_detection_folds_dotted_paths() {
        let vfs = MemVfs::with(&[("./a.sql", "#include \"sub/../a.sql\"\n")]);
        let mut trans = Translator::with_collaborators(
            Vec::new(),
            Box::new(vfs),
            Box::new(CollectSink::default()),
        );
        let err = trans.compile("a.sql").unwrap_err();
        assert_eq!("Recursion detected: ./a.sql", err.to_string());
    }

    #[test]
    fn include_depth_is_capped() {
        // a non-cyclic chain longer than the nesting limit
        let files: Vec<(String, String)> = (0..70)
            .map(|i| {
                let body = if i < 69 {
                    format!("#include \"f{}.sql\"\n", i + 1)
                } else {
                    String::new()
                };
                (format!("./f{}.sql", i), body)
            })
            .collect();
        let entries: Vec<(&str, &str)> = files
            .iter()
            .map(|(path, text)| (path.as_str(), text.as_str()))
            .collect();
        let mut trans = Translator::with_collaborators(
            Vec::new(),
            Box::new(MemVfs::with(&entries)),
            Box::new(CollectSink::default()),
        );
        let err = trans.compile("f0.sql").unwrap_err();
        assert!(matches!(err, TranslateError::MaxIncludeLevels { .. }));
        assert!(err.to_string().contains("include level limit reached"));
    }

    #[test]
    fn define_without_name_fails() {
        let (mut trans, _) = translator();
        let err = trans.parse("#define \"1\"".as_bytes()).unwrap_err();
        assert!(matches!(err, TranslateError::Syntax { line: 0, .. }));
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn unterminated_parameter_list_fails() {
        let (mut trans, _) = translator();
        let err = trans
            .parse("#define f(a, b select 1".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("unterminated parameter list"));
    }

    #[test]
    fn duplicate_parameter_fails() {
        let (mut trans, _) = translator();
        let err = trans.parse("#define f(a, a) $a".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate parameter a"));
    }

    #[test]
    fn include_without_quoted_path_fails() {
        let (mut trans, _) = translator();
        let err = trans
            .parse("#include common/func.sql".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("expected a quoted path"));
    }

    #[test]
    fn missing_include_warns_and_continues() -> Result<()> {
        struct NoListing(MemVfs);
        impl Vfs for NoListing {
            fn open(&self, path: &Path) -> std::io::Result<Box<dyn Read>> {
                self.0.open(path)
            }
            fn list_dir(&self, _dir: &Path) -> std::io::Result<Vec<String>> {
                Ok(Vec::new())
            }
        }

        let sink = CollectSink::default();
        let mut trans = Translator::with_collaborators(
            Vec::new(),
            Box::new(NoListing(mem_vfs())),
            Box::new(sink.clone()),
        );
        trans.compile("recursive.sql")?;
        let diags = sink.take();
        assert_eq!(1, diags.len());
        assert!(diags[0]
            .message
            .contains("There is no include files: ./recursive.sql"));
        Ok(())
    }

    #[test]
    fn variables_expand_inside_include_paths() -> Result<()> {
        let sink = CollectSink::default();
        let vfs = MemVfs::with(&[("./lib/util.sql", "#define ok 1\n")]);
        let mut trans =
            Translator::with_collaborators(Vec::new(), Box::new(vfs), Box::new(sink.clone()));
        trans.parse("#define dir lib\n#include \"$dir/util.sql\"\nselect $ok;".as_bytes())?;
        assert!(sink.is_empty());
        assert_eq!("select 1;\n", output(trans));
        Ok(())
    }

    #[test]
    fn reset_clears_state_but_keeps_sink() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("#define a 1\nx $a\n".as_bytes())?;
        trans.reset();
        assert_eq!(None, trans.table().variable("a"));
        trans.parse("y\n".as_bytes())?;
        assert_eq!("x 1\ny\n", output(trans));
        Ok(())
    }

    #[test]
    fn unknown_hash_line_is_content() -> Result<()> {
        let (mut trans, _) = translator();
        trans.parse("# this is a comment\n".as_bytes())?;
        assert_eq!("# this is a comment\n", output(trans));
        Ok(())
    }

    #[test]
    fn recursive_fixture_fails_through_the_real_filesystem() {
        let mut trans = Translator::new(Vec::new());
        let err = trans
            .compile(Path::new("tests/fixtures/recursive.sql"))
            .unwrap_err();
        assert_eq!(
            "Recursion detected: tests/fixtures/recursive.sql",
            err.to_string()
        );
    }

    #[test]
    fn fixtures_compile_through_the_real_filesystem() -> Result<()> {
        let mut trans = Translator::new(Vec::new());
        trans.compile(Path::new("tests/fixtures/main.sql"))?;
        let expected = "select \"var1\" from 'var2' where `var3`;\n\
                        select MAX(*) from `test2`;\n\
                        select as23!@#%4 from *; select * from as23!@#%4;";
        assert_eq!(expected, output(trans).trim());
        Ok(())
    }
}
