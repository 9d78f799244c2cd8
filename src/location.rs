//! Call-site attribution.
//!
//! Walks the live call stack from the innermost frame outwards and picks the
//! first frame that belongs to user code, skipping the logging machinery
//! (`tracing`, `log`, `tracing_subscriber`, this crate, the standard library,
//! the test harness, the stack walker itself) and any module prefixes the
//! caller asked to skip.

use serde::Serialize;

/// Crate roots whose frames are never attributed.
const INFRASTRUCTURE_ROOTS: &[&str] = &[
    "backtrace",
    "std",
    "core",
    "alloc",
    "test",
    "__rustc",
    "log",
    "tracing",
    "tracing_core",
    "tracing_log",
    "tracing_subscriber",
    env!("CARGO_CRATE_NAME"),
];

/// File, line and function of a log call site.
///
/// Serialized as both `sourceLocation` and `context.reportLocation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// Static call site of a `tracing` event, taken from its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub module_path: &'static str,
    pub file: &'static str,
    pub line: u32,
}

/// Find the first stack frame outside the logging infrastructure and outside
/// every prefix in `skip`.
///
/// When that frame's function is defined in `callsite`'s module, the event
/// was emitted right there and the callsite's file and line are exact;
/// otherwise they come from debug info.
///
/// Returns [`SourceLocation::default`] when no frame qualifies, including when
/// the binary carries no symbols.
pub fn locate(skip: &[String], callsite: Option<&CallSite>) -> SourceLocation {
    let mut run: Vec<(SymbolPath, SourceLocation)> = Vec::new();
    let mut done = false;

    backtrace::trace(|frame| {
        // Inlined calls show up as several symbols for one frame, innermost first.
        backtrace::resolve_frame(frame, |symbol| {
            if done {
                return;
            }
            let path = symbol
                .name()
                .and_then(|name| SymbolPath::parse(&format!("{name:#}")));

            let Some(path) = path else {
                done = !run.is_empty();
                return;
            };
            if run.is_empty() {
                if !path.is_skipped(skip) {
                    let location = location_of(symbol, &path);
                    run.push((path, location));
                }
            } else if run[0].0 == path {
                let location = location_of(symbol, &path);
                run.push((path, location));
            } else {
                done = true;
            }
        });
        !done
    });

    if let (Some(site), Some((path, _))) = (callsite, run.first()) {
        if path.defined_in(site.module_path) {
            return SourceLocation {
                file: site.file.to_string(),
                line: site.line,
                function: path.function.clone(),
            };
        }
    }
    attribute(run.into_iter().map(|(_, location)| location).collect())
}

fn location_of(symbol: &backtrace::Symbol, path: &SymbolPath) -> SourceLocation {
    SourceLocation {
        file: symbol
            .filename()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        line: symbol.lineno().unwrap_or(0),
        function: path.function.clone(),
    }
}

/// Pick the call site out of consecutive frames of one function, innermost
/// first.
///
/// Closures expanded from a `tracing` macro carry the macro definition's file
/// and line, so the innermost frame that lies in the same file as the
/// function's outermost frame wins.
fn attribute(run: Vec<SourceLocation>) -> SourceLocation {
    let Some(outermost) = run.last() else {
        return SourceLocation::default();
    };
    let file = outermost.file.clone();
    run.into_iter()
        .find(|location| location.file == file)
        .unwrap_or_default()
}

/// Module paths and function name recovered from a demangled symbol.
#[derive(Debug, PartialEq, Eq)]
struct SymbolPath {
    /// One path for free functions and inherent methods; for
    /// `<Type as Trait>::method` the type path (when it names one) and the
    /// trait path.
    modules: Vec<String>,
    qualified: bool,
    function: String,
}

impl SymbolPath {
    /// Parse a demangled symbol name such as `app::handlers::get::{{closure}}`
    /// or `<app::Db as app::Store>::load`.
    ///
    /// Closures and shims fold into their enclosing function; generic argument
    /// lists are dropped. Returns `None` when the symbol has no module path,
    /// which is the case for C runtime symbols and unparsed mangled names.
    fn parse(name: &str) -> Option<Self> {
        let mut qualifiers: Vec<Vec<&str>> = Vec::new();
        let mut module: Vec<&str> = Vec::new();
        let mut function: Option<&str> = None;

        for (i, segment) in split_path(name).into_iter().enumerate() {
            let segment = segment.trim();
            if i == 0 && segment.starts_with('<') {
                qualifiers = qualified_self_paths(segment);
                continue;
            }
            // `{{closure}}`, `{closure#0}`, `{{vtable.shim}}`, turbofish `<T>`
            if segment.is_empty() || segment.starts_with('{') || segment.starts_with('<') {
                continue;
            }
            let segment = strip_generics(segment);
            if let Some(outer) = function.replace(segment) {
                module.push(outer);
            }
        }

        let function = function?;
        let qualifiers_empty = qualifiers.is_empty();
        let modules: Vec<String> = if qualifiers_empty {
            vec![module.join("::")]
        } else {
            qualifiers
                .into_iter()
                .map(|mut path| {
                    path.extend(module.iter().copied());
                    path.join("::")
                })
                .collect()
        };
        if modules.iter().all(|m| m.is_empty()) {
            return None;
        }
        Some(SymbolPath {
            modules,
            qualified: !qualifiers_empty,
            function: function.to_string(),
        })
    }

    /// Whether the function is defined directly in `module` (as `module_path!()`
    /// reports it there). For trait impls the type or trait name is dropped.
    fn defined_in(&self, module: &str) -> bool {
        self.modules.iter().any(|m| {
            let parent = if self.qualified {
                m.rsplit_once("::").map(|(parent, _)| parent).unwrap_or_default()
            } else {
                m.as_str()
            };
            parent == module
        })
    }

    /// A frame is skipped when any of its paths matches a configured prefix,
    /// or when all of them belong to infrastructure crates.
    fn is_skipped(&self, skip: &[String]) -> bool {
        let configured = self
            .modules
            .iter()
            .any(|m| skip.iter().any(|prefix| m.starts_with(prefix.as_str())));
        let infrastructure = self.modules.iter().all(|m| {
            let root = m.split("::").next().unwrap_or_default();
            m.is_empty() || INFRASTRUCTURE_ROOTS.contains(&root)
        });
        configured || infrastructure
    }
}

/// Module paths for a `<Type as Trait>` qualifier: the implementing type when
/// it is a named path, then the trait.
fn qualified_self_paths(segment: &str) -> Vec<Vec<&str>> {
    let inner = segment
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(segment);
    let (ty, trait_path) = match inner.split_once(" as ") {
        Some((ty, tr)) => (ty, Some(tr)),
        None => (inner, None),
    };

    let ty = ty
        .trim_start_matches(['&', '*'])
        .trim_start_matches("mut ")
        .trim_start_matches("const ")
        .trim_start_matches("dyn ");

    let mut paths = Vec::new();
    if is_named_path(ty) {
        paths.push(path_segments(ty));
    }
    if let Some(tr) = trait_path {
        paths.push(path_segments(tr.trim_start_matches("dyn ")));
    }
    paths
}

fn path_segments(path: &str) -> Vec<&str> {
    split_path(strip_generics(path))
        .into_iter()
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect()
}

fn is_named_path(ty: &str) -> bool {
    ty.starts_with(|c: char| c.is_alphabetic() || c == '_') && !ty.starts_with("fn(")
}

fn strip_generics(segment: &str) -> &str {
    match segment.find('<') {
        Some(idx) => &segment[..idx],
        None => segment,
    }
}

/// Split on `::` outside of angle brackets.
fn split_path(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            // `->` inside fn pointer types does not close a bracket
            b'>' if i == 0 || bytes[i - 1] != b'-' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                parts.push(&name[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&name[start..]);
    parts
}
